// Licensed under the Apache-2.0 license

use crate::geometry::{FieldGeometry, Versal, VersalNet, ZynqMp};

/// Chip family the driver is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    Versal,
    VersalNet,
    ZynqMp,
}

impl Variant {
    pub fn geometry(self) -> &'static dyn FieldGeometry {
        match self {
            Variant::Versal => &Versal,
            Variant::VersalNet => &VersalNet,
            Variant::ZynqMp => &ZynqMp,
        }
    }
}

/// Poll budgets, in status register reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    pub read: u32,
    pub program: u32,
    pub cache_load: u32,
    pub poll: u32,
}

impl Timeouts {
    pub const DEFAULT: Timeouts = Timeouts {
        read: 100,
        program: 100,
        cache_load: 0x800,
        poll: 0x400,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EfuseConfig {
    pub variant: Variant,
    pub ctrl_base: usize,
    pub cache_base: usize,
    pub crp_base: usize,
    /// Reference clock feeding the controller timers.
    pub ref_clk_hz: u32,
    pub timeouts: Timeouts,
}

impl EfuseConfig {
    pub const fn versal() -> Self {
        EfuseConfig {
            variant: Variant::Versal,
            ctrl_base: 0xF124_0000,
            cache_base: 0xF125_0000,
            crp_base: 0xF126_0000,
            ref_clk_hz: 33_333_333,
            timeouts: Timeouts::DEFAULT,
        }
    }

    pub const fn versal_net() -> Self {
        EfuseConfig {
            variant: Variant::VersalNet,
            ..Self::versal()
        }
    }

    pub const fn zynqmp() -> Self {
        EfuseConfig {
            variant: Variant::ZynqMp,
            ctrl_base: 0xFFCC_0000,
            cache_base: 0xFFCC_1000,
            crp_base: 0xFF5E_0000,
            ref_clk_hz: 33_333_333,
            timeouts: Timeouts::DEFAULT,
        }
    }

    pub fn geometry(&self) -> &'static dyn FieldGeometry {
        self.variant.geometry()
    }

    /// Timer register values for the configured reference clock, in order
    /// TPGM, TRD, TRDM, TSU_H_PS, TSU_H_PS_CS, TSU_H_CS.
    pub fn timer_values(&self) -> [u32; 6] {
        [
            cycles(self.ref_clk_hz, TPGM_NS),
            cycles(self.ref_clk_hz, TRD_NS),
            cycles(self.ref_clk_hz, TRDM_NS),
            cycles(self.ref_clk_hz, TSU_H_PS_NS),
            cycles(self.ref_clk_hz, TSU_H_PS_CS_NS),
            cycles(self.ref_clk_hz, TSU_H_CS_NS),
        ]
    }
}

const TPGM_NS: u64 = 5_000;
const TRD_NS: u64 = 217;
const TRDM_NS: u64 = 500;
const TSU_H_PS_NS: u64 = 208;
const TSU_H_PS_CS_NS: u64 = 143;
const TSU_H_CS_NS: u64 = 184;

fn cycles(ref_clk_hz: u32, ns: u64) -> u32 {
    (ns * ref_clk_hz as u64).div_ceil(1_000_000_000) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_values_round_up() {
        let mut config = EfuseConfig::versal();
        config.ref_clk_hz = 100_000_000;
        // 5us, 21.7, 50, 20.8, 14.3 and 18.4 cycles
        assert_eq!(config.timer_values(), [500, 22, 50, 21, 15, 19]);
    }

    #[test]
    fn test_variant_selects_geometry() {
        assert_eq!(EfuseConfig::versal().geometry().name(), "versal");
        assert_eq!(EfuseConfig::versal_net().geometry().name(), "versal-net");
        assert_eq!(EfuseConfig::zynqmp().geometry().name(), "zynqmp");
    }
}
