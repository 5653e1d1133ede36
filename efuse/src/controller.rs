// Licensed under the Apache-2.0 license

use romtime::HexWord;
use tock_registers::LocalRegisterCopy;

use crate::config::EfuseConfig;
use crate::error::{EfuseError, EfuseResult};
use crate::geometry::{Field, FieldGeometry, KeyCrcRegs};
use crate::regs::{self, Block, Isr, IsrVal, RegisterIo, CACHE_WORDS};

/// Read-side view of the controller: cache reads, status polling and the
/// key CRC engine. Anything that burns fuses needs a
/// [`ControllerSession`](crate::session::ControllerSession) on top.
pub struct Controller<'a, R: RegisterIo> {
    io: &'a R,
    config: EfuseConfig,
    geometry: &'static dyn FieldGeometry,
}

impl<'a, R: RegisterIo> Controller<'a, R> {
    pub fn new(io: &'a R, config: EfuseConfig) -> Self {
        Controller {
            io,
            config,
            geometry: config.geometry(),
        }
    }

    pub fn config(&self) -> &EfuseConfig {
        &self.config
    }

    pub fn geometry(&self) -> &'static dyn FieldGeometry {
        self.geometry
    }

    pub(crate) fn read_ctrl(&self, offset: u32) -> u32 {
        self.io.read(Block::Ctrl, offset)
    }

    pub(crate) fn write_ctrl(&self, offset: u32, value: u32) {
        self.io.write(Block::Ctrl, offset, value);
    }

    pub(crate) fn write_crp(&self, offset: u32, value: u32) {
        self.io.write(Block::Crp, offset, value);
    }

    pub(crate) fn isr(&self) -> IsrVal {
        LocalRegisterCopy::new(self.read_ctrl(regs::ISR))
    }

    /// ISR bits are write-one-to-clear.
    pub(crate) fn clear_isr(&self, mask: u32) {
        self.write_ctrl(regs::ISR, mask);
    }

    pub(crate) fn check_cache_error(&self) -> EfuseResult<()> {
        if self.isr().is_set(Isr::CACHE_ERROR) {
            romtime::println!("[efuse] Cache parity error");
            return Err(EfuseError::CACHE_PARITY);
        }
        Ok(())
    }

    /// Polls `offset` until one of `mask` reads set, for at most `budget`
    /// reads. Returns the last value read.
    pub(crate) fn wait_for(
        &self,
        offset: u32,
        mask: u32,
        budget: u32,
        on_timeout: EfuseError,
    ) -> EfuseResult<u32> {
        for _ in 0..budget {
            let value = self.read_ctrl(offset);
            if value & mask != 0 {
                return Ok(value);
            }
        }
        romtime::println!(
            "[efuse] Timed out waiting for {} at {}",
            HexWord(mask),
            HexWord(offset)
        );
        Err(on_timeout)
    }

    pub(crate) fn check_cache_range(offset: u32, words: usize) -> EfuseResult<()> {
        if offset % 4 != 0 || (offset / 4) as usize + words > CACHE_WORDS {
            return Err(EfuseError::INVALID_PARAM);
        }
        Ok(())
    }

    /// One cache word, without the parity check.
    pub(crate) fn read_cache_raw(&self, offset: u32) -> EfuseResult<u32> {
        Self::check_cache_range(offset, 1)?;
        Ok(self.io.read(Block::Cache, offset))
    }

    /// Fills `out` from consecutive cache words at `offset`, then checks that
    /// the reads did not raise a parity error.
    pub fn read_cache(&self, offset: u32, out: &mut [u32]) -> EfuseResult<()> {
        Self::check_cache_range(offset, out.len())?;
        for (i, word) in out.iter_mut().enumerate() {
            *word = self.io.read(Block::Cache, offset + (i as u32) * 4);
        }
        self.check_cache_error()
    }

    pub fn read_cache_word(&self, offset: u32) -> EfuseResult<u32> {
        let mut word = [0u32; 1];
        self.read_cache(offset, &mut word)?;
        Ok(word[0])
    }

    /// Cached value of a field.
    pub fn read_field<const N: usize>(&self, field: Field) -> EfuseResult<[u32; N]> {
        let desc = self.geometry.field_or_invalid(field)?;
        if desc.words != N {
            return Err(EfuseError::INVALID_PARAM);
        }
        let mut out = [0u32; N];
        self.read_cache(desc.cache_offset, &mut out)?;
        Ok(out)
    }

    pub fn read_field_word(&self, field: Field) -> EfuseResult<u32> {
        self.read_field::<1>(field).map(|w| w[0])
    }

    /// Cached words of a field are all zero.
    pub(crate) fn field_is_zero(&self, field: Field) -> EfuseResult<bool> {
        let desc = self.geometry.field_or_invalid(field)?;
        for i in 0..desc.words as u32 {
            if self.read_cache_word(desc.cache_offset + i * 4)? != 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Asks the key CRC engine to compare a key slot against `expected`.
    pub fn check_key_crc(&self, crc: KeyCrcRegs, expected: u32) -> EfuseResult<()> {
        self.write_ctrl(crc.offset, expected);
        let status = self
            .wait_for(
                regs::STATUS,
                crc.done_mask,
                self.config.timeouts.poll,
                EfuseError::CRC_VERIFICATION,
            )?;
        if status & crc.pass_mask == 0 {
            return Err(EfuseError::CRC_VERIFICATION);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{IvKind, KeySlot};
    use crate::mock::MockEfuse;

    #[test]
    fn test_read_cache_rejects_out_of_range() {
        let mock = MockEfuse::versal();
        let ctrl = Controller::new(&mock, EfuseConfig::versal());
        let mut out = [0u32; 4];
        assert!(matches!(
            ctrl.read_cache(0xBFC, &mut out),
            Err(EfuseError::INVALID_PARAM)
        ));
        assert!(matches!(
            ctrl.read_cache(0x102, &mut out),
            Err(EfuseError::INVALID_PARAM)
        ));
        assert!(ctrl.read_cache(0xBF0, &mut out).is_ok());
    }

    #[test]
    fn test_read_cache_reports_parity() {
        let mock = MockEfuse::versal();
        mock.raise_isr(1 << 4);
        let ctrl = Controller::new(&mock, EfuseConfig::versal());
        assert!(matches!(
            ctrl.read_cache_word(0),
            Err(EfuseError::CACHE_PARITY)
        ));
    }

    #[test]
    fn test_read_field_checks_width() {
        let mock = MockEfuse::versal();
        mock.burn_row(0, 119, 0xAA);
        mock.load_cache();
        let ctrl = Controller::new(&mock, EfuseConfig::versal());
        let iv = ctrl.read_field::<3>(Field::Iv(IvKind::Plm)).unwrap();
        assert_eq!(iv, [0xAA, 0, 0]);
        assert!(matches!(
            ctrl.read_field::<2>(Field::Iv(IvKind::Plm)),
            Err(EfuseError::INVALID_PARAM)
        ));
    }

    #[test]
    fn test_empty_key_passes_zero_crc() {
        let mock = MockEfuse::versal();
        let ctrl = Controller::new(&mock, EfuseConfig::versal());
        let crc = ctrl.geometry().key_crc(KeySlot::Aes).unwrap();
        assert!(ctrl.check_key_crc(crc, crate::crc::ZERO_KEY_CRC).is_ok());
        assert!(matches!(
            ctrl.check_key_crc(crc, 0x1234),
            Err(EfuseError::CRC_VERIFICATION)
        ));
    }

    #[test]
    fn test_crc_engine_timeout() {
        let mock = MockEfuse::versal();
        mock.stall_crc(true);
        let ctrl = Controller::new(&mock, EfuseConfig::versal());
        let crc = ctrl.geometry().key_crc(KeySlot::UserKey1).unwrap();
        assert!(matches!(
            ctrl.check_key_crc(crc, crate::crc::ZERO_KEY_CRC),
            Err(EfuseError::CRC_VERIFICATION)
        ));
    }
}
