// Licensed under the Apache-2.0 license

//! Bit layouts of the control rows, as seen in the cache.

use tock_registers::{register_bitfields, LocalRegisterCopy};

use crate::error::EfuseError;

register_bitfields![u32,
    /// Page 0 row 0: protection indicators and anchors.
    pub Tbits [
        ROW_37_PROT OFFSET(16) NUMBITS(1) [],
        ROW_40_PROT OFFSET(17) NUMBITS(1) [],
        ROW_42_PROT OFFSET(18) NUMBITS(1) [],
        ROW_43_0_PROT OFFSET(19) NUMBITS(1) [],
        ROW_43_1_PROT OFFSET(20) NUMBITS(1) [],
        ROW_57_0_PROT OFFSET(21) NUMBITS(1) [],
        ROW_57_1_PROT OFFSET(22) NUMBITS(1) [],
        ROW_58_PROT OFFSET(23) NUMBITS(1) [],
        ROW64_87_0_PROT OFFSET(24) NUMBITS(1) [],
        ROW64_87_1_PROT OFFSET(25) NUMBITS(1) [],
        ROW96_99_0_PROT OFFSET(26) NUMBITS(1) [],
        ROW96_99_1_PROT OFFSET(27) NUMBITS(1) [],
        ANCHOR_0 OFFSET(28) NUMBITS(1) [],
        ANCHOR_1 OFFSET(29) NUMBITS(1) [],
        ANCHOR_2 OFFSET(30) NUMBITS(1) [],
        ANCHOR_3 OFFSET(31) NUMBITS(1) [],
    ],
    pub SecCtrl [
        AES_DIS OFFSET(0) NUMBITS(1) [],
        JTAG_ERROUT_DIS OFFSET(1) NUMBITS(1) [],
        JTAG_DIS OFFSET(2) NUMBITS(1) [],
        PPK0_WR_LK OFFSET(6) NUMBITS(1) [],
        PPK1_WR_LK OFFSET(7) NUMBITS(1) [],
        PPK2_WR_LK OFFSET(8) NUMBITS(1) [],
        AES_CRC_LK OFFSET(9) NUMBITS(2) [],
        AES_WR_LK OFFSET(11) NUMBITS(1) [],
        USR_KEY0_CRC_LK OFFSET(12) NUMBITS(1) [],
        USR_KEY0_WR_LK OFFSET(13) NUMBITS(1) [],
        USR_KEY1_CRC_LK OFFSET(14) NUMBITS(1) [],
        USR_KEY1_WR_LK OFFSET(15) NUMBITS(1) [],
        PUF_SYN_LK OFFSET(16) NUMBITS(1) [],
        PUF_TEST2_DIS OFFSET(17) NUMBITS(1) [],
        PUF_DIS OFFSET(18) NUMBITS(1) [],
        SEC_DEBUG_DIS OFFSET(19) NUMBITS(2) [],
        SEC_LOCK_DBG_DIS OFFSET(21) NUMBITS(2) [],
        BOOT_ENV_WR_LK OFFSET(28) NUMBITS(1) [],
        REG_INIT_DIS OFFSET(30) NUMBITS(2) [],
    ],
    pub MiscCtrl [
        GD_HALT_BOOT_EN OFFSET(0) NUMBITS(2) [],
        PPK0_INVLD OFFSET(2) NUMBITS(2) [],
        PPK1_INVLD OFFSET(4) NUMBITS(2) [],
        PPK2_INVLD OFFSET(6) NUMBITS(2) [],
        SAFETY_MISSION_EN OFFSET(8) NUMBITS(1) [],
        PPK3_INVLD OFFSET(10) NUMBITS(2) [],
        PPK4_INVLD OFFSET(12) NUMBITS(2) [],
        LBIST_EN OFFSET(14) NUMBITS(1) [],
        CRYPTO_KAT_EN OFFSET(15) NUMBITS(1) [],
        ADD_PPK_EN OFFSET(16) NUMBITS(2) [],
        HALT_BOOT_ENV OFFSET(19) NUMBITS(2) [],
        HALT_BOOT_ERROR OFFSET(21) NUMBITS(2) [],
        GD_ROM_MONITOR_EN OFFSET(29) NUMBITS(1) [],
    ],
    pub BootEnvCtrl [
        SYSMON_TEMP_COLD OFFSET(0) NUMBITS(2) [],
        SYSMON_VOLT_PSLP OFFSET(10) NUMBITS(2) [],
        SYSMON_VOLT_PMC OFFSET(12) NUMBITS(2) [],
        SYSMON_VOLT_SOC OFFSET(14) NUMBITS(1) [],
        SYSMON_TEMP_HOT OFFSET(17) NUMBITS(2) [],
        SYSMON_VOLT_EN OFFSET(20) NUMBITS(1) [],
        SYSMON_TEMP_EN OFFSET(21) NUMBITS(1) [],
    ],
    pub SecMisc0 [
        DEC_EFUSE_ONLY OFFSET(0) NUMBITS(16) [],
    ],
    pub SecMisc1 [
        LPD_SC_EN OFFSET(0) NUMBITS(3) [],
        LPD_NOC_SC_EN OFFSET(3) NUMBITS(3) [],
        PMC_MBIST_EN OFFSET(7) NUMBITS(3) [],
        LPD_MBIST_EN OFFSET(10) NUMBITS(3) [],
    ],
    pub GlitchCfg [
        TRIM OFFSET(0) NUMBITS(31) [],
        WR_LK OFFSET(31) NUMBITS(1) [],
    ],
    pub PufEccCtrl [
        AUX OFFSET(0) NUMBITS(24) [],
        REGEN_DIS OFFSET(30) NUMBITS(1) [],
        HD_INVLD OFFSET(31) NUMBITS(1) [],
    ],
];

pub type SecCtrlBits = LocalRegisterCopy<u32, SecCtrl::Register>;
pub type MiscCtrlBits = LocalRegisterCopy<u32, MiscCtrl::Register>;
pub type BootEnvCtrlBits = LocalRegisterCopy<u32, BootEnvCtrl::Register>;
pub type SecMisc1Bits = LocalRegisterCopy<u32, SecMisc1::Register>;
pub type PufEccCtrlBits = LocalRegisterCopy<u32, PufEccCtrl::Register>;
pub type GlitchCfgBits = LocalRegisterCopy<u32, GlitchCfg::Register>;
pub type TbitsVal = LocalRegisterCopy<u32, Tbits::Register>;

pub const ANCHOR_MASK: u32 = 0xF000_0000;
pub const ANCHOR_EXPECTED: u32 = (1 << 31) | (1 << 29);
pub const DEC_ONLY_MASK: u32 = 0xFFFF;
pub const SEC_MISC1_PROT_MASK: u32 = 0x1FFF;
pub const PUF_AUX_MASK: u32 = 0x00FF_FFFF;
pub const MISC_CTRL_PROT_MASK: u32 =
    (0b11 << 2) | (0b11 << 4) | (0b11 << 6) | (0b11 << 10) | (0b11 << 12) | (1 << 15) | (1 << 29);
pub const GLITCH_TRIM_MASK: u32 = 0x7FFF_FFFF;

/// Write error reported for a failed bit of the security control row.
pub const SEC_CTRL_BIT_ERRORS: &[(u32, EfuseError)] = &[
    (1 << 0, EfuseError::WRITE_AES_DIS),
    (1 << 1, EfuseError::WRITE_JTAG_ERROUT_DIS),
    (1 << 2, EfuseError::WRITE_JTAG_DIS),
    (1 << 6, EfuseError::WRITE_PPK0_WR_LK),
    (1 << 7, EfuseError::WRITE_PPK1_WR_LK),
    (1 << 8, EfuseError::WRITE_PPK2_WR_LK),
    (1 << 9, EfuseError::WRITE_AES_CRC_LK_BIT_0),
    (1 << 10, EfuseError::WRITE_AES_CRC_LK_BIT_1),
    (1 << 11, EfuseError::WRITE_AES_WR_LK),
    (1 << 12, EfuseError::WRITE_USER_KEY0_CRC_LK),
    (1 << 13, EfuseError::WRITE_USER_KEY0_WR_LK),
    (1 << 14, EfuseError::WRITE_USER_KEY1_CRC_LK),
    (1 << 15, EfuseError::WRITE_USER_KEY1_WR_LK),
    (1 << 16, EfuseError::WRITE_PUF_SYN_LK),
    (1 << 17, EfuseError::WRITE_PUF_TEST2_DIS),
    (1 << 18, EfuseError::WRITE_PUF_DIS),
    (1 << 19, EfuseError::WRITE_SECDBG_DIS_BIT_0),
    (1 << 20, EfuseError::WRITE_SECDBG_DIS_BIT_1),
    (1 << 21, EfuseError::WRITE_SECLOCKDBG_DIS_BIT_0),
    (1 << 22, EfuseError::WRITE_SECLOCKDBG_DIS_BIT_1),
    (1 << 28, EfuseError::WRITE_BOOTENV_WR_LK),
    (1 << 30, EfuseError::WRITE_REG_INIT_DIS_BIT_0),
    (1 << 31, EfuseError::WRITE_REG_INIT_DIS_BIT_1),
];

pub const MISC_CTRL_BIT_ERRORS: &[(u32, EfuseError)] = &[
    (0b11 | (1 << 29), EfuseError::WRITE_GD_ROM_BITS),
    (1 << 2, EfuseError::WRITE_PPK0_INVALID_BIT_0),
    (1 << 3, EfuseError::WRITE_PPK0_INVALID_BIT_1),
    (1 << 4, EfuseError::WRITE_PPK1_INVALID_BIT_0),
    (1 << 5, EfuseError::WRITE_PPK1_INVALID_BIT_1),
    (1 << 6, EfuseError::WRITE_PPK2_INVALID_BIT_0),
    (1 << 7, EfuseError::WRITE_PPK2_INVALID_BIT_1),
    (1 << 8, EfuseError::WRITE_SAFETY_MISSION_EN),
    (1 << 10, EfuseError::WRITE_PPK3_INVALID_BIT_0),
    (1 << 11, EfuseError::WRITE_PPK3_INVALID_BIT_1),
    (1 << 12, EfuseError::WRITE_PPK4_INVALID_BIT_0),
    (1 << 13, EfuseError::WRITE_PPK4_INVALID_BIT_1),
    (1 << 14, EfuseError::WRITE_LBIST_EN),
    (1 << 15, EfuseError::WRITE_CRYPTO_KAT_EN),
    (0b11 << 16, EfuseError::WRITE_ADD_PPK_EN),
    (0b11 << 19, EfuseError::WRITE_HALT_BOOT_ENV),
    (0b11 << 21, EfuseError::WRITE_HALT_BOOT_ERROR),
];

pub const BOOT_ENV_CTRL_BIT_ERRORS: &[(u32, EfuseError)] =
    &[(0x0036_7C03, EfuseError::WRITE_BOOT_ENV_CTRL)];

pub const SEC_MISC1_BIT_ERRORS: &[(u32, EfuseError)] = &[(0x1FBF, EfuseError::WRITE_MISC1_CTRL)];

pub const PUF_ECC_CTRL_BIT_ERRORS: &[(u32, EfuseError)] = &[
    (1 << 30, EfuseError::WRITE_PUF_REGEN_DIS),
    (1 << 31, EfuseError::WRITE_PUF_HD_INVLD),
];

pub const GLITCH_CFG_BIT_ERRORS: &[(u32, EfuseError)] = &[
    (GLITCH_TRIM_MASK, EfuseError::WRITE_GLITCH_CFG),
    (1 << 31, EfuseError::WRITE_GLITCH_WRLK),
];

pub const DEC_ONLY_BIT_ERRORS: &[(u32, EfuseError)] = &[(DEC_ONLY_MASK, EfuseError::WRITE_DEC_EFUSE_ONLY)];

/// Error naming the bit at `bit` of a row, if the table covers it.
pub fn bit_error(table: &[(u32, EfuseError)], bit: u32) -> Option<EfuseError> {
    table
        .iter()
        .find(|(mask, _)| mask & (1 << bit) != 0)
        .map(|(_, err)| *err)
}

/// Every bit the table can report on.
pub fn table_mask(table: &[(u32, EfuseError)]) -> u32 {
    table.iter().fold(0, |acc, (mask, _)| acc | mask)
}
