// Licensed under the Apache-2.0 license

use core::num::NonZeroU32;
use core::ops::BitOr;

/// Driver status code.
///
/// The low byte carries the controller or validation cause, bits 8..16 name
/// the field being written or read, and bits 16..22 are flags. Bits 24..28
/// hold validation causes for the additional PPK slots and user fuse rows.
/// Codes are combined with `|`, so a caller sees both the field and the
/// cause.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EfuseError(pub NonZeroU32);
pub type EfuseResult<T> = Result<T, EfuseError>;

/// Category of an [`EfuseError`], independent of the field that failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    InvalidParameter,
    AlreadyProgrammed,
    FuseProtected,
    BitCannotRevert,
    PrerequisiteNotProgrammed,
    EnvironmentOutOfRange,
    Timeout,
    ProgramFailed,
    VerifyMismatch,
    CacheParityError,
    CacheLoadFailed,
    AnchorBitPatternError,
    ProtectionCheckFailed,
    CrcMismatch,
    GlitchDetected,
    SessionBusy,
    Lock,
    Unlock,
    NothingToProgram,
    Other,
}

impl EfuseError {
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("EfuseError cannot be 0"),
        }
    }

    pub const fn code(self) -> u32 {
        self.0.get()
    }

    /// Adds the bits of `other`. Usable in `const` context.
    pub const fn with(self, other: EfuseError) -> Self {
        Self::new_const(self.0.get() | other.0.get())
    }

    pub const fn contains(self, flag: EfuseError) -> bool {
        self.0.get() & flag.0.get() == flag.0.get()
    }

    pub fn kind(self) -> ErrorKind {
        let v = self.0.get();
        if v & Self::SESSION_BUSY.code() != 0 {
            return ErrorKind::SessionBusy;
        }
        if v & Self::GLITCH_DETECTED.code() != 0 {
            return ErrorKind::GlitchDetected;
        }
        if v & Self::FUSE_PROTECTED.code() != 0 {
            return ErrorKind::FuseProtected;
        }
        match v & 0xF {
            0x2 => return ErrorKind::InvalidParameter,
            0x3 | 0x4 | 0xA => return ErrorKind::Timeout,
            0x5 => return ErrorKind::CacheParityError,
            0xC => return ErrorKind::CacheLoadFailed,
            0x6 => return ErrorKind::Lock,
            0x7 => return ErrorKind::Unlock,
            0x8 => return ErrorKind::VerifyMismatch,
            0x9 => return ErrorKind::ProgramFailed,
            0xB | 0xE => return ErrorKind::AnchorBitPatternError,
            0xD => return ErrorKind::CrcMismatch,
            0xF => return ErrorKind::ProtectionCheckFailed,
            _ => {}
        }
        match v & 0xF0 {
            0xB0 | 0xC0 => return ErrorKind::PrerequisiteNotProgrammed,
            0xF0 => return ErrorKind::BitCannotRevert,
            0x10..=0xE0 => return ErrorKind::AlreadyProgrammed,
            _ => {}
        }
        match v & 0x0F00_0000 {
            0x0100_0000 | 0x0200_0000 => return ErrorKind::AlreadyProgrammed,
            0x0300_0000 | 0x0400_0000 => return ErrorKind::PrerequisiteNotProgrammed,
            0x0500_0000 => return ErrorKind::FuseProtected,
            _ => {}
        }
        match v & 0xFF00 {
            0xF000 => ErrorKind::NothingToProgram,
            0xF100 | 0xF200 => ErrorKind::EnvironmentOutOfRange,
            _ => ErrorKind::Other,
        }
    }

    // controller
    pub const INVALID_PARAM: EfuseError = Self::new_const(0x2);
    pub const CACHE_LOAD_TIMEOUT: EfuseError = Self::new_const(0x3);
    pub const RD_TIMEOUT: EfuseError = Self::new_const(0x4);
    pub const CACHE_PARITY: EfuseError = Self::new_const(0x5);
    pub const LOCK: EfuseError = Self::new_const(0x6);
    pub const UNLOCK: EfuseError = Self::new_const(0x7);
    pub const PGM_VERIFY: EfuseError = Self::new_const(0x8);
    pub const PGM: EfuseError = Self::new_const(0x9);
    pub const PGM_TIMEOUT: EfuseError = Self::new_const(0xA);
    pub const PGM_TBIT_PATTERN: EfuseError = Self::new_const(0xB);
    pub const CACHE_LOAD: EfuseError = Self::new_const(0xC);
    pub const CRC_VERIFICATION: EfuseError = Self::new_const(0xD);
    pub const ANCHOR_BIT_PATTERN: EfuseError = Self::new_const(0xE);
    pub const IN_PROTECTION_CHECK: EfuseError = Self::new_const(0xF);

    // validation
    pub const AES_ALREADY_PRGMD: EfuseError = Self::new_const(0x10);
    pub const USER_KEY0_ALREADY_PRGMD: EfuseError = Self::new_const(0x20);
    pub const USER_KEY1_ALREADY_PRGMD: EfuseError = Self::new_const(0x30);
    pub const PPK0_HASH_ALREADY_PRGMD: EfuseError = Self::new_const(0x40);
    pub const PPK1_HASH_ALREADY_PRGMD: EfuseError = Self::new_const(0x50);
    pub const PPK2_HASH_ALREADY_PRGMD: EfuseError = Self::new_const(0x60);
    pub const BLK_OBFUS_IV_ALREADY_PRGMD: EfuseError = Self::new_const(0x70);
    pub const PUF_SYN_ALREADY_PRGMD: EfuseError = Self::new_const(0x80);
    pub const PUF_CHASH_ALREADY_PRGMD: EfuseError = Self::new_const(0x90);
    pub const PUF_AUX_ALREADY_PRGMD: EfuseError = Self::new_const(0xA0);
    pub const DEC_ONLY_KEY_MUST_BE_PRGMD: EfuseError = Self::new_const(0xB0);
    pub const DEC_ONLY_IV_MUST_BE_PRGMD: EfuseError = Self::new_const(0xC0);
    pub const DEC_ONLY_ALREADY_PRGMD: EfuseError = Self::new_const(0xD0);
    pub const BOOT_ENV_CTRL_ALREADY_PRGMD: EfuseError = Self::new_const(0xE0);
    pub const BIT_CANT_REVERT: EfuseError = Self::new_const(0xF0);
    pub const PPK3_HASH_ALREADY_PRGMD: EfuseError = Self::new_const(0x0100_0000);
    pub const PPK4_HASH_ALREADY_PRGMD: EfuseError = Self::new_const(0x0200_0000);
    /// PPK3 and PPK4 need PPK0..2 programmed first.
    pub const ADD_PPK_PGM_NOT_ALLOWED: EfuseError = Self::new_const(0x0300_0000);
    pub const ADD_PPK_NOT_ENABLED: EfuseError = Self::new_const(0x0400_0000);
    /// User fuse rows that hold PPK3 or PPK4 once those slots are enabled.
    pub const USER_FUSE_PGM_NOT_ALLOWED: EfuseError = Self::new_const(0x0500_0000);

    // field writes
    pub const WRITE_AES_KEY: EfuseError = Self::new_const(0x8000);
    pub const WRITE_USER_KEY0: EfuseError = Self::new_const(0x8100);
    pub const WRITE_USER_KEY1: EfuseError = Self::new_const(0x8200);
    pub const WRITE_PPK0_HASH: EfuseError = Self::new_const(0x8300);
    pub const WRITE_PPK1_HASH: EfuseError = Self::new_const(0x8400);
    pub const WRITE_PPK2_HASH: EfuseError = Self::new_const(0x8500);
    pub const WRITE_DEC_EFUSE_ONLY: EfuseError = Self::new_const(0x8600);
    pub const WRITE_META_HEADER_IV: EfuseError = Self::new_const(0x8700);
    pub const WRITE_BLK_OBFUS_IV: EfuseError = Self::new_const(0x8800);
    pub const WRITE_PLM_IV: EfuseError = Self::new_const(0x8900);
    pub const WRITE_DATA_PARTITION_IV: EfuseError = Self::new_const(0x8A00);
    pub const WRITE_AES_DIS: EfuseError = Self::new_const(0x8B00);
    pub const WRITE_JTAG_ERROUT_DIS: EfuseError = Self::new_const(0x8C00);
    pub const WRITE_JTAG_DIS: EfuseError = Self::new_const(0x8D00);
    pub const WRITE_PPK0_WR_LK: EfuseError = Self::new_const(0x9000);
    pub const WRITE_PPK1_WR_LK: EfuseError = Self::new_const(0x9100);
    pub const WRITE_PPK2_WR_LK: EfuseError = Self::new_const(0x9200);
    pub const WRITE_AES_CRC_LK_BIT_0: EfuseError = Self::new_const(0x9300);
    pub const WRITE_AES_CRC_LK_BIT_1: EfuseError = Self::new_const(0x9400);
    pub const WRITE_AES_WR_LK: EfuseError = Self::new_const(0x9500);
    pub const WRITE_USER_KEY0_CRC_LK: EfuseError = Self::new_const(0x9600);
    pub const WRITE_USER_KEY0_WR_LK: EfuseError = Self::new_const(0x9700);
    pub const WRITE_USER_KEY1_CRC_LK: EfuseError = Self::new_const(0x9800);
    pub const WRITE_USER_KEY1_WR_LK: EfuseError = Self::new_const(0x9900);
    pub const WRITE_SECDBG_DIS_BIT_0: EfuseError = Self::new_const(0x9A00);
    pub const WRITE_SECDBG_DIS_BIT_1: EfuseError = Self::new_const(0x9B00);
    pub const WRITE_SECLOCKDBG_DIS_BIT_0: EfuseError = Self::new_const(0x9C00);
    pub const WRITE_SECLOCKDBG_DIS_BIT_1: EfuseError = Self::new_const(0x9D00);
    pub const WRITE_BOOTENV_WR_LK: EfuseError = Self::new_const(0xA300);
    pub const WRITE_REG_INIT_DIS_BIT_0: EfuseError = Self::new_const(0xA500);
    pub const WRITE_REG_INIT_DIS_BIT_1: EfuseError = Self::new_const(0xA600);
    pub const WRITE_PPK0_INVALID_BIT_0: EfuseError = Self::new_const(0xA700);
    pub const WRITE_PPK0_INVALID_BIT_1: EfuseError = Self::new_const(0xA800);
    pub const WRITE_PPK1_INVALID_BIT_0: EfuseError = Self::new_const(0xA900);
    pub const WRITE_PPK1_INVALID_BIT_1: EfuseError = Self::new_const(0xAA00);
    pub const WRITE_PPK2_INVALID_BIT_0: EfuseError = Self::new_const(0xAB00);
    pub const WRITE_PPK2_INVALID_BIT_1: EfuseError = Self::new_const(0xAC00);
    pub const WRITE_SAFETY_MISSION_EN: EfuseError = Self::new_const(0xAD00);
    pub const WRITE_LBIST_EN: EfuseError = Self::new_const(0xAE00);
    pub const WRITE_CRYPTO_KAT_EN: EfuseError = Self::new_const(0xAF00);
    pub const WRITE_PUF_HELPER_DATA: EfuseError = Self::new_const(0xB000);
    pub const WRITE_PUF_SYN_DATA: EfuseError = Self::new_const(0xB100);
    pub const WRITE_PUF_CHASH: EfuseError = Self::new_const(0xB200);
    pub const WRITE_PUF_AUX: EfuseError = Self::new_const(0xB300);
    pub const WRITE_PUF_REGEN_DIS: EfuseError = Self::new_const(0xB400);
    pub const WRITE_PUF_HD_INVLD: EfuseError = Self::new_const(0xB500);
    pub const WRITE_PUF_TEST2_DIS: EfuseError = Self::new_const(0xB600);
    pub const WRITE_PUF_SYN_LK: EfuseError = Self::new_const(0xB700);
    pub const WRITE_PUF_DIS: EfuseError = Self::new_const(0xB800);
    pub const WRITE_HALT_BOOT_ERROR: EfuseError = Self::new_const(0xB900);
    pub const WRITE_HALT_BOOT_ENV: EfuseError = Self::new_const(0xBA00);
    pub const WRITE_MISC1_CTRL: EfuseError = Self::new_const(0xBD00);
    pub const WRITE_BOOT_ENV_CTRL: EfuseError = Self::new_const(0xBE00);
    pub const WRITE_REVOCATION_IDS: EfuseError = Self::new_const(0xC000);
    pub const WRITE_OFFCHIP_REVOKE_IDS: EfuseError = Self::new_const(0xC100);
    pub const WRITE_PUF_FUSES: EfuseError = Self::new_const(0xC200);
    pub const WRITE_USER_FUSES: EfuseError = Self::new_const(0xC300);
    pub const WRITE_PPK3_HASH: EfuseError = Self::new_const(0xC400);
    pub const WRITE_PPK4_HASH: EfuseError = Self::new_const(0xC500);
    pub const WRITE_PPK3_INVALID_BIT_0: EfuseError = Self::new_const(0xC600);
    pub const WRITE_PPK3_INVALID_BIT_1: EfuseError = Self::new_const(0xC700);
    pub const WRITE_PPK4_INVALID_BIT_0: EfuseError = Self::new_const(0xC800);
    pub const WRITE_PPK4_INVALID_BIT_1: EfuseError = Self::new_const(0xC900);
    pub const WRITE_ADD_PPK_EN: EfuseError = Self::new_const(0xCA00);

    // reads
    pub const RD_SEC_CTRL_BITS: EfuseError = Self::new_const(0xD000);
    pub const RD_MISC_CTRL_BITS: EfuseError = Self::new_const(0xD100);
    pub const RD_PUF_SEC_CTRL: EfuseError = Self::new_const(0xD200);
    pub const RD_PPK_HASH: EfuseError = Self::new_const(0xD300);
    pub const RD_REVOCATION_ID: EfuseError = Self::new_const(0xD400);
    pub const RD_OFFCHIP_REVOKE_ID: EfuseError = Self::new_const(0xD500);
    pub const RD_META_HEADER_IV: EfuseError = Self::new_const(0xD600);
    pub const RD_BLACK_IV: EfuseError = Self::new_const(0xD700);
    pub const RD_PLM_IV: EfuseError = Self::new_const(0xD800);
    pub const RD_DATA_PARTITION_IV: EfuseError = Self::new_const(0xD900);
    pub const RD_DEC_ONLY: EfuseError = Self::new_const(0xDA00);
    pub const RD_BOOT_ENV_CTRL: EfuseError = Self::new_const(0xDB00);
    pub const RD_PUF_HELPER_DATA: EfuseError = Self::new_const(0xDC00);
    pub const RD_SEC_MISC1_CTRL: EfuseError = Self::new_const(0xDD00);
    pub const RD_DNA: EfuseError = Self::new_const(0xDE00);
    pub const RD_USER_FUSES: EfuseError = Self::new_const(0xDF00);
    pub const RD_PUF_FUSES: EfuseError = Self::new_const(0xCB00);
    pub const RD_GLITCH_CFG: EfuseError = Self::new_const(0xCC00);

    // protection rows
    pub const WRITE_ROW_37_PROT: EfuseError = Self::new_const(0xE000);
    pub const WRITE_ROW_40_PROT: EfuseError = Self::new_const(0xE100);
    pub const WRITE_ROW_42_PROT: EfuseError = Self::new_const(0xE200);
    pub const WRITE_ROW_43_0_PROT: EfuseError = Self::new_const(0xE300);
    pub const WRITE_ROW_43_1_PROT: EfuseError = Self::new_const(0xE400);
    pub const WRITE_ROW_57_0_PROT: EfuseError = Self::new_const(0xE500);
    pub const WRITE_ROW_57_1_PROT: EfuseError = Self::new_const(0xE600);
    pub const WRITE_ROW_58_PROT: EfuseError = Self::new_const(0xE700);
    pub const WRITE_ROW64_87_0_PROT: EfuseError = Self::new_const(0xE800);
    pub const WRITE_ROW64_87_1_PROT: EfuseError = Self::new_const(0xE900);
    pub const WRITE_ROW96_99_0_PROT: EfuseError = Self::new_const(0xEA00);
    pub const WRITE_ROW96_99_1_PROT: EfuseError = Self::new_const(0xEB00);
    pub const WRITE_GLITCH_CFG: EfuseError = Self::new_const(0xEC00);
    pub const WRITE_GLITCH_WRLK: EfuseError = Self::new_const(0xED00);
    pub const WRITE_GD_ROM_BITS: EfuseError = Self::new_const(0xEE00);

    // session and environment
    pub const NOTHING_TO_PROGRAM: EfuseError = Self::new_const(0xF000);
    pub const TEMP_OUT_OF_RANGE: EfuseError = Self::new_const(0xF100);
    pub const VOLT_OUT_OF_RANGE: EfuseError = Self::new_const(0xF200);

    // flags
    pub const GLITCH_DETECTED: EfuseError = Self::new_const(0x2_0000);
    pub const FUSE_PROTECTED: EfuseError = Self::new_const(0x4_0000);
    pub const BEFORE_PROGRAMMING: EfuseError = Self::new_const(0x8_0000);
    pub const TEARDOWN_FAILED: EfuseError = Self::new_const(0x10_0000);
    pub const SESSION_BUSY: EfuseError = Self::new_const(0x20_0000);
}

impl BitOr for EfuseError {
    type Output = EfuseError;

    fn bitor(self, rhs: EfuseError) -> EfuseError {
        self.with(rhs)
    }
}

impl From<EfuseError> for u32 {
    fn from(err: EfuseError) -> u32 {
        err.code()
    }
}

impl core::fmt::Display for EfuseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?} ({})", self.kind(), romtime::HexWord(self.code()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_codes_keep_both_parts() {
        let err = EfuseError::WRITE_PPK0_HASH | EfuseError::PGM_VERIFY;
        assert_eq!(err.code(), 0x8308);
        assert_eq!(err.kind(), ErrorKind::VerifyMismatch);
        assert!(err.contains(EfuseError::WRITE_PPK0_HASH));
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            (EfuseError::FUSE_PROTECTED | EfuseError::WRITE_AES_KEY).kind(),
            ErrorKind::FuseProtected
        );
        assert_eq!(
            (EfuseError::BEFORE_PROGRAMMING | EfuseError::TEMP_OUT_OF_RANGE).kind(),
            ErrorKind::EnvironmentOutOfRange
        );
        assert_eq!(
            (EfuseError::BEFORE_PROGRAMMING
                | EfuseError::BIT_CANT_REVERT
                | EfuseError::WRITE_PLM_IV)
                .kind(),
            ErrorKind::BitCannotRevert
        );
        assert_eq!(
            EfuseError::DEC_ONLY_IV_MUST_BE_PRGMD.kind(),
            ErrorKind::PrerequisiteNotProgrammed
        );
        assert_eq!(
            EfuseError::PPK1_HASH_ALREADY_PRGMD.kind(),
            ErrorKind::AlreadyProgrammed
        );
        assert_eq!(EfuseError::IN_PROTECTION_CHECK.kind(), ErrorKind::ProtectionCheckFailed);
        assert_eq!(EfuseError::ANCHOR_BIT_PATTERN.kind(), ErrorKind::AnchorBitPatternError);
        assert_eq!(EfuseError::PGM_TIMEOUT.kind(), ErrorKind::Timeout);
        assert_eq!(EfuseError::NOTHING_TO_PROGRAM.kind(), ErrorKind::NothingToProgram);
        assert_eq!(
            (EfuseError::IN_PROTECTION_CHECK | EfuseError::GLITCH_DETECTED).kind(),
            ErrorKind::GlitchDetected
        );
    }

    #[test]
    fn test_cache_load_failure_is_not_a_timeout() {
        assert_eq!(EfuseError::CACHE_LOAD.kind(), ErrorKind::CacheLoadFailed);
        assert_eq!(EfuseError::CACHE_LOAD_TIMEOUT.kind(), ErrorKind::Timeout);
        assert_ne!(EfuseError::CACHE_LOAD, EfuseError::CACHE_LOAD_TIMEOUT);
    }

    #[test]
    fn test_extended_validation_kinds() {
        assert_eq!(
            (EfuseError::PPK3_HASH_ALREADY_PRGMD | EfuseError::WRITE_PPK3_HASH).kind(),
            ErrorKind::AlreadyProgrammed
        );
        assert_eq!(
            (EfuseError::ADD_PPK_NOT_ENABLED | EfuseError::BEFORE_PROGRAMMING).kind(),
            ErrorKind::PrerequisiteNotProgrammed
        );
        assert_eq!(
            (EfuseError::USER_FUSE_PGM_NOT_ALLOWED | EfuseError::WRITE_USER_FUSES).kind(),
            ErrorKind::FuseProtected
        );
        // a controller cause still wins over the field byte
        assert_eq!(
            (EfuseError::WRITE_PPK4_HASH | EfuseError::PGM).kind(),
            ErrorKind::ProgramFailed
        );
    }

    #[test]
    fn test_teardown_flag_does_not_mask_cause() {
        let err = EfuseError::PGM | EfuseError::TEARDOWN_FAILED;
        assert_eq!(err.kind(), ErrorKind::ProgramFailed);
        assert!(err.contains(EfuseError::TEARDOWN_FAILED));
    }
}
