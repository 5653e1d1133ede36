// Licensed under the Apache-2.0 license

use super::*;
use crate::control::{DEC_ONLY_MASK, MISC_CTRL_PROT_MASK, SEC_MISC1_PROT_MASK};

use Page::{Page0, Page2};

/// Versal: every row is a full 32-bit word and the cache mirrors the array
/// row for row.
pub struct Versal;

const fn row_offset(row: u32) -> u32 {
    row * 4
}

macro_rules! full_field {
    ($name:ident, $page:expr, $start:expr, $rows:expr) => {
        const $name: FieldDescriptor = FieldDescriptor {
            cache_offset: $page as u32 * CACHE_PAGE_SIZE + row_offset($start),
            words: $rows,
            segments: &[RowSegment::rows($page, $start, $rows)],
        };
    };
}

pub(crate) const AES_KEY_START_ROW: u32 = 12;
pub(crate) const USER_KEY1_END_ROW: u32 = 35;

full_field!(AES_KEY, Page0, 12, 8);
full_field!(USER_KEY0, Page0, 20, 8);
full_field!(USER_KEY1, Page0, 28, 8);
full_field!(BOOT_ENV_CTRL, Page0, 37, 1);
full_field!(MISC_CTRL, Page0, 40, 1);
full_field!(PUF_ECC_CTRL, Page0, 41, 1);
full_field!(PUF_CHASH, Page0, 42, 1);
full_field!(SEC_CTRL, Page0, 43, 1);
full_field!(REVOCATION_IDS, Page0, 44, 8);
full_field!(OFFCHIP_IDS, Page0, 52, 4);
full_field!(SEC_MISC0, Page0, 57, 1);
full_field!(SEC_MISC1, Page0, 58, 1);
full_field!(PPK0_HASH, Page0, 64, 8);
full_field!(PPK1_HASH, Page0, 72, 8);
full_field!(PPK2_HASH, Page0, 80, 8);
full_field!(META_HEADER_IV, Page0, 96, 3);
full_field!(BLACK_IV, Page0, 116, 3);
full_field!(PLM_IV, Page0, 119, 3);
full_field!(DATA_PARTITION_IV, Page0, 122, 3);
full_field!(PUF_SYNDROME, Page2, 129, 127);
full_field!(GLITCH_CONFIG, Page0, 5, 1);
full_field!(DNA, Page0, 60, 4);
// user fuse n (1-based) is row 192 + n
full_field!(USER_FUSES, Page0, 193, 63);
full_field!(PPK3_HASH, Page0, 240, 8);
full_field!(PPK4_HASH, Page0, 248, 8);

// factory trim rows that must be populated before boot env control is protected
const ANLG_TRIM_2: u32 = row_offset(4);
const ANLG_TRIM_6: u32 = row_offset(8);
const ANLG_TRIM_7: u32 = row_offset(9);
const TRIM_AMS_12: u32 = row_offset(59);

const RULES: &[ProtectionRule] = &[
    ProtectionRule {
        guard: Guard::AnyNonZero {
            offset: SEC_CTRL.cache_offset,
            words: 1,
            mask: u32::MAX,
        },
        columns: &[
            (19, EfuseError::WRITE_ROW_43_0_PROT),
            (20, EfuseError::WRITE_ROW_43_1_PROT),
        ],
    },
    ProtectionRule {
        guard: Guard::Exact {
            offset: SEC_MISC0.cache_offset,
            mask: DEC_ONLY_MASK,
        },
        columns: &[
            (21, EfuseError::WRITE_ROW_57_0_PROT),
            (22, EfuseError::WRITE_ROW_57_1_PROT),
        ],
    },
    ProtectionRule {
        guard: Guard::AnyNonZero {
            offset: PPK0_HASH.cache_offset,
            words: 24,
            mask: u32::MAX,
        },
        columns: &[
            (24, EfuseError::WRITE_ROW64_87_0_PROT),
            (25, EfuseError::WRITE_ROW64_87_1_PROT),
        ],
    },
    ProtectionRule {
        guard: Guard::AnyNonZero {
            offset: META_HEADER_IV.cache_offset,
            words: 3,
            mask: u32::MAX,
        },
        columns: &[
            (26, EfuseError::WRITE_ROW96_99_0_PROT),
            (27, EfuseError::WRITE_ROW96_99_1_PROT),
        ],
    },
    ProtectionRule {
        guard: Guard::AllNonZero {
            offsets: &[
                BOOT_ENV_CTRL.cache_offset,
                ANLG_TRIM_2,
                ANLG_TRIM_6,
                ANLG_TRIM_7,
                TRIM_AMS_12,
            ],
        },
        columns: &[(16, EfuseError::WRITE_ROW_37_PROT)],
    },
    ProtectionRule {
        guard: Guard::AnyNonZero {
            offset: MISC_CTRL.cache_offset,
            words: 1,
            mask: MISC_CTRL_PROT_MASK,
        },
        columns: &[(17, EfuseError::WRITE_ROW_40_PROT)],
    },
    ProtectionRule {
        guard: Guard::AnyNonZero {
            offset: PUF_CHASH.cache_offset,
            words: 1,
            mask: u32::MAX,
        },
        columns: &[(18, EfuseError::WRITE_ROW_42_PROT)],
    },
    ProtectionRule {
        guard: Guard::AnyNonZero {
            offset: SEC_MISC1.cache_offset,
            words: 1,
            mask: SEC_MISC1_PROT_MASK,
        },
        columns: &[(23, EfuseError::WRITE_ROW_58_PROT)],
    },
];

impl FieldGeometry for Versal {
    fn name(&self) -> &'static str {
        "versal"
    }

    fn pages(&self) -> u32 {
        3
    }

    fn field(&self, field: Field) -> Option<&'static FieldDescriptor> {
        let desc = match field {
            Field::Key(KeySlot::Aes) => &AES_KEY,
            Field::Key(KeySlot::UserKey0) => &USER_KEY0,
            Field::Key(KeySlot::UserKey1) => &USER_KEY1,
            Field::PpkHash(PpkIndex::Ppk0) => &PPK0_HASH,
            Field::PpkHash(PpkIndex::Ppk1) => &PPK1_HASH,
            Field::PpkHash(PpkIndex::Ppk2) => &PPK2_HASH,
            Field::PpkHash(PpkIndex::Ppk3) => &PPK3_HASH,
            Field::PpkHash(PpkIndex::Ppk4) => &PPK4_HASH,
            Field::Iv(IvKind::MetaHeader) => &META_HEADER_IV,
            Field::Iv(IvKind::BlackObfus) => &BLACK_IV,
            Field::Iv(IvKind::Plm) => &PLM_IV,
            Field::Iv(IvKind::DataPartition) => &DATA_PARTITION_IV,
            Field::BootEnvControl => &BOOT_ENV_CTRL,
            Field::MiscControl => &MISC_CTRL,
            Field::PufEccControl => &PUF_ECC_CTRL,
            Field::PufChash => &PUF_CHASH,
            Field::PufSyndrome => &PUF_SYNDROME,
            Field::SecurityControl => &SEC_CTRL,
            Field::SecurityMisc0 => &SEC_MISC0,
            Field::SecurityMisc1 => &SEC_MISC1,
            Field::RevocationIds => &REVOCATION_IDS,
            Field::OffChipIds => &OFFCHIP_IDS,
            Field::UserFuses => &USER_FUSES,
            Field::Dna => &DNA,
            Field::GlitchConfig => &GLITCH_CONFIG,
        };
        Some(desc)
    }

    fn is_key_row(&self, page: Page, row: u32) -> bool {
        page == Page0 && (AES_KEY_START_ROW..=USER_KEY1_END_ROW).contains(&row)
    }

    fn cache_offset_of_row(&self, page: Page, row: u32) -> Option<u32> {
        if row >= ROWS_PER_PAGE {
            return None;
        }
        Some(u32::from(page) * CACHE_PAGE_SIZE + row_offset(row))
    }

    fn key_crc(&self, slot: KeySlot) -> Option<KeyCrcRegs> {
        Some(match slot {
            KeySlot::Aes => AES_CRC_REGS,
            KeySlot::UserKey0 => USR_KEY0_CRC_REGS,
            KeySlot::UserKey1 => USR_KEY1_CRC_REGS,
        })
    }

    fn tbits(&self) -> Option<&'static TbitsLayout> {
        Some(&VERSAL_TBITS)
    }

    fn protection_rules(&self) -> &'static [ProtectionRule] {
        RULES
    }
}
