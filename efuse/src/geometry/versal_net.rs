// Licensed under the Apache-2.0 license

use super::*;
use crate::control::{DEC_ONLY_MASK, MISC_CTRL_PROT_MASK, SEC_MISC1_PROT_MASK};

use Page::{Page0, Page2};

/// Versal-Net: keys, hashes, IVs and revocation IDs are packed into column
/// ranges of shared rows, so the cache layout no longer follows the array.
pub struct VersalNet;

// keys never reach the cache
const KEY_CACHE_OFFSET: u32 = 0;

const AES_KEY: FieldDescriptor = FieldDescriptor {
    cache_offset: KEY_CACHE_OFFSET,
    words: 8,
    segments: &[
        RowSegment::cols(Page0, 16, 16, 8, 15),
        RowSegment::cols(Page0, 16, 16, 16, 23),
    ],
};

const USER_KEY0: FieldDescriptor = FieldDescriptor {
    cache_offset: KEY_CACHE_OFFSET,
    words: 8,
    segments: &[
        RowSegment::cols(Page0, 56, 8, 8, 15),
        RowSegment::cols(Page0, 66, 8, 8, 23),
        RowSegment::cols(Page0, 74, 8, 8, 15),
    ],
};

const USER_KEY1: FieldDescriptor = FieldDescriptor {
    cache_offset: KEY_CACHE_OFFSET,
    words: 8,
    segments: &[
        RowSegment::cols(Page0, 48, 8, 16, 23),
        RowSegment::cols(Page0, 66, 8, 24, 31),
        RowSegment::cols(Page0, 74, 8, 16, 31),
    ],
};

const PPK0_HASH: FieldDescriptor = FieldDescriptor {
    cache_offset: 0x100,
    words: 8,
    segments: &[RowSegment::cols(Page0, 160, 32, 16, 23)],
};

const PPK1_HASH: FieldDescriptor = FieldDescriptor {
    cache_offset: 0x120,
    words: 8,
    segments: &[RowSegment::cols(Page0, 96, 32, 24, 31)],
};

const PPK2_HASH: FieldDescriptor = FieldDescriptor {
    cache_offset: 0x140,
    words: 8,
    segments: &[RowSegment::cols(Page0, 128, 32, 24, 31)],
};

const META_HEADER_IV: FieldDescriptor = FieldDescriptor {
    cache_offset: 0x180,
    words: 3,
    segments: &[RowSegment::rows(Page0, 90, 3)],
};

const BLACK_IV: FieldDescriptor = FieldDescriptor {
    cache_offset: 0x1D0,
    words: 3,
    segments: &[RowSegment::cols(Page0, 4, 12, 8, 15)],
};

const PLM_IV: FieldDescriptor = FieldDescriptor {
    cache_offset: 0x1DC,
    words: 3,
    segments: &[RowSegment::cols(Page0, 4, 12, 16, 23)],
};

const DATA_PARTITION_IV: FieldDescriptor = FieldDescriptor {
    cache_offset: 0x1E8,
    words: 3,
    segments: &[RowSegment::cols(Page0, 4, 12, 24, 31)],
};

const BOOT_ENV_CTRL: FieldDescriptor = FieldDescriptor {
    cache_offset: 0x94,
    words: 1,
    segments: &[RowSegment::rows(Page0, 37, 1)],
};

const MISC_CTRL: FieldDescriptor = FieldDescriptor {
    cache_offset: 0xA0,
    words: 1,
    segments: &[RowSegment::rows(Page0, 40, 1)],
};

const PUF_ECC_CTRL: FieldDescriptor = FieldDescriptor {
    cache_offset: 0xA4,
    words: 1,
    segments: &[RowSegment::rows(Page0, 41, 1)],
};

const PUF_CHASH: FieldDescriptor = FieldDescriptor {
    cache_offset: 0xA8,
    words: 1,
    segments: &[RowSegment::rows(Page0, 42, 1)],
};

const SEC_CTRL: FieldDescriptor = FieldDescriptor {
    cache_offset: 0xAC,
    words: 1,
    segments: &[RowSegment::rows(Page0, 43, 1)],
};

const SEC_MISC0: FieldDescriptor = FieldDescriptor {
    cache_offset: 0xE4,
    words: 1,
    segments: &[RowSegment::rows(Page0, 45, 1)],
};

const SEC_MISC1: FieldDescriptor = FieldDescriptor {
    cache_offset: 0xE8,
    words: 1,
    segments: &[RowSegment::rows(Page0, 46, 1)],
};

/// Eight IDs per row: ID `n` is column `n % 8` of row `192 + n / 8`.
const REVOCATION_IDS: FieldDescriptor = FieldDescriptor {
    cache_offset: 0xB0,
    words: 8,
    segments: &[RowSegment::cols(Page0, 192, 32, 0, 7)],
};

const OFFCHIP_IDS: FieldDescriptor = FieldDescriptor {
    cache_offset: 0xD0,
    words: 4,
    segments: &[RowSegment::cols(Page0, 224, 16, 0, 7)],
};

/// Eight bits per row next to the black IV.
const GLITCH_CONFIG: FieldDescriptor = FieldDescriptor {
    cache_offset: 0x14,
    words: 1,
    segments: &[RowSegment::cols(Page0, 4, 4, 0, 7)],
};

const DNA: FieldDescriptor = FieldDescriptor {
    cache_offset: 0x20,
    words: 4,
    segments: &[RowSegment::rows(Page0, 32, 4)],
};

const USER_FUSES: FieldDescriptor = FieldDescriptor {
    cache_offset: 0x240,
    words: 16,
    segments: &[RowSegment::rows(Page0, 240, 16)],
};

const PUF_SYNDROME: FieldDescriptor = FieldDescriptor {
    cache_offset: 2 * CACHE_PAGE_SIZE + 129 * 4,
    words: 127,
    segments: &[RowSegment::rows(Page2, 129, 127)],
};

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

impl FieldGeometry for VersalNet {
    fn name(&self) -> &'static str {
        "versal-net"
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
            Field::PpkHash(PpkIndex::Ppk3 | PpkIndex::Ppk4) => return None,
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
        page == Page0 && ((16..=31).contains(&row) || (48..=81).contains(&row))
    }

    fn cache_offset_of_row(&self, page: Page, row: u32) -> Option<u32> {
        let page_base = u32::from(page) * CACHE_PAGE_SIZE;
        match (page, row) {
            (_, 0) => Some(page_base),
            (Page0, 37 | 40..=43) => Some(row * 4),
            (Page0, 45) => Some(SEC_MISC0.cache_offset),
            (Page0, 46) => Some(SEC_MISC1.cache_offset),
            (Page0, 32..=35) => Some(DNA.cache_offset + (row - 32) * 4),
            (Page0, 90..=92) => Some(META_HEADER_IV.cache_offset + (row - 90) * 4),
            (Page0, 240..=255) => Some(USER_FUSES.cache_offset + (row - 240) * 4),
            (Page2, 129..=255) => Some(page_base + row * 4),
            _ => None,
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revocation_id_placement() {
        // ID 64 lands in the ninth row, first column
        let desc = VersalNet.field(Field::RevocationIds).unwrap();
        let seg = desc.segments[0];
        let id = 64;
        assert_eq!(seg.start_row + id / seg.bits_per_row(), 200);
        assert_eq!(seg.col_start + id % seg.bits_per_row(), 0);
    }

    #[test]
    fn test_mirrored_rows() {
        assert_eq!(VersalNet.cache_offset_of_row(Page0, 43), Some(0xAC));
        assert_eq!(VersalNet.cache_offset_of_row(Page0, 45), Some(0xE4));
        assert_eq!(VersalNet.cache_offset_of_row(Page0, 91), Some(0x184));
        assert_eq!(VersalNet.cache_offset_of_row(Page0, 33), Some(0x24));
        assert_eq!(VersalNet.cache_offset_of_row(Page0, 255), Some(0x27C));
        assert_eq!(VersalNet.cache_offset_of_row(Page0, 5), None);
        assert_eq!(VersalNet.cache_offset_of_row(Page::Page1, 0), Some(0x400));
        assert_eq!(VersalNet.cache_offset_of_row(Page0, 160), None);
    }

    #[test]
    fn test_key_rows_cover_key_segments() {
        for slot in [KeySlot::Aes, KeySlot::UserKey0, KeySlot::UserKey1] {
            for seg in VersalNet.field(Field::Key(slot)).unwrap().segments {
                for row in seg.start_row..seg.start_row + seg.row_count {
                    assert!(VersalNet.is_key_row(seg.page, row));
                }
            }
        }
    }
}
