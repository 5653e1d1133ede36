// Licensed under the Apache-2.0 license

use super::*;

use Page::Page0;

/// ZynqMP: a single page with the AES key, eight user fuse rows, the
/// security control row, one row of SPK revocation IDs and two 384-bit PPK
/// slots. There are no anchors or protection rows.
pub struct ZynqMp;

const USER_FUSES: FieldDescriptor = FieldDescriptor {
    cache_offset: 8 * 4,
    words: 8,
    segments: &[RowSegment::rows(Page0, 8, 8)],
};

const SEC_CTRL: FieldDescriptor = FieldDescriptor {
    cache_offset: 22 * 4,
    words: 1,
    segments: &[RowSegment::rows(Page0, 22, 1)],
};

const REVOCATION_IDS: FieldDescriptor = FieldDescriptor {
    cache_offset: 23 * 4,
    words: 1,
    segments: &[RowSegment::rows(Page0, 23, 1)],
};

const AES_KEY: FieldDescriptor = FieldDescriptor {
    cache_offset: 24 * 4,
    words: 8,
    segments: &[RowSegment::rows(Page0, 24, 8)],
};

const PPK0_HASH: FieldDescriptor = FieldDescriptor {
    cache_offset: 40 * 4,
    words: 12,
    segments: &[RowSegment::rows(Page0, 40, 12)],
};

const PPK1_HASH: FieldDescriptor = FieldDescriptor {
    cache_offset: 52 * 4,
    words: 12,
    segments: &[RowSegment::rows(Page0, 52, 12)],
};

impl FieldGeometry for ZynqMp {
    fn name(&self) -> &'static str {
        "zynqmp"
    }

    fn pages(&self) -> u32 {
        1
    }

    fn field(&self, field: Field) -> Option<&'static FieldDescriptor> {
        match field {
            Field::Key(KeySlot::Aes) => Some(&AES_KEY),
            Field::SecurityControl => Some(&SEC_CTRL),
            Field::RevocationIds => Some(&REVOCATION_IDS),
            Field::UserFuses => Some(&USER_FUSES),
            Field::PpkHash(PpkIndex::Ppk0) => Some(&PPK0_HASH),
            Field::PpkHash(PpkIndex::Ppk1) => Some(&PPK1_HASH),
            _ => None,
        }
    }

    fn is_key_row(&self, page: Page, row: u32) -> bool {
        page == Page0 && (24..32).contains(&row)
    }

    fn cache_offset_of_row(&self, page: Page, row: u32) -> Option<u32> {
        (page == Page0 && row < ROWS_PER_PAGE).then_some(row * 4)
    }

    fn key_crc(&self, slot: KeySlot) -> Option<KeyCrcRegs> {
        match slot {
            KeySlot::Aes => Some(AES_CRC_REGS),
            _ => None,
        }
    }

    fn tbits(&self) -> Option<&'static TbitsLayout> {
        None
    }

    fn protection_rules(&self) -> &'static [ProtectionRule] {
        &[]
    }
}
