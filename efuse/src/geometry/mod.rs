// Licensed under the Apache-2.0 license

//! Physical placement of every logical field, per chip variant.

mod versal;
mod versal_net;
mod zynqmp;

pub use versal::Versal;
pub use versal_net::VersalNet;
pub use zynqmp::ZynqMp;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::EfuseError;

pub const ROWS_PER_PAGE: u32 = 256;
pub const COLS_PER_ROW: u32 = 32;
pub const CACHE_PAGE_SIZE: u32 = 0x400;

#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum Page {
    Page0 = 0,
    Page1 = 1,
    Page2 = 2,
}

impl Page {
    pub fn from_index(page: u32) -> Result<Page, EfuseError> {
        Page::try_from(page).map_err(|_| EfuseError::INVALID_PARAM)
    }
}

/// Symmetric key slots. Their content never reaches the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySlot {
    Aes,
    UserKey0,
    UserKey1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum PpkIndex {
    Ppk0 = 0,
    Ppk1 = 1,
    Ppk2 = 2,
    /// Additional slots, usable once enabled in misc control.
    Ppk3 = 3,
    Ppk4 = 4,
}

impl PpkIndex {
    pub const fn is_additional(self) -> bool {
        matches!(self, PpkIndex::Ppk3 | PpkIndex::Ppk4)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IvKind {
    MetaHeader,
    BlackObfus,
    Plm,
    DataPartition,
}

/// Named logical values held in the array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Key(KeySlot),
    PpkHash(PpkIndex),
    Iv(IvKind),
    BootEnvControl,
    MiscControl,
    PufEccControl,
    PufChash,
    PufSyndrome,
    SecurityControl,
    SecurityMisc0,
    SecurityMisc1,
    RevocationIds,
    OffChipIds,
    /// General-purpose rows. PPK3 and PPK4 reuse the tail where present.
    UserFuses,
    /// Factory-programmed device identifier.
    Dna,
    /// Glitch detector trim; the top bit write-locks it.
    GlitchConfig,
}

/// Rows `start_row..start_row + row_count` of `page`, columns
/// `col_start..=col_end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowSegment {
    pub page: Page,
    pub start_row: u32,
    pub row_count: u32,
    pub col_start: u32,
    pub col_end: u32,
}

impl RowSegment {
    pub const fn rows(page: Page, start_row: u32, row_count: u32) -> Self {
        Self::cols(page, start_row, row_count, 0, COLS_PER_ROW - 1)
    }

    pub const fn cols(page: Page, start_row: u32, row_count: u32, col_start: u32, col_end: u32) -> Self {
        RowSegment {
            page,
            start_row,
            row_count,
            col_start,
            col_end,
        }
    }

    pub const fn bits_per_row(&self) -> u32 {
        self.col_end - self.col_start + 1
    }

    pub const fn is_full_row(&self) -> bool {
        self.col_start == 0 && self.col_end == COLS_PER_ROW - 1
    }
}

/// Placement of a field.
///
/// Field data is a little-endian bit string: bit `i` of the value is bit
/// `i % 32` of word `i / 32`. In the cache the value occupies `words`
/// consecutive words at `cache_offset`. In the array its bits are laid out
/// sequentially over the segments, row by row, from `col_start` to `col_end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub cache_offset: u32,
    pub words: usize,
    pub segments: &'static [RowSegment],
}

impl FieldDescriptor {
    pub fn bit_count(&self) -> u32 {
        self.segments
            .iter()
            .map(|s| s.row_count * s.bits_per_row())
            .sum()
    }

    /// Physical location of bit `bit` of the field value.
    pub fn locate(&self, mut bit: u32) -> Option<(Page, u32, u32)> {
        for seg in self.segments {
            let seg_bits = seg.row_count * seg.bits_per_row();
            if bit < seg_bits {
                let row = seg.start_row + bit / seg.bits_per_row();
                let col = seg.col_start + bit % seg.bits_per_row();
                return Some((seg.page, row, col));
            }
            bit -= seg_bits;
        }
        None
    }
}

/// Register and status bits of the controller's key CRC engine for a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyCrcRegs {
    pub offset: u32,
    pub done_mask: u32,
    pub pass_mask: u32,
}

/// Location and expected value of the anchor bits, plus the row holding the
/// protection indicators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TbitsLayout {
    pub row: u32,
    pub cache_offset: u32,
    pub anchor_mask: u32,
    pub anchor_expected: u32,
    /// Columns programmed on every page when provisioning anchors.
    pub anchor_columns: &'static [u32],
    /// STATUS bits reporting anchors present on each page.
    pub status_mask: u32,
}

/// Condition on cached state that makes a protection rule apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Guard {
    /// Some word of `words` at `offset`, masked, is non-zero.
    AnyNonZero { offset: u32, words: u32, mask: u32 },
    /// The masked word is non-zero. Once protected it must be all ones.
    Exact { offset: u32, mask: u32 },
    /// Every listed word is non-zero.
    AllNonZero { offsets: &'static [u32] },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtectionRule {
    pub guard: Guard,
    /// Indicator columns in the tbits row and the error for each.
    pub columns: &'static [(u32, EfuseError)],
}

/// Per-variant field geometry.
pub trait FieldGeometry: Sync {
    fn name(&self) -> &'static str;

    fn pages(&self) -> u32;

    fn field(&self, field: Field) -> Option<&'static FieldDescriptor>;

    /// Rows holding key material, which cannot be read back.
    fn is_key_row(&self, page: Page, row: u32) -> bool;

    /// Cache word mirroring `row` of `page`, if the cache mirrors it directly.
    fn cache_offset_of_row(&self, page: Page, row: u32) -> Option<u32>;

    fn key_crc(&self, slot: KeySlot) -> Option<KeyCrcRegs>;

    fn tbits(&self) -> Option<&'static TbitsLayout>;

    fn protection_rules(&self) -> &'static [ProtectionRule];

    fn field_or_invalid(&self, field: Field) -> Result<&'static FieldDescriptor, EfuseError> {
        self.field(field).ok_or(EfuseError::INVALID_PARAM)
    }
}

pub(crate) const TBITS_ANCHOR_COLUMNS: &[u32] = &[29, 31];

pub(crate) const VERSAL_TBITS: TbitsLayout = TbitsLayout {
    row: 0,
    cache_offset: 0,
    anchor_mask: crate::control::ANCHOR_MASK,
    anchor_expected: crate::control::ANCHOR_EXPECTED,
    anchor_columns: TBITS_ANCHOR_COLUMNS,
    status_mask: 0x7,
};

pub(crate) const AES_CRC_REGS: KeyCrcRegs = KeyCrcRegs {
    offset: crate::regs::AES_CRC,
    done_mask: 0x40,
    pass_mask: 0x80,
};
pub(crate) const USR_KEY0_CRC_REGS: KeyCrcRegs = KeyCrcRegs {
    offset: crate::regs::AES_USR_KEY0_CRC,
    done_mask: 0x100,
    pass_mask: 0x200,
};
pub(crate) const USR_KEY1_CRC_REGS: KeyCrcRegs = KeyCrcRegs {
    offset: crate::regs::AES_USR_KEY1_CRC,
    done_mask: 0x400,
    pass_mask: 0x800,
};
