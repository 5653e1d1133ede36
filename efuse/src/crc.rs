// Licensed under the Apache-2.0 license

//! CRC of a 256-bit key as computed by the controller's key check engine.

use crate::request::{AesKey, AES_KEY_WORDS};

/// Reflected CRC-32C polynomial.
const POLYNOMIAL: u32 = 0x82F6_3B78;
const ROW_ADDR_BITS: u32 = 5;

/// CRC the controller reports for an unprogrammed key slot.
pub const ZERO_KEY_CRC: u32 = 0x6858_A3D5;

pub trait KeyCrc {
    fn compute(&self, key: &AesKey) -> u32;
}

/// Row CRC: each key word is fed LSB first, followed by the five low bits of
/// its row number. Words are processed from the last to the first, with the
/// last word on row 8 and the first on row 1.
#[derive(Clone, Copy, Debug, Default)]
pub struct RowCrc;

impl RowCrc {
    fn shift(mut crc: u32, mut value: u32, bits: u32) -> u32 {
        for _ in 0..bits {
            crc = (crc >> 1) ^ (((crc ^ value) & 1) * POLYNOMIAL);
            value >>= 1;
        }
        crc
    }
}

impl KeyCrc for RowCrc {
    fn compute(&self, key: &AesKey) -> u32 {
        let mut crc = 0;
        for idx in 0..AES_KEY_WORDS {
            let word = key.0[AES_KEY_WORDS - 1 - idx];
            let row = (AES_KEY_WORDS - idx) as u32;
            crc = Self::shift(crc, word, 32);
            crc = Self::shift(crc, row, ROW_ADDR_BITS);
        }
        crc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_key_crc() {
        assert_eq!(RowCrc.compute(&AesKey([0; AES_KEY_WORDS])), ZERO_KEY_CRC);
    }

    #[test]
    fn test_known_keys() {
        assert_eq!(RowCrc.compute(&AesKey([u32::MAX; AES_KEY_WORDS])), 0x5702_6463);
        assert_eq!(RowCrc.compute(&AesKey([1, 2, 3, 4, 5, 6, 7, 8])), 0xe8c9_6ccf);
    }

    #[test]
    fn test_single_bit_changes_crc() {
        let mut key = AesKey([0; AES_KEY_WORDS]);
        key.0[3] = 1 << 17;
        assert_ne!(RowCrc.compute(&key), ZERO_KEY_CRC);
    }
}
