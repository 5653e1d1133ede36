// Licensed under the Apache-2.0 license

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::control::{
    BootEnvCtrlBits, GlitchCfg, GlitchCfgBits, MiscCtrl, MiscCtrlBits, SecCtrlBits, SecMisc1Bits,
};

pub const AES_KEY_WORDS: usize = 8;
pub const PPK_HASH_WORDS: usize = 8;
pub const PPK384_HASH_WORDS: usize = 12;
pub const PPK_SLOTS: usize = 5;
pub const DNA_WORDS: usize = 4;
pub const IV_WORDS: usize = 3;
pub const PUF_SYN_WORDS: usize = 127;
pub const REVOCATION_ID_WORDS: usize = 8;
pub const OFFCHIP_ID_WORDS: usize = 4;

/// 256-bit symmetric key, wiped on drop.
#[derive(Clone, FromBytes, IntoBytes, Immutable, KnownLayout, Zeroize, ZeroizeOnDrop)]
#[repr(C)]
pub struct AesKey(pub [u32; AES_KEY_WORDS]);

impl AesKey {
    pub fn from_le_bytes(bytes: &[u8; AES_KEY_WORDS * 4]) -> Self {
        let mut key = AesKey([0; AES_KEY_WORDS]);
        for (word, chunk) in key.0.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        key
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|w| *w == 0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct PpkHash(pub [u32; PPK_HASH_WORDS]);

/// SHA-384 public key hash, as held by parts with 12-row PPK slots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct Ppk384Hash(pub [u32; PPK384_HASH_WORDS]);

/// A PPK hash of either width. The slot it targets decides which one fits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PpkDigest<'a> {
    Sha256(&'a PpkHash),
    Sha384(&'a Ppk384Hash),
}

impl<'a> PpkDigest<'a> {
    pub fn words(self) -> &'a [u32] {
        match self {
            PpkDigest::Sha256(hash) => &hash.0,
            PpkDigest::Sha384(hash) => &hash.0,
        }
    }
}

impl<'a> From<&'a PpkHash> for PpkDigest<'a> {
    fn from(hash: &'a PpkHash) -> Self {
        PpkDigest::Sha256(hash)
    }
}

impl<'a> From<&'a Ppk384Hash> for PpkDigest<'a> {
    fn from(hash: &'a Ppk384Hash) -> Self {
        PpkDigest::Sha384(hash)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct Iv(pub [u32; IV_WORDS]);

/// PUF enable/lock bits, spread over the security control and PUF ECC
/// control rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PufControl {
    pub regen_dis: bool,
    pub hd_invld: bool,
    pub test2_dis: bool,
    pub syn_lk: bool,
    pub puf_dis: bool,
}

impl PufControl {
    pub fn any(&self) -> bool {
        self.regen_dis || self.hd_invld || self.test2_dis || self.syn_lk || self.puf_dis
    }
}

/// Glitch detector settings.
///
/// `trim` lands in the glitch configuration row and `write_lock` locks that
/// row. The two enables are misc control bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlitchConfig {
    /// Low 31 bits are used.
    pub trim: u32,
    pub write_lock: bool,
    pub rom_monitor_en: bool,
    pub halt_boot_en: bool,
}

impl GlitchConfig {
    /// Value of the glitch configuration row.
    pub fn row_bits(&self) -> u32 {
        let mut bits = GlitchCfgBits::new(self.trim);
        if self.write_lock {
            bits.modify(GlitchCfg::WR_LK::SET);
        }
        bits.get()
    }

    /// Misc control bits carrying the two enables.
    pub fn misc_bits(&self) -> u32 {
        let mut bits = MiscCtrlBits::new(0);
        if self.rom_monitor_en {
            bits.modify(MiscCtrl::GD_ROM_MONITOR_EN::SET);
        }
        if self.halt_boot_en {
            bits.modify(MiscCtrl::GD_HALT_BOOT_EN::SET);
        }
        bits.get()
    }

    pub fn is_empty(&self) -> bool {
        self.row_bits() == 0 && self.misc_bits() == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PufHelperData {
    pub syndrome: Option<[u32; PUF_SYN_WORDS]>,
    pub chash: Option<u32>,
    /// Low 24 bits are used.
    pub aux: Option<u32>,
    pub control: PufControl,
}

impl PufHelperData {
    fn has_helper_data(&self) -> bool {
        self.syndrome.is_some() || self.chash.is_some() || self.aux.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_helper_data() && !self.control.any()
    }

    pub(crate) fn programs_helper_data(&self) -> bool {
        self.has_helper_data()
    }
}

/// Everything a caller wants burnt in one session.
///
/// Unset fields are left alone. `revocation_ids` and `offchip_ids` list IDs to
/// revoke. `ppk_hash` is indexed by [`PpkIndex`](crate::PpkIndex).
#[derive(Default)]
pub struct WriteRequest<'a> {
    pub aes_key: Option<&'a AesKey>,
    pub user_key0: Option<&'a AesKey>,
    pub user_key1: Option<&'a AesKey>,
    pub ppk_hash: [Option<PpkDigest<'a>>; PPK_SLOTS],
    pub meta_header_iv: Option<&'a Iv>,
    pub black_iv: Option<&'a Iv>,
    pub plm_iv: Option<&'a Iv>,
    pub data_partition_iv: Option<&'a Iv>,
    pub dec_only: bool,
    pub revocation_ids: &'a [u32],
    pub offchip_ids: &'a [u32],
    pub misc_ctrl: Option<MiscCtrlBits>,
    pub sec_ctrl: Option<SecCtrlBits>,
    pub sec_misc1: Option<SecMisc1Bits>,
    pub boot_env_ctrl: Option<BootEnvCtrlBits>,
    pub glitch: Option<GlitchConfig>,
    pub puf: Option<&'a PufHelperData>,
    /// Skips the temperature and voltage check.
    pub env_monitor_disable: bool,
}

impl WriteRequest<'_> {
    /// Misc control bits to burn, including the glitch detector enables.
    pub(crate) fn misc_bits(&self) -> u32 {
        self.misc_ctrl.map_or(0, |b| b.get()) | self.glitch.map_or(0, |g| g.misc_bits())
    }

    pub fn is_empty(&self) -> bool {
        self.aes_key.is_none()
            && self.user_key0.is_none()
            && self.user_key1.is_none()
            && self.ppk_hash.iter().all(Option::is_none)
            && self.meta_header_iv.is_none()
            && self.black_iv.is_none()
            && self.plm_iv.is_none()
            && self.data_partition_iv.is_none()
            && !self.dec_only
            && self.revocation_ids.is_empty()
            && self.offchip_ids.is_empty()
            && self.misc_ctrl.map_or(true, |b| b.get() == 0)
            && self.sec_ctrl.map_or(true, |b| b.get() == 0)
            && self.sec_misc1.map_or(true, |b| b.get() == 0)
            && self.boot_env_ctrl.map_or(true, |b| b.get() == 0)
            && self.glitch.map_or(true, |g| g.is_empty())
            && self.puf.map_or(true, |p| p.is_empty())
    }
}

/// Sets bit `id` of a bitmap of IDs.
pub(crate) fn id_bitmap<const N: usize>(ids: &[u32]) -> Option<[u32; N]> {
    let mut map = [0u32; N];
    for &id in ids {
        let word = map.get_mut((id / 32) as usize)?;
        *word |= 1 << (id % 32);
    }
    Some(map)
}
