// Licensed under the Apache-2.0 license

//! Pre-flight checks of a [`WriteRequest`] against the cached fuse state.
//! Nothing here touches the array.

use tock_registers::fields::Field as RegField;

use crate::control::{
    table_mask, BootEnvCtrlBits, GlitchCfg, GlitchCfgBits, MiscCtrl, MiscCtrlBits, PufEccCtrlBits,
    SecCtrl, SecCtrlBits, BOOT_ENV_CTRL_BIT_ERRORS, DEC_ONLY_MASK, GLITCH_TRIM_MASK,
    MISC_CTRL_BIT_ERRORS, PUF_AUX_MASK, SEC_CTRL_BIT_ERRORS, SEC_MISC1_BIT_ERRORS,
};
use crate::controller::Controller;
use crate::crc::ZERO_KEY_CRC;
use crate::error::{EfuseError, EfuseResult};
use crate::geometry::{Field, IvKind, KeySlot, PpkIndex};
use crate::regs::RegisterIo;
use crate::request::{
    GlitchConfig, Iv, PpkDigest, PufHelperData, WriteRequest, IV_WORDS, PPK_SLOTS,
};

type SecCtrlField = RegField<u32, SecCtrl::Register>;

pub(crate) struct KeyRules {
    pub slot: KeySlot,
    pub already: EfuseError,
    pub write: EfuseError,
    pub lock: SecCtrlField,
}

pub(crate) const KEY_RULES: [KeyRules; 3] = [
    KeyRules {
        slot: KeySlot::Aes,
        already: EfuseError::AES_ALREADY_PRGMD,
        write: EfuseError::WRITE_AES_KEY,
        lock: SecCtrl::AES_WR_LK,
    },
    KeyRules {
        slot: KeySlot::UserKey0,
        already: EfuseError::USER_KEY0_ALREADY_PRGMD,
        write: EfuseError::WRITE_USER_KEY0,
        lock: SecCtrl::USR_KEY0_WR_LK,
    },
    KeyRules {
        slot: KeySlot::UserKey1,
        already: EfuseError::USER_KEY1_ALREADY_PRGMD,
        write: EfuseError::WRITE_USER_KEY1,
        lock: SecCtrl::USR_KEY1_WR_LK,
    },
];

pub(crate) struct PpkRules {
    pub index: PpkIndex,
    pub already: EfuseError,
    pub write: EfuseError,
    /// PPK3 and PPK4 have no write lock of their own.
    pub lock: Option<SecCtrlField>,
}

pub(crate) const PPK_RULES: [PpkRules; PPK_SLOTS] = [
    PpkRules {
        index: PpkIndex::Ppk0,
        already: EfuseError::PPK0_HASH_ALREADY_PRGMD,
        write: EfuseError::WRITE_PPK0_HASH,
        lock: Some(SecCtrl::PPK0_WR_LK),
    },
    PpkRules {
        index: PpkIndex::Ppk1,
        already: EfuseError::PPK1_HASH_ALREADY_PRGMD,
        write: EfuseError::WRITE_PPK1_HASH,
        lock: Some(SecCtrl::PPK1_WR_LK),
    },
    PpkRules {
        index: PpkIndex::Ppk2,
        already: EfuseError::PPK2_HASH_ALREADY_PRGMD,
        write: EfuseError::WRITE_PPK2_HASH,
        lock: Some(SecCtrl::PPK2_WR_LK),
    },
    PpkRules {
        index: PpkIndex::Ppk3,
        already: EfuseError::PPK3_HASH_ALREADY_PRGMD,
        write: EfuseError::WRITE_PPK3_HASH,
        lock: None,
    },
    PpkRules {
        index: PpkIndex::Ppk4,
        already: EfuseError::PPK4_HASH_ALREADY_PRGMD,
        write: EfuseError::WRITE_PPK4_HASH,
        lock: None,
    },
];

const BASE_PPKS: [PpkIndex; 3] = [PpkIndex::Ppk0, PpkIndex::Ppk1, PpkIndex::Ppk2];

/// IVs that may be extended bit by bit, with their write errors.
pub(crate) const REVERTIBLE_IVS: [(IvKind, EfuseError); 3] = [
    (IvKind::MetaHeader, EfuseError::WRITE_META_HEADER_IV),
    (IvKind::Plm, EfuseError::WRITE_PLM_IV),
    (IvKind::DataPartition, EfuseError::WRITE_DATA_PARTITION_IV),
];

impl WriteRequest<'_> {
    pub(crate) fn key(&self, slot: KeySlot) -> Option<&crate::request::AesKey> {
        match slot {
            KeySlot::Aes => self.aes_key,
            KeySlot::UserKey0 => self.user_key0,
            KeySlot::UserKey1 => self.user_key1,
        }
    }

    pub(crate) fn iv(&self, kind: IvKind) -> Option<&Iv> {
        match kind {
            IvKind::MetaHeader => self.meta_header_iv,
            IvKind::BlackObfus => self.black_iv,
            IvKind::Plm => self.plm_iv,
            IvKind::DataPartition => self.data_partition_iv,
        }
    }
}

impl<R: RegisterIo> Controller<'_, R> {
    fn sec_ctrl(&self) -> EfuseResult<SecCtrlBits> {
        self.read_field_word(Field::SecurityControl)
            .map(SecCtrlBits::new)
    }

    /// The slot passes the hardware CRC check against the all-zero key.
    pub(crate) fn key_slot_empty(&self, slot: KeySlot) -> EfuseResult<bool> {
        let crc = self
            .geometry()
            .key_crc(slot)
            .ok_or(EfuseError::INVALID_PARAM)?;
        Ok(self.check_key_crc(crc, ZERO_KEY_CRC).is_ok())
    }

    pub(crate) fn validate_key(&self, rules: &KeyRules) -> EfuseResult<()> {
        if !self.key_slot_empty(rules.slot)? {
            return Err(rules.already);
        }
        let sec = self.sec_ctrl()?;
        if sec.is_set(SecCtrl::AES_DIS) || sec.is_set(rules.lock) {
            return Err(EfuseError::FUSE_PROTECTED | rules.write);
        }
        Ok(())
    }

    /// The additional slots are enabled in misc control, either already or
    /// through `requested` misc bits.
    pub(crate) fn additional_ppks_enabled(&self, requested: u32) -> EfuseResult<bool> {
        let cached = self.read_field_word(Field::MiscControl)?;
        Ok(MiscCtrlBits::new(cached | requested).is_set(MiscCtrl::ADD_PPK_EN))
    }

    pub(crate) fn validate_ppk(
        &self,
        rules: &PpkRules,
        digest: PpkDigest,
        req: &WriteRequest,
    ) -> EfuseResult<()> {
        let field = Field::PpkHash(rules.index);
        let desc = self.geometry().field_or_invalid(field)?;
        if desc.words != digest.words().len() {
            return Err(EfuseError::INVALID_PARAM | rules.write);
        }
        if rules.index.is_additional() {
            if !self.additional_ppks_enabled(req.misc_bits())? {
                return Err(EfuseError::ADD_PPK_NOT_ENABLED);
            }
            for index in BASE_PPKS {
                let requested = req.ppk_hash[u32::from(index) as usize].is_some();
                if !requested && self.field_is_zero(Field::PpkHash(index))? {
                    return Err(EfuseError::ADD_PPK_PGM_NOT_ALLOWED);
                }
            }
        }
        if !self.field_is_zero(field)? {
            return Err(rules.already);
        }
        if let Some(lock) = rules.lock {
            if self.sec_ctrl()?.is_set(lock) {
                return Err(EfuseError::FUSE_PROTECTED | rules.write);
            }
        }
        Ok(())
    }

    /// A write-locked glitch row takes no new bits.
    pub(crate) fn validate_glitch(&self, config: &GlitchConfig) -> EfuseResult<()> {
        if config.trim & !GLITCH_TRIM_MASK != 0 {
            return Err(EfuseError::INVALID_PARAM);
        }
        let bits = config.row_bits();
        if bits == 0 {
            return Ok(());
        }
        let cached = GlitchCfgBits::new(self.read_field_word(Field::GlitchConfig)?);
        if cached.is_set(GlitchCfg::WR_LK) && bits & !cached.get() != 0 {
            return Err(EfuseError::FUSE_PROTECTED | EfuseError::WRITE_GLITCH_CFG);
        }
        Ok(())
    }

    /// Already-burnt bits of an IV must stay set in the requested value.
    pub(crate) fn validate_iv(&self, kind: IvKind, iv: &Iv) -> EfuseResult<()> {
        if kind == IvKind::BlackObfus {
            if !self.field_is_zero(Field::Iv(kind))? {
                return Err(EfuseError::BLK_OBFUS_IV_ALREADY_PRGMD);
            }
            return Ok(());
        }
        let write = REVERTIBLE_IVS
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(EfuseError::INVALID_PARAM, |(_, err)| *err);
        let cached = self.read_field::<IV_WORDS>(Field::Iv(kind))?;
        if cached.iter().zip(&iv.0).any(|(c, r)| c & r != *c) {
            return Err(EfuseError::BIT_CANT_REVERT | write);
        }
        Ok(())
    }

    fn validate_dec_only(&self, req: &WriteRequest) -> EfuseResult<()> {
        if self.read_field_word(Field::SecurityMisc0)? & DEC_ONLY_MASK != 0 {
            return Err(EfuseError::DEC_ONLY_ALREADY_PRGMD);
        }
        if req.aes_key.is_none() && self.key_slot_empty(KeySlot::Aes)? {
            return Err(EfuseError::DEC_ONLY_KEY_MUST_BE_PRGMD);
        }
        if req.black_iv.is_none() && self.field_is_zero(Field::Iv(IvKind::BlackObfus))? {
            return Err(EfuseError::DEC_ONLY_IV_MUST_BE_PRGMD);
        }
        Ok(())
    }

    pub(crate) fn validate_boot_env(&self, bits: BootEnvCtrlBits) -> EfuseResult<()> {
        if bits.get() & !table_mask(BOOT_ENV_CTRL_BIT_ERRORS) != 0 {
            return Err(EfuseError::INVALID_PARAM);
        }
        if self.read_field_word(Field::BootEnvControl)? & bits.get() != 0 {
            return Err(EfuseError::BOOT_ENV_CTRL_ALREADY_PRGMD);
        }
        Ok(())
    }

    /// PUF helper data is refused once the syndrome is locked or the PUF
    /// disabled.
    pub(crate) fn validate_puf_access(&self) -> EfuseResult<()> {
        let sec = self.sec_ctrl()?;
        if sec.is_set(SecCtrl::PUF_SYN_LK) || sec.is_set(SecCtrl::PUF_DIS) {
            return Err(EfuseError::FUSE_PROTECTED | EfuseError::WRITE_PUF_HELPER_DATA);
        }
        Ok(())
    }

    pub(crate) fn validate_puf_empty(&self, puf: &PufHelperData) -> EfuseResult<()> {
        if !puf.programs_helper_data() {
            return Ok(());
        }
        if !self.field_is_zero(Field::PufChash)? {
            return Err(EfuseError::PUF_CHASH_ALREADY_PRGMD);
        }
        let ecc = PufEccCtrlBits::new(self.read_field_word(Field::PufEccControl)?);
        if ecc.get() & PUF_AUX_MASK != 0 {
            return Err(EfuseError::PUF_AUX_ALREADY_PRGMD);
        }
        if !self.field_is_zero(Field::PufSyndrome)? {
            return Err(EfuseError::PUF_SYN_ALREADY_PRGMD);
        }
        Ok(())
    }

    /// Every id must fall inside the field.
    pub(crate) fn validate_ids(&self, field: Field, ids: &[u32]) -> EfuseResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let desc = self.geometry().field_or_invalid(field)?;
        let bits = (desc.words * 32) as u32;
        if ids.iter().any(|id| *id >= bits) {
            return Err(EfuseError::INVALID_PARAM);
        }
        Ok(())
    }

    /// Returns the first rule the request breaks.
    pub fn validate_write_request(&self, req: &WriteRequest) -> EfuseResult<()> {
        for rules in &KEY_RULES {
            if req.key(rules.slot).is_some() {
                self.validate_key(rules)?;
            }
        }
        for (rules, digest) in PPK_RULES.iter().zip(req.ppk_hash) {
            if let Some(digest) = digest {
                self.validate_ppk(rules, digest, req)?;
            }
        }
        for kind in [
            IvKind::MetaHeader,
            IvKind::BlackObfus,
            IvKind::Plm,
            IvKind::DataPartition,
        ] {
            if let Some(iv) = req.iv(kind) {
                self.validate_iv(kind, iv)?;
            }
        }
        if req.dec_only {
            self.validate_dec_only(req)?;
        }
        if let Some(bits) = req.boot_env_ctrl {
            self.validate_boot_env(bits)?;
        }
        if let Some(config) = &req.glitch {
            self.validate_glitch(config)?;
        }
        if let Some(puf) = req.puf {
            self.validate_puf_access()?;
            self.validate_puf_empty(puf)?;
        }
        self.validate_ids(Field::RevocationIds, req.revocation_ids)?;
        self.validate_ids(Field::OffChipIds, req.offchip_ids)?;

        let known_bits = [
            (req.sec_ctrl.map(|b| b.get()), SEC_CTRL_BIT_ERRORS),
            (Some(req.misc_bits()), MISC_CTRL_BIT_ERRORS),
            (req.sec_misc1.map(|b| b.get()), SEC_MISC1_BIT_ERRORS),
        ];
        for (bits, table) in known_bits {
            if bits.unwrap_or(0) & !table_mask(table) != 0 {
                return Err(EfuseError::INVALID_PARAM);
            }
        }
        Ok(())
    }
}
