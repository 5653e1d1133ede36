// Licensed under the Apache-2.0 license

//! Read-back of programmed values. All reads come from the cache.

use crate::control::{
    BootEnvCtrlBits, GlitchCfg, GlitchCfgBits, MiscCtrl, MiscCtrlBits, PufEccCtrl, PufEccCtrlBits,
    SecCtrl, SecCtrlBits, SecMisc1Bits, DEC_ONLY_MASK, PUF_AUX_MASK,
};
use crate::error::{EfuseError, EfuseResult};
use crate::geometry::{Field, IvKind, PpkIndex};
use crate::regs::RegisterIo;
use crate::request::{
    GlitchConfig, Iv, Ppk384Hash, PpkHash, PufControl, PufHelperData, DNA_WORDS, IV_WORDS,
    PPK384_HASH_WORDS, PPK_HASH_WORDS, PUF_SYN_WORDS,
};
use crate::write::Efuse;

impl<R: RegisterIo> Efuse<'_, R> {
    fn read_word(&self, field: Field, err: EfuseError) -> EfuseResult<u32> {
        self.controller()
            .read_field_word(field)
            .map_err(|e| e | err)
    }

    pub fn read_sec_ctrl_bits(&self) -> EfuseResult<SecCtrlBits> {
        self.read_word(Field::SecurityControl, EfuseError::RD_SEC_CTRL_BITS)
            .map(SecCtrlBits::new)
    }

    pub fn read_misc_ctrl_bits(&self) -> EfuseResult<MiscCtrlBits> {
        self.read_word(Field::MiscControl, EfuseError::RD_MISC_CTRL_BITS)
            .map(MiscCtrlBits::new)
    }

    pub fn read_boot_env_ctrl_bits(&self) -> EfuseResult<BootEnvCtrlBits> {
        self.read_word(Field::BootEnvControl, EfuseError::RD_BOOT_ENV_CTRL)
            .map(BootEnvCtrlBits::new)
    }

    pub fn read_sec_misc1_bits(&self) -> EfuseResult<SecMisc1Bits> {
        self.read_word(Field::SecurityMisc1, EfuseError::RD_SEC_MISC1_CTRL)
            .map(SecMisc1Bits::new)
    }

    /// All sixteen decrypt-only bits are burnt.
    pub fn read_dec_only(&self) -> EfuseResult<bool> {
        let misc0 = self.read_word(Field::SecurityMisc0, EfuseError::RD_DEC_ONLY)?;
        Ok(misc0 & DEC_ONLY_MASK == DEC_ONLY_MASK)
    }

    pub fn read_ppk_hash(&self, index: PpkIndex) -> EfuseResult<PpkHash> {
        self.controller()
            .read_field::<PPK_HASH_WORDS>(Field::PpkHash(index))
            .map(PpkHash)
            .map_err(|e| e | EfuseError::RD_PPK_HASH)
    }

    pub fn read_ppk384_hash(&self, index: PpkIndex) -> EfuseResult<Ppk384Hash> {
        self.controller()
            .read_field::<PPK384_HASH_WORDS>(Field::PpkHash(index))
            .map(Ppk384Hash)
            .map_err(|e| e | EfuseError::RD_PPK_HASH)
    }

    /// Device identifier, least significant word first.
    pub fn read_dna(&self) -> EfuseResult<[u32; DNA_WORDS]> {
        self.controller()
            .read_field::<DNA_WORDS>(Field::Dna)
            .map_err(|e| e | EfuseError::RD_DNA)
    }

    /// Trim and lock from the glitch row, enables from misc control.
    pub fn read_glitch_config(&self) -> EfuseResult<GlitchConfig> {
        let row = self
            .read_word(Field::GlitchConfig, EfuseError::RD_GLITCH_CFG)
            .map(GlitchCfgBits::new)?;
        let misc = self
            .read_word(Field::MiscControl, EfuseError::RD_GLITCH_CFG)
            .map(MiscCtrlBits::new)?;
        Ok(GlitchConfig {
            trim: row.read(GlitchCfg::TRIM),
            write_lock: row.is_set(GlitchCfg::WR_LK),
            rom_monitor_en: misc.is_set(MiscCtrl::GD_ROM_MONITOR_EN),
            halt_boot_en: misc.is_set(MiscCtrl::GD_HALT_BOOT_EN),
        })
    }

    pub fn read_iv(&self, kind: IvKind) -> EfuseResult<Iv> {
        let err = match kind {
            IvKind::MetaHeader => EfuseError::RD_META_HEADER_IV,
            IvKind::BlackObfus => EfuseError::RD_BLACK_IV,
            IvKind::Plm => EfuseError::RD_PLM_IV,
            IvKind::DataPartition => EfuseError::RD_DATA_PARTITION_IV,
        };
        self.controller()
            .read_field::<IV_WORDS>(Field::Iv(kind))
            .map(Iv)
            .map_err(|e| e | err)
    }

    fn read_id_row(&self, field: Field, row: u32, err: EfuseError) -> EfuseResult<u32> {
        let ctrl = self.controller();
        let desc = ctrl
            .geometry()
            .field_or_invalid(field)
            .map_err(|e| e | err)?;
        if row as usize >= desc.words {
            return Err(EfuseError::INVALID_PARAM | err);
        }
        ctrl.read_cache_word(desc.cache_offset + row * 4)
            .map_err(|e| e | err)
    }

    /// Word `row` of the revocation ID bitmap: bit `n` is ID `row * 32 + n`.
    pub fn read_revocation_id(&self, row: u32) -> EfuseResult<u32> {
        self.read_id_row(Field::RevocationIds, row, EfuseError::RD_REVOCATION_ID)
    }

    pub fn read_offchip_revoke_id(&self, row: u32) -> EfuseResult<u32> {
        self.read_id_row(Field::OffChipIds, row, EfuseError::RD_OFFCHIP_REVOKE_ID)
    }

    pub fn read_puf_sec_ctrl(&self) -> EfuseResult<PufControl> {
        let sec = self
            .read_word(Field::SecurityControl, EfuseError::RD_PUF_SEC_CTRL)
            .map(SecCtrlBits::new)?;
        let ecc = self
            .read_word(Field::PufEccControl, EfuseError::RD_PUF_SEC_CTRL)
            .map(PufEccCtrlBits::new)?;
        Ok(PufControl {
            regen_dis: ecc.is_set(PufEccCtrl::REGEN_DIS),
            hd_invld: ecc.is_set(PufEccCtrl::HD_INVLD),
            test2_dis: sec.is_set(SecCtrl::PUF_TEST2_DIS),
            syn_lk: sec.is_set(SecCtrl::PUF_SYN_LK),
            puf_dis: sec.is_set(SecCtrl::PUF_DIS),
        })
    }

    pub fn read_puf_helper_data(&self) -> EfuseResult<PufHelperData> {
        let err = EfuseError::RD_PUF_HELPER_DATA;
        let syndrome = self
            .controller()
            .read_field::<PUF_SYN_WORDS>(Field::PufSyndrome)
            .map_err(|e| e | err)?;
        let chash = self.read_word(Field::PufChash, err)?;
        let aux = self.read_word(Field::PufEccControl, err)? & PUF_AUX_MASK;
        Ok(PufHelperData {
            syndrome: Some(syndrome),
            chash: Some(chash),
            aux: Some(aux),
            control: self.read_puf_sec_ctrl()?,
        })
    }
}
