// Licensed under the Apache-2.0 license

//! Public programming API. Every call runs one complete session: environment
//! check, unlock and setup, validation, programming, cache reload, protection
//! and lock.

use romtime::HexBytes;
use zerocopy::IntoBytes;

use crate::config::EfuseConfig;
use crate::control::{
    BootEnvCtrlBits, MiscCtrl, MiscCtrlBits, SecCtrlBits, SecMisc1Bits, BOOT_ENV_CTRL_BIT_ERRORS,
    DEC_ONLY_BIT_ERRORS, DEC_ONLY_MASK, GLITCH_CFG_BIT_ERRORS, MISC_CTRL_BIT_ERRORS, PUF_AUX_MASK,
    PUF_ECC_CTRL_BIT_ERRORS, SEC_CTRL_BIT_ERRORS, SEC_MISC1_BIT_ERRORS,
};
use crate::controller::Controller;
use crate::crc::{KeyCrc, RowCrc};
use crate::error::{EfuseError, EfuseResult};
use crate::geometry::{Field, IvKind, KeySlot, PpkIndex};
use crate::regs::RegisterIo;
use crate::request::{
    id_bitmap, AesKey, GlitchConfig, Iv, Ppk384Hash, PpkDigest, PpkHash, PufHelperData,
    WriteRequest, OFFCHIP_ID_WORDS, REVOCATION_ID_WORDS,
};
use crate::session::ControllerSession;
use crate::sysmon::Sysmon;
use crate::validator::{KEY_RULES, PPK_RULES, REVERTIBLE_IVS};

/// eFuse driver bound to one controller.
pub struct Efuse<'a, R: RegisterIo> {
    io: &'a R,
    config: EfuseConfig,
    sysmon: Option<&'a dyn Sysmon>,
}

impl<'a, R: RegisterIo> Efuse<'a, R> {
    pub fn new(io: &'a R, config: EfuseConfig) -> Self {
        Efuse {
            io,
            config,
            sysmon: None,
        }
    }

    /// Monitor consulted before each programming session.
    pub fn with_sysmon(mut self, sysmon: &'a dyn Sysmon) -> Self {
        self.sysmon = Some(sysmon);
        self
    }

    pub fn controller(&self) -> Controller<'a, R> {
        Controller::new(self.io, self.config)
    }

    fn check_environment(&self, env_monitor_disable: bool) -> EfuseResult<()> {
        if env_monitor_disable {
            return Ok(());
        }
        let sysmon = self.sysmon.ok_or(EfuseError::INVALID_PARAM)?;
        sysmon.check_temperature_and_voltage().map_err(|err| {
            romtime::println!("[efuse] Environment out of range: {}", err);
            err | EfuseError::BEFORE_PROGRAMMING
        })
    }

    /// Runs `f` inside a session. The session is closed whatever `f`
    /// returns.
    pub(crate) fn run<F>(&self, env_monitor_disable: bool, f: F) -> EfuseResult<()>
    where
        F: FnOnce(&ControllerSession<'a, R>) -> EfuseResult<()>,
    {
        self.check_environment(env_monitor_disable)?;
        let session = ControllerSession::open(self.controller())?;
        let result = f(&session);
        session.finish(result)
    }

    /// Programs everything `req` asks for, in one session.
    pub fn write(&self, req: &WriteRequest) -> EfuseResult<()> {
        if req.is_empty() {
            return Err(EfuseError::NOTHING_TO_PROGRAM);
        }
        self.run(req.env_monitor_disable, |session| {
            session
                .validate_write_request(req)
                .map_err(|err| err | EfuseError::BEFORE_PROGRAMMING)?;
            session.program_request(req)
        })
    }

    pub fn write_aes_key(
        &self,
        slot: KeySlot,
        key: &AesKey,
        env_monitor_disable: bool,
    ) -> EfuseResult<()> {
        let mut req = WriteRequest {
            env_monitor_disable,
            ..Default::default()
        };
        match slot {
            KeySlot::Aes => req.aes_key = Some(key),
            KeySlot::UserKey0 => req.user_key0 = Some(key),
            KeySlot::UserKey1 => req.user_key1 = Some(key),
        }
        self.write(&req)
    }

    pub fn write_ppk_hash(
        &self,
        index: PpkIndex,
        hash: &PpkHash,
        env_monitor_disable: bool,
    ) -> EfuseResult<()> {
        self.write_ppk_digest(index, hash.into(), env_monitor_disable)
    }

    /// Writes a SHA-384 PPK hash, for parts whose slots are 384 bits wide.
    pub fn write_ppk384_hash(
        &self,
        index: PpkIndex,
        hash: &Ppk384Hash,
        env_monitor_disable: bool,
    ) -> EfuseResult<()> {
        self.write_ppk_digest(index, hash.into(), env_monitor_disable)
    }

    fn write_ppk_digest(
        &self,
        index: PpkIndex,
        digest: PpkDigest<'_>,
        env_monitor_disable: bool,
    ) -> EfuseResult<()> {
        let mut req = WriteRequest {
            env_monitor_disable,
            ..Default::default()
        };
        req.ppk_hash[u32::from(index) as usize] = Some(digest);
        self.write(&req)
    }

    pub fn write_iv(&self, kind: IvKind, iv: &Iv, env_monitor_disable: bool) -> EfuseResult<()> {
        let mut req = WriteRequest {
            env_monitor_disable,
            ..Default::default()
        };
        match kind {
            IvKind::MetaHeader => req.meta_header_iv = Some(iv),
            IvKind::BlackObfus => req.black_iv = Some(iv),
            IvKind::Plm => req.plm_iv = Some(iv),
            IvKind::DataPartition => req.data_partition_iv = Some(iv),
        }
        self.write(&req)
    }

    pub fn write_revocation_id(&self, id: u32, env_monitor_disable: bool) -> EfuseResult<()> {
        self.write(&WriteRequest {
            revocation_ids: &[id],
            env_monitor_disable,
            ..Default::default()
        })
    }

    pub fn write_offchip_revoke_id(&self, id: u32, env_monitor_disable: bool) -> EfuseResult<()> {
        self.write(&WriteRequest {
            offchip_ids: &[id],
            env_monitor_disable,
            ..Default::default()
        })
    }

    pub fn write_dec_only(&self, env_monitor_disable: bool) -> EfuseResult<()> {
        self.write(&WriteRequest {
            dec_only: true,
            env_monitor_disable,
            ..Default::default()
        })
    }

    pub fn write_security_control_bits(
        &self,
        bits: SecCtrlBits,
        env_monitor_disable: bool,
    ) -> EfuseResult<()> {
        self.write(&WriteRequest {
            sec_ctrl: Some(bits),
            env_monitor_disable,
            ..Default::default()
        })
    }

    pub fn write_misc_control_bits(
        &self,
        bits: MiscCtrlBits,
        env_monitor_disable: bool,
    ) -> EfuseResult<()> {
        self.write(&WriteRequest {
            misc_ctrl: Some(bits),
            env_monitor_disable,
            ..Default::default()
        })
    }

    pub fn write_sec_misc1_bits(
        &self,
        bits: SecMisc1Bits,
        env_monitor_disable: bool,
    ) -> EfuseResult<()> {
        self.write(&WriteRequest {
            sec_misc1: Some(bits),
            env_monitor_disable,
            ..Default::default()
        })
    }

    pub fn write_boot_env_control_bits(
        &self,
        bits: BootEnvCtrlBits,
        env_monitor_disable: bool,
    ) -> EfuseResult<()> {
        self.write(&WriteRequest {
            boot_env_ctrl: Some(bits),
            env_monitor_disable,
            ..Default::default()
        })
    }

    /// Marks a PPK slot invalid by burning both of its invalid bits.
    pub fn revoke_ppk(&self, index: PpkIndex, env_monitor_disable: bool) -> EfuseResult<()> {
        let mut bits = MiscCtrlBits::new(0);
        bits.modify(match index {
            PpkIndex::Ppk0 => MiscCtrl::PPK0_INVLD::SET,
            PpkIndex::Ppk1 => MiscCtrl::PPK1_INVLD::SET,
            PpkIndex::Ppk2 => MiscCtrl::PPK2_INVLD::SET,
            PpkIndex::Ppk3 => MiscCtrl::PPK3_INVLD::SET,
            PpkIndex::Ppk4 => MiscCtrl::PPK4_INVLD::SET,
        });
        self.write_misc_control_bits(bits, env_monitor_disable)
    }

    /// Burns glitch detector trim bits and the detector enables.
    pub fn write_glitch_config(
        &self,
        config: GlitchConfig,
        env_monitor_disable: bool,
    ) -> EfuseResult<()> {
        self.write(&WriteRequest {
            glitch: Some(config),
            env_monitor_disable,
            ..Default::default()
        })
    }

    /// Write-locks the glitch detector row.
    pub fn lock_glitch_config(&self, env_monitor_disable: bool) -> EfuseResult<()> {
        self.write_glitch_config(
            GlitchConfig {
                write_lock: true,
                ..Default::default()
            },
            env_monitor_disable,
        )
    }

    /// Programs PUF helper data and PUF control bits.
    ///
    /// Refused up front when the syndrome is locked or the PUF disabled.
    pub fn write_puf(&self, puf: &PufHelperData, env_monitor_disable: bool) -> EfuseResult<()> {
        if puf.is_empty() {
            return Err(EfuseError::NOTHING_TO_PROGRAM);
        }
        self.controller().validate_puf_access()?;
        self.run(env_monitor_disable, |session| {
            session
                .validate_puf_empty(puf)
                .map_err(|err| err | EfuseError::BEFORE_PROGRAMMING)?;
            session.program_puf(puf)?;
            session.reload_and_check()?;
            session.program_protection_rows()
        })
    }

    /// Reloads the cache and burns any protection bits now due, without
    /// programming anything else.
    pub fn cache_load_and_program_protection_bits(&self) -> EfuseResult<()> {
        let session = ControllerSession::open(self.controller())?;
        let result = session
            .reload_and_check()
            .and_then(|_| session.program_protection_rows());
        session.finish(result)
    }
}

impl<R: RegisterIo> ControllerSession<'_, R> {
    fn program_request(&self, req: &WriteRequest) -> EfuseResult<()> {
        for rules in &KEY_RULES {
            if let Some(key) = req.key(rules.slot) {
                self.program_key(rules.slot, key)
                    .map_err(|err| err | rules.write)?;
            }
        }
        for (rules, digest) in PPK_RULES.iter().zip(req.ppk_hash) {
            if let Some(digest) = digest {
                romtime::println!(
                    "[efuse] Programming PPK{} hash {}",
                    u32::from(rules.index),
                    HexBytes(digest.words().as_bytes())
                );
                let desc = self.geometry().field_or_invalid(Field::PpkHash(rules.index))?;
                self.program_field(desc, digest.words())
                    .map_err(|err| err | rules.write)?;
            }
        }
        for (kind, write) in REVERTIBLE_IVS {
            if let Some(iv) = req.iv(kind) {
                self.program_iv(kind, iv).map_err(|err| err | write)?;
            }
        }
        if let Some(iv) = req.black_iv {
            let desc = self
                .geometry()
                .field_or_invalid(Field::Iv(IvKind::BlackObfus))?;
            self.program_field(desc, &iv.0)
                .map_err(|err| err | EfuseError::WRITE_BLK_OBFUS_IV)?;
        }
        if req.dec_only {
            self.program_control(Field::SecurityMisc0, DEC_ONLY_MASK, DEC_ONLY_BIT_ERRORS)?;
        }
        if !req.revocation_ids.is_empty() {
            self.program_ids::<REVOCATION_ID_WORDS>(Field::RevocationIds, req.revocation_ids)
                .map_err(|err| err | EfuseError::WRITE_REVOCATION_IDS)?;
        }
        if !req.offchip_ids.is_empty() {
            self.program_ids::<OFFCHIP_ID_WORDS>(Field::OffChipIds, req.offchip_ids)
                .map_err(|err| err | EfuseError::WRITE_OFFCHIP_REVOKE_IDS)?;
        }
        if let Some(config) = &req.glitch {
            self.program_glitch(config)?;
        }
        let misc = req.misc_bits();
        if misc != 0 {
            self.program_control(Field::MiscControl, misc, MISC_CTRL_BIT_ERRORS)?;
        }
        if let Some(bits) = req.sec_misc1 {
            self.program_control(Field::SecurityMisc1, bits.get(), SEC_MISC1_BIT_ERRORS)?;
        }
        if let Some(bits) = req.boot_env_ctrl {
            self.program_control(Field::BootEnvControl, bits.get(), BOOT_ENV_CTRL_BIT_ERRORS)?;
        }
        if let Some(puf) = req.puf {
            self.program_puf(puf)?;
        }
        if let Some(bits) = req.sec_ctrl {
            self.program_control(Field::SecurityControl, bits.get(), SEC_CTRL_BIT_ERRORS)?;
        }

        self.reload_and_check()?;
        self.program_protection_rows()
    }

    /// Burns a symmetric key, then has the controller check its CRC.
    fn program_key(&self, slot: KeySlot, key: &AesKey) -> EfuseResult<()> {
        let desc = self.geometry().field_or_invalid(Field::Key(slot))?;
        let crc = self
            .geometry()
            .key_crc(slot)
            .ok_or(EfuseError::INVALID_PARAM)?;
        self.program_field(desc, &key.0)?;
        self.reload_and_check()?;
        self.check_key_crc(crc, RowCrc.compute(key))
    }

    fn program_iv(&self, kind: IvKind, iv: &Iv) -> EfuseResult<()> {
        let desc = self.geometry().field_or_invalid(Field::Iv(kind))?;
        let bits = self.compute_programmable_bits(&iv.0, desc.cache_offset)?;
        self.program_field(desc, &bits)
    }

    fn program_ids<const N: usize>(&self, field: Field, ids: &[u32]) -> EfuseResult<()> {
        let desc = self.geometry().field_or_invalid(field)?;
        if desc.words > N {
            return Err(EfuseError::INVALID_PARAM);
        }
        let requested = id_bitmap::<N>(ids).ok_or(EfuseError::INVALID_PARAM)?;
        let bits = self.compute_programmable_bits(&requested, desc.cache_offset)?;
        self.program_field(desc, &bits)
    }

    fn program_control(
        &self,
        field: Field,
        bits: u32,
        table: &[(u32, EfuseError)],
    ) -> EfuseResult<()> {
        let desc = self.geometry().field_or_invalid(field)?;
        self.program_word_bits(desc, bits, table)
    }

    fn program_glitch(&self, config: &GlitchConfig) -> EfuseResult<()> {
        let bits = config.row_bits();
        if bits == 0 {
            return Ok(());
        }
        let desc = self.geometry().field_or_invalid(Field::GlitchConfig)?;
        let [bits] = self.compute_programmable_bits(&[bits], desc.cache_offset)?;
        self.program_word_bits(desc, bits, GLITCH_CFG_BIT_ERRORS)
    }

    fn program_puf(&self, puf: &PufHelperData) -> EfuseResult<()> {
        if let Some(syndrome) = &puf.syndrome {
            let desc = self.geometry().field_or_invalid(Field::PufSyndrome)?;
            self.program_field(desc, syndrome)
                .map_err(|err| err | EfuseError::WRITE_PUF_SYN_DATA)?;
        }
        if let Some(chash) = puf.chash {
            let desc = self.geometry().field_or_invalid(Field::PufChash)?;
            self.program_field(desc, &[chash])
                .map_err(|err| err | EfuseError::WRITE_PUF_CHASH)?;
        }
        if let Some(aux) = puf.aux {
            let desc = self.geometry().field_or_invalid(Field::PufEccControl)?;
            self.program_field(desc, &[aux & PUF_AUX_MASK])
                .map_err(|err| err | EfuseError::WRITE_PUF_AUX)?;
        }

        let control = puf.control;
        let ecc_bits = [(control.regen_dis, 1 << 30), (control.hd_invld, 1 << 31)]
            .iter()
            .filter(|(set, _)| *set)
            .fold(0u32, |acc, (_, bit)| acc | bit);
        if ecc_bits != 0 {
            self.program_control(Field::PufEccControl, ecc_bits, PUF_ECC_CTRL_BIT_ERRORS)?;
        }
        let sec_bits = [
            (control.syn_lk, 1 << 16),
            (control.test2_dis, 1 << 17),
            (control.puf_dis, 1 << 18),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0u32, |acc, (_, bit)| acc | bit);
        if sec_bits != 0 {
            self.program_control(Field::SecurityControl, sec_bits, SEC_CTRL_BIT_ERRORS)?;
        }
        Ok(())
    }
}
