/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Driver for the eFuse controller: one-time-programmable fuse array with
    a read cache, protection bits and per-field programming for Versal,
    Versal Net and ZynqMP parts.

--*/

#![cfg_attr(not(test), no_std)]

mod bit;
mod cache;
mod config;
mod control;
mod controller;
mod crc;
mod error;
mod geometry;
mod programmable;
mod protection;
mod read;
mod regs;
mod request;
mod rows;
mod session;
mod sysmon;
mod user;
mod validator;
mod write;

#[cfg(test)]
mod mock;

pub use bit::VerifyPolicy;
pub use config::{EfuseConfig, Timeouts, Variant};
pub use control::{
    BootEnvCtrl, BootEnvCtrlBits, GlitchCfg, GlitchCfgBits, MiscCtrl, MiscCtrlBits, PufEccCtrl,
    PufEccCtrlBits, SecCtrl, SecCtrlBits, SecMisc0, SecMisc1, SecMisc1Bits, Tbits, TbitsVal,
};
pub use controller::Controller;
pub use crc::{KeyCrc, RowCrc, ZERO_KEY_CRC};
pub use error::{EfuseError, EfuseResult, ErrorKind};
pub use geometry::{
    Field, FieldDescriptor, FieldGeometry, IvKind, KeySlot, Page, PpkIndex, RowSegment, Versal,
    VersalNet, ZynqMp,
};
pub use regs::{Block, MmioRegisters, RegisterIo};
pub use request::{
    AesKey, GlitchConfig, Iv, Ppk384Hash, PpkDigest, PpkHash, PufControl, PufHelperData,
    WriteRequest, DNA_WORDS,
};
pub use session::ControllerSession;
pub use sysmon::Sysmon;
pub use write::Efuse;
