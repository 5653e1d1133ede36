// Licensed under the Apache-2.0 license

//! Controller register map and the register-level I/O boundary.

use romtime::StaticRef;
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, LocalRegisterCopy};

use crate::config::EfuseConfig;

// control block
pub const WR_LOCK: u32 = 0x000;
pub const CFG: u32 = 0x004;
pub const STATUS: u32 = 0x008;
pub const PGM_ADDR: u32 = 0x00C;
pub const RD_ADDR: u32 = 0x010;
pub const RD_DATA: u32 = 0x014;
pub const TPGM: u32 = 0x018;
pub const TRD: u32 = 0x01C;
pub const TSU_H_PS: u32 = 0x020;
pub const TSU_H_PS_CS: u32 = 0x024;
pub const TRDM: u32 = 0x028;
pub const TSU_H_CS: u32 = 0x02C;
pub const ISR: u32 = 0x030;
pub const CACHE_LOAD: u32 = 0x040;
pub const AES_CRC: u32 = 0x048;
pub const AES_USR_KEY0_CRC: u32 = 0x04C;
pub const AES_USR_KEY1_CRC: u32 = 0x050;
pub const PD: u32 = 0x054;
pub const TEST_CTRL: u32 = 0x100;

// clock/reset block
pub const CRP_REF_CLK: u32 = 0x134;
pub const CRP_REF_CLK_SYSOSC: u32 = 1 << 2;

pub const WR_UNLOCK_PASSCODE: u32 = 0xDF0D;

pub const CTRL_WORDS: usize = (TEST_CTRL as usize / 4) + 1;
pub const CACHE_WORDS_PER_PAGE: usize = 0x100;
pub const CACHE_PAGES: usize = 3;
pub const CACHE_WORDS: usize = CACHE_WORDS_PER_PAGE * CACHE_PAGES;
pub const CRP_WORDS: usize = (CRP_REF_CLK as usize / 4) + 1;

register_bitfields![u32,
    pub Cfg [
        PGM_EN OFFSET(1) NUMBITS(1) [],
        MARGIN_RD OFFSET(2) NUMBITS(1) [
            Normal = 0,
            Margin = 1,
        ],
    ],
    pub Status [
        TBIT_0 OFFSET(0) NUMBITS(1) [],
        TBIT_1 OFFSET(1) NUMBITS(1) [],
        TBIT_2 OFFSET(2) NUMBITS(1) [],
        CACHE_DONE OFFSET(5) NUMBITS(1) [],
        AES_CRC_DONE OFFSET(6) NUMBITS(1) [],
        AES_CRC_PASS OFFSET(7) NUMBITS(1) [],
        USR_KEY0_CRC_DONE OFFSET(8) NUMBITS(1) [],
        USR_KEY0_CRC_PASS OFFSET(9) NUMBITS(1) [],
        USR_KEY1_CRC_DONE OFFSET(10) NUMBITS(1) [],
        USR_KEY1_CRC_PASS OFFSET(11) NUMBITS(1) [],
    ],
    pub Isr [
        PGM_DONE OFFSET(0) NUMBITS(1) [],
        PGM_ERROR OFFSET(1) NUMBITS(1) [],
        RD_DONE OFFSET(2) NUMBITS(1) [],
        CACHE_ERROR OFFSET(4) NUMBITS(1) [],
    ],
    pub Pd [
        ENABLE OFFSET(0) NUMBITS(1) [],
    ],
    pub CacheLoad [
        LOAD OFFSET(0) NUMBITS(1) [],
    ],
    pub TestCtrl [
        TBITS_PRGRMG_EN OFFSET(3) NUMBITS(1) [],
    ],
    pub Addr [
        COLUMN OFFSET(0) NUMBITS(5) [],
        ROW OFFSET(5) NUMBITS(8) [],
        PAGE OFFSET(13) NUMBITS(2) [],
    ],
];

pub type IsrVal = LocalRegisterCopy<u32, Isr::Register>;
pub type StatusVal = LocalRegisterCopy<u32, Status::Register>;

/// Register block addressed by [`RegisterIo`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Block {
    Ctrl,
    Cache,
    Crp,
}

impl Block {
    /// Words mapped for the block.
    pub const fn words(self) -> usize {
        match self {
            Block::Ctrl => CTRL_WORDS,
            Block::Cache => CACHE_WORDS,
            Block::Crp => CRP_WORDS,
        }
    }

    /// Word index of `offset`, if it is aligned and inside the block.
    pub fn index(self, offset: u32) -> Option<usize> {
        let idx = (offset / 4) as usize;
        (offset % 4 == 0 && idx < self.words()).then_some(idx)
    }
}

/// Word access to the controller.
///
/// Every hardware access in the driver goes through this trait, at
/// `base(block) + offset`.
pub trait RegisterIo {
    fn read(&self, block: Block, offset: u32) -> u32;
    fn write(&self, block: Block, offset: u32, value: u32);
}

/// [`RegisterIo`] over the physical register blocks.
pub struct MmioRegisters {
    ctrl: StaticRef<[ReadWrite<u32>; CTRL_WORDS]>,
    cache: StaticRef<[ReadOnly<u32>; CACHE_WORDS]>,
    crp: StaticRef<[ReadWrite<u32>; CRP_WORDS]>,
}

impl MmioRegisters {
    /// # Safety
    ///
    /// The bases in `config` must point at the controller, its cache and the
    /// clock/reset block, and nothing else may alias them.
    pub const unsafe fn new(config: &EfuseConfig) -> Self {
        MmioRegisters {
            ctrl: StaticRef::new(config.ctrl_base as *const [ReadWrite<u32>; CTRL_WORDS]),
            cache: StaticRef::new(config.cache_base as *const [ReadOnly<u32>; CACHE_WORDS]),
            crp: StaticRef::new(config.crp_base as *const [ReadWrite<u32>; CRP_WORDS]),
        }
    }
}

impl RegisterIo for MmioRegisters {
    /// Offsets outside the block assert in debug builds. Release builds read
    /// all ones, which never passes for an unprogrammed field.
    fn read(&self, block: Block, offset: u32) -> u32 {
        let idx = block.index(offset);
        debug_assert!(idx.is_some(), "{:?} offset {:#x} out of range", block, offset);
        let Some(idx) = idx else {
            return u32::MAX;
        };
        match block {
            Block::Ctrl => self.ctrl[idx].get(),
            Block::Cache => self.cache[idx].get(),
            Block::Crp => self.crp[idx].get(),
        }
    }

    fn write(&self, block: Block, offset: u32, value: u32) {
        let idx = block.index(offset);
        debug_assert!(idx.is_some(), "{:?} offset {:#x} out of range", block, offset);
        let Some(idx) = idx else {
            return;
        };
        let reg = match block {
            Block::Ctrl => self.ctrl.get(idx),
            Block::Crp => self.crp.get(idx),
            // the cache is read-only
            Block::Cache => None,
        };
        if let Some(reg) = reg {
            reg.set(value);
        }
    }
}

/// Controller address of a single fuse bit.
pub fn fuse_address(page: u32, row: u32, col: u32) -> u32 {
    let mut addr = LocalRegisterCopy::<u32, Addr::Register>::new(0);
    addr.modify(Addr::PAGE.val(page) + Addr::ROW.val(row) + Addr::COLUMN.val(col));
    addr.get()
}
