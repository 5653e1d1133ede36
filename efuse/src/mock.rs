// Licensed under the Apache-2.0 license

//! Simulated controller for host tests.
//!
//! The fuse array is write-once: a pulse can only set a bit. The cache is a
//! snapshot of the array taken on CACHE_LOAD (or [`MockEfuse::load_cache`]),
//! laid out by the variant's geometry, with key rows left out.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::config::Variant;
use crate::crc::{KeyCrc, RowCrc};
use crate::error::EfuseResult;
use crate::geometry::{
    Field, FieldDescriptor, FieldGeometry, IvKind, KeySlot, Page, PpkIndex, COLS_PER_ROW,
    ROWS_PER_PAGE,
};
use crate::regs::{
    self, Block, Cfg, Isr, Status, CACHE_WORDS, CRP_WORDS, CTRL_WORDS, WR_UNLOCK_PASSCODE,
};
use crate::request::AesKey;
use crate::sysmon::Sysmon;

const PAGES: usize = 3;
const ROWS: usize = ROWS_PER_PAGE as usize;

type Array = [[u32; ROWS]; PAGES];

/// Sessions share one process-wide flag, so tests that open one run one at
/// a time.
pub(crate) fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) struct FixedSysmon(pub EfuseResult<()>);

impl Sysmon for FixedSysmon {
    fn check_temperature_and_voltage(&self) -> EfuseResult<()> {
        self.0
    }
}

const CACHED_FIELDS: &[Field] = &[
    Field::PpkHash(PpkIndex::Ppk0),
    Field::PpkHash(PpkIndex::Ppk1),
    Field::PpkHash(PpkIndex::Ppk2),
    Field::PpkHash(PpkIndex::Ppk3),
    Field::PpkHash(PpkIndex::Ppk4),
    Field::Iv(IvKind::MetaHeader),
    Field::Iv(IvKind::BlackObfus),
    Field::Iv(IvKind::Plm),
    Field::Iv(IvKind::DataPartition),
    Field::BootEnvControl,
    Field::MiscControl,
    Field::PufEccControl,
    Field::PufChash,
    Field::PufSyndrome,
    Field::SecurityControl,
    Field::SecurityMisc0,
    Field::SecurityMisc1,
    Field::RevocationIds,
    Field::OffChipIds,
    Field::UserFuses,
    Field::Dna,
    Field::GlitchConfig,
];

// analog trim rows populated at the factory on Versal parts
const VERSAL_TRIMS: [(usize, u32); 4] = [(4, 0x0000_1A2B), (8, 0x0003_0001), (9, 0x0000_0F0F), (59, 0x0101_0000)];

#[derive(Default)]
struct Faults {
    stall_program: Cell<bool>,
    stall_read: Cell<bool>,
    stall_cache: Cell<bool>,
    stall_crc: Cell<bool>,
    fail_program: Cell<bool>,
    drop_pulses: Cell<bool>,
    fail_cache_load: Cell<bool>,
    refuse_unlock: Cell<bool>,
    refuse_lock: Cell<bool>,
}

pub(crate) struct MockEfuse {
    geometry: &'static dyn FieldGeometry,
    array: RefCell<Array>,
    cache: RefCell<Vec<u32>>,
    ctrl: RefCell<Vec<u32>>,
    crp: RefCell<Vec<u32>>,
    locked: Cell<bool>,
    isr: Cell<u32>,
    status: Cell<u32>,
    rd_data: Cell<u32>,
    pulses: Cell<u32>,
    row_reads: Cell<u32>,
    unlock_attempts: Cell<u32>,
    faults: Faults,
    glitches: RefCell<VecDeque<(u32, u32)>>,
}

impl MockEfuse {
    pub fn new(variant: Variant) -> Self {
        let geometry = variant.geometry();
        let mut array = [[0u32; ROWS]; PAGES];
        if let Some(tbits) = geometry.tbits() {
            for page in array.iter_mut().take(geometry.pages() as usize) {
                page[tbits.row as usize] = tbits.anchor_expected;
            }
        }
        if variant == Variant::Versal {
            for (row, value) in VERSAL_TRIMS {
                array[0][row] = value;
            }
        }
        let mock = MockEfuse {
            geometry,
            array: RefCell::new(array),
            cache: RefCell::new(vec![0; CACHE_WORDS]),
            ctrl: RefCell::new(vec![0; CTRL_WORDS]),
            crp: RefCell::new(vec![0; CRP_WORDS]),
            locked: Cell::new(true),
            isr: Cell::new(0),
            status: Cell::new(0),
            rd_data: Cell::new(0),
            pulses: Cell::new(0),
            row_reads: Cell::new(0),
            unlock_attempts: Cell::new(0),
            faults: Faults::default(),
            glitches: RefCell::new(VecDeque::new()),
        };
        mock.load_cache();
        mock
    }

    pub fn versal() -> Self {
        Self::new(Variant::Versal)
    }

    pub fn versal_net() -> Self {
        Self::new(Variant::VersalNet)
    }

    pub fn zynqmp() -> Self {
        Self::new(Variant::ZynqMp)
    }

    fn bit(array: &Array, page: Page, row: u32, col: u32) -> bool {
        array[u32::from(page) as usize][row as usize] & (1 << col) != 0
    }

    /// Field value assembled from the array.
    fn gather(array: &Array, desc: &FieldDescriptor) -> Vec<u32> {
        let mut words = vec![0u32; desc.words];
        for bit in 0..(desc.words as u32) * COLS_PER_ROW {
            if let Some((page, row, col)) = desc.locate(bit) {
                if Self::bit(array, page, row, col) {
                    words[(bit / 32) as usize] |= 1 << (bit % 32);
                }
            }
        }
        words
    }

    pub fn load_cache(&self) {
        let array = self.array.borrow();
        let mut cache = self.cache.borrow_mut();
        cache.iter_mut().for_each(|w| *w = 0);

        for index in 0..self.geometry.pages() {
            let Ok(page) = Page::from_index(index) else {
                continue;
            };
            for row in 0..ROWS_PER_PAGE {
                if self.geometry.is_key_row(page, row) {
                    continue;
                }
                if let Some(offset) = self.geometry.cache_offset_of_row(page, row) {
                    cache[(offset / 4) as usize] = array[index as usize][row as usize];
                }
            }
        }
        for field in CACHED_FIELDS {
            if let Some(desc) = self.geometry.field(*field) {
                let start = (desc.cache_offset / 4) as usize;
                for (i, word) in Self::gather(&array, desc).into_iter().enumerate() {
                    cache[start + i] = word;
                }
            }
        }
        self.status.set(self.status.get() | Status::CACHE_DONE::SET.value);
    }

    fn tbit_groups(&self) -> u32 {
        let Some(tbits) = self.geometry.tbits() else {
            return 0;
        };
        let array = self.array.borrow();
        (0..self.geometry.pages())
            .filter(|page| {
                array[*page as usize][tbits.row as usize] & tbits.anchor_mask
                    == tbits.anchor_expected
            })
            .fold(0, |acc, page| acc | (1 << page))
    }

    fn pulse(&self, addr: u32) {
        self.pulses.set(self.pulses.get() + 1);
        if self.faults.stall_program.get() {
            return;
        }
        let cfg = self.ctrl.borrow()[(regs::CFG / 4) as usize];
        if self.faults.fail_program.get() || self.locked.get() || cfg & Cfg::PGM_EN::SET.value == 0 {
            self.raise_isr(Isr::PGM_ERROR::SET.value);
            return;
        }
        if !self.faults.drop_pulses.get() {
            let (page, row, col) = decode(addr);
            self.array.borrow_mut()[page][row] |= 1 << col;
        }
        self.raise_isr(Isr::PGM_DONE::SET.value);
    }

    fn read_array_row(&self, addr: u32) {
        self.row_reads.set(self.row_reads.get() + 1);
        if self.faults.stall_read.get() {
            return;
        }
        let (page, row, _) = decode(addr);
        self.rd_data.set(self.array.borrow()[page][row]);
        self.raise_isr(Isr::RD_DONE::SET.value);
    }

    fn cache_load(&self) {
        self.status.set(self.status.get() & !Status::CACHE_DONE::SET.value);
        if self.faults.stall_cache.get() {
            return;
        }
        if self.faults.fail_cache_load.get() {
            self.raise_isr(Isr::CACHE_ERROR::SET.value);
        }
        self.load_cache();
    }

    fn crc_check(&self, offset: u32, expected: u32) {
        let slots = [KeySlot::Aes, KeySlot::UserKey0, KeySlot::UserKey1];
        let Some((slot, crc)) = slots.into_iter().find_map(|slot| {
            self.geometry
                .key_crc(slot)
                .filter(|crc| crc.offset == offset)
                .map(|crc| (slot, crc))
        }) else {
            return;
        };
        let mut status = self.status.get() & !(crc.done_mask | crc.pass_mask);
        if !self.faults.stall_crc.get() {
            status |= crc.done_mask;
            if let Some(desc) = self.geometry.field(Field::Key(slot)) {
                let words = Self::gather(&self.array.borrow(), desc);
                let mut key = AesKey([0; 8]);
                key.0.iter_mut().zip(words).for_each(|(k, w)| *k = w);
                if RowCrc.compute(&key) == expected {
                    status |= crc.pass_mask;
                }
            }
        }
        self.status.set(status);
    }

    fn is_crc_reg(offset: u32) -> bool {
        matches!(
            offset,
            regs::AES_CRC | regs::AES_USR_KEY0_CRC | regs::AES_USR_KEY1_CRC
        )
    }

    pub fn burn_row(&self, page: usize, row: usize, value: u32) {
        self.array.borrow_mut()[page][row] |= value;
    }

    /// Erases the anchor row of `page`, as on an unprovisioned part.
    pub fn blank_page(&self, page: usize) {
        if let Some(tbits) = self.geometry.tbits() {
            self.array.borrow_mut()[page][tbits.row as usize] = 0;
        }
        self.load_cache();
    }

    pub fn row(&self, page: usize, row: usize) -> u32 {
        self.array.borrow()[page][row]
    }

    pub fn snapshot(&self) -> Array {
        *self.array.borrow()
    }

    pub fn changed_rows(&self, before: &Array) -> Vec<(u32, u32)> {
        let array = self.array.borrow();
        let mut changed = Vec::new();
        for page in 0..PAGES {
            for row in 0..ROWS {
                if array[page][row] != before[page][row] {
                    changed.push((page as u32, row as u32));
                }
            }
        }
        changed
    }

    pub fn pulses(&self) -> u32 {
        self.pulses.get()
    }

    pub fn row_reads(&self) -> u32 {
        self.row_reads.get()
    }

    pub fn unlock_attempts(&self) -> u32 {
        self.unlock_attempts.get()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }

    pub fn programming_enabled(&self) -> bool {
        self.ctrl_reg(regs::CFG) & Cfg::PGM_EN::SET.value != 0
    }

    pub fn margin_read(&self) -> bool {
        self.ctrl_reg(regs::CFG) & Cfg::MARGIN_RD::Margin.value != 0
    }

    pub fn ctrl_reg(&self, offset: u32) -> u32 {
        self.ctrl.borrow()[(offset / 4) as usize]
    }

    pub fn crp_reg(&self, offset: u32) -> u32 {
        self.crp.borrow()[(offset / 4) as usize]
    }

    pub fn raise_isr(&self, mask: u32) {
        self.isr.set(self.isr.get() | mask);
    }

    /// The next cache read at `offset` returns `value`.
    pub fn glitch_cache_read(&self, offset: u32, value: u32) {
        self.glitches.borrow_mut().push_back((offset, value));
    }

    pub fn stall_program(&self, on: bool) {
        self.faults.stall_program.set(on);
    }

    pub fn stall_read(&self, on: bool) {
        self.faults.stall_read.set(on);
    }

    pub fn stall_cache(&self, on: bool) {
        self.faults.stall_cache.set(on);
    }

    pub fn stall_crc(&self, on: bool) {
        self.faults.stall_crc.set(on);
    }

    pub fn fail_program(&self, on: bool) {
        self.faults.fail_program.set(on);
    }

    /// Pulses complete without burning anything.
    pub fn drop_pulses(&self, on: bool) {
        self.faults.drop_pulses.set(on);
    }

    pub fn fail_cache_load(&self, on: bool) {
        self.faults.fail_cache_load.set(on);
    }

    pub fn refuse_unlock(&self, on: bool) {
        self.faults.refuse_unlock.set(on);
    }

    pub fn refuse_lock(&self, on: bool) {
        self.faults.refuse_lock.set(on);
    }
}

fn decode(addr: u32) -> (usize, usize, u32) {
    let page = ((addr >> 13) & 0x3) as usize;
    let row = ((addr >> 5) & 0xFF) as usize;
    (page.min(PAGES - 1), row, addr & 0x1F)
}

impl regs::RegisterIo for MockEfuse {
    fn read(&self, block: Block, offset: u32) -> u32 {
        let Some(idx) = block.index(offset) else {
            panic!("{:?} offset {:#x} out of range", block, offset);
        };
        match block {
            Block::Ctrl => match offset {
                regs::WR_LOCK => self.locked.get() as u32,
                regs::STATUS => self.status.get() | self.tbit_groups(),
                regs::ISR => self.isr.get(),
                regs::RD_DATA => self.rd_data.get(),
                _ => self.ctrl.borrow()[idx],
            },
            Block::Cache => {
                let mut glitches = self.glitches.borrow_mut();
                if matches!(glitches.front(), Some((at, _)) if *at == offset) {
                    if let Some((_, value)) = glitches.pop_front() {
                        return value;
                    }
                }
                self.cache.borrow()[idx]
            }
            Block::Crp => self.crp.borrow()[idx],
        }
    }

    fn write(&self, block: Block, offset: u32, value: u32) {
        let Some(idx) = block.index(offset) else {
            panic!("{:?} offset {:#x} out of range", block, offset);
        };
        match block {
            Block::Ctrl => match offset {
                regs::WR_LOCK if value == WR_UNLOCK_PASSCODE => {
                    self.unlock_attempts.set(self.unlock_attempts.get() + 1);
                    if !self.faults.refuse_unlock.get() {
                        self.locked.set(false);
                    }
                }
                regs::WR_LOCK => {
                    if !self.faults.refuse_lock.get() {
                        self.locked.set(true);
                    }
                }
                regs::ISR => self.isr.set(self.isr.get() & !value),
                regs::PGM_ADDR => self.pulse(value),
                regs::RD_ADDR => self.read_array_row(value),
                regs::CACHE_LOAD => self.cache_load(),
                _ if Self::is_crc_reg(offset) => self.crc_check(offset, value),
                // everything else is write-protected while locked
                _ if self.locked.get() => {}
                _ => self.ctrl.borrow_mut()[idx] = value,
            },
            Block::Crp => self.crp.borrow_mut()[idx] = value,
            Block::Cache => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::RegisterIo;

    #[test]
    fn test_array_is_write_once() {
        let mock = MockEfuse::versal();
        mock.burn_row(1, 5, 0x0F);
        mock.burn_row(1, 5, 0xF0);
        assert_eq!(mock.row(1, 5), 0xFF);
    }

    #[test]
    fn test_cache_follows_geometry() {
        let mock = MockEfuse::versal_net();
        // ID 9 of the revocation field sits in row 193, column 1
        mock.burn_row(0, 193, 1 << 1);
        assert_eq!(mock.read(Block::Cache, 0xB0), 0);
        mock.load_cache();
        assert_eq!(mock.read(Block::Cache, 0xB0), 1 << 9);
    }

    #[test]
    fn test_key_rows_stay_out_of_cache() {
        let mock = MockEfuse::versal();
        mock.burn_row(0, 12, 0xFFFF_FFFF);
        mock.load_cache();
        assert_eq!(mock.read(Block::Cache, 12 * 4), 0);
    }

    #[test]
    fn test_locked_controller_ignores_programming() {
        let mock = MockEfuse::versal();
        mock.write(Block::Ctrl, regs::CFG, 0x6);
        assert!(!mock.programming_enabled());
        mock.write(Block::Ctrl, regs::PGM_ADDR, regs::fuse_address(1, 1, 1));
        assert_eq!(mock.row(1, 1), 0);
        assert_ne!(mock.read(Block::Ctrl, regs::ISR) & Isr::PGM_ERROR::SET.value, 0);
    }
}
