// Licensed under the Apache-2.0 license

//! Single-bit program and verify. Every write pulse the driver issues goes
//! through [`ControllerSession::program_bit`].

use core::hint::black_box;

use romtime::HexWord;

use crate::error::{EfuseError, EfuseResult};
use crate::geometry::{FieldGeometry, Page, COLS_PER_ROW, ROWS_PER_PAGE};
use crate::regs::{self, fuse_address, Isr, RegisterIo};
use crate::session::ControllerSession;

/// Whether a programmed bit is read back from the array.
///
/// The decision is stored twice so that a single corrupted copy is caught
/// before the pulse.
#[derive(Clone, Copy, Debug)]
pub struct VerifyPolicy {
    skip: bool,
    skip_copy: bool,
}

impl VerifyPolicy {
    pub const VERIFY: VerifyPolicy = VerifyPolicy::new(false);
    pub const SKIP: VerifyPolicy = VerifyPolicy::new(true);

    const fn new(skip: bool) -> Self {
        VerifyPolicy {
            skip,
            skip_copy: skip,
        }
    }

    /// Key rows cannot be read back, so they skip verification.
    pub fn for_row(geometry: &dyn FieldGeometry, page: Page, row: u32) -> Self {
        Self::new(geometry.is_key_row(page, row))
    }

    fn skip(&self) -> EfuseResult<bool> {
        let skip = black_box(self.skip);
        if skip != black_box(self.skip_copy) {
            return Err(EfuseError::GLITCH_DETECTED);
        }
        Ok(skip)
    }

    #[cfg(test)]
    pub(crate) fn corrupted() -> Self {
        VerifyPolicy {
            skip: true,
            skip_copy: false,
        }
    }
}

fn check_address(row: u32, col: u32) -> EfuseResult<()> {
    if row >= ROWS_PER_PAGE || col >= COLS_PER_ROW {
        return Err(EfuseError::INVALID_PARAM);
    }
    Ok(())
}

impl<R: RegisterIo> ControllerSession<'_, R> {
    fn cached_bit_set(&self, page: Page, row: u32, col: u32) -> EfuseResult<bool> {
        if self.geometry().is_key_row(page, row) {
            return Ok(false);
        }
        match self.geometry().cache_offset_of_row(page, row) {
            Some(offset) => Ok(self.read_cache_raw(offset)? & (1 << col) != 0),
            None => Ok(false),
        }
    }

    /// Issues one program pulse. Bits the cache already shows as set are
    /// left alone.
    pub fn program_bit(&self, page: Page, row: u32, col: u32) -> EfuseResult<()> {
        check_address(row, col)?;
        if u32::from(page) >= self.geometry().pages() {
            return Err(EfuseError::INVALID_PARAM);
        }
        if self.cached_bit_set(page, row, col)? {
            return Ok(());
        }

        let events = Isr::PGM_DONE::SET.value | Isr::PGM_ERROR::SET.value;
        self.clear_isr(events);
        self.write_ctrl(regs::PGM_ADDR, fuse_address(page.into(), row, col));
        let isr = self.wait_for(
            regs::ISR,
            events,
            self.config().timeouts.program,
            EfuseError::PGM_TIMEOUT,
        );
        self.clear_isr(events);

        if isr? & Isr::PGM_ERROR::SET.value != 0 {
            romtime::println!(
                "[efuse] Program error at {}",
                HexWord(fuse_address(page.into(), row, col))
            );
            return Err(EfuseError::PGM);
        }
        Ok(())
    }

    /// Reads a whole row straight from the array.
    pub fn read_row(&self, page: Page, row: u32) -> EfuseResult<u32> {
        check_address(row, 0)?;
        self.write_ctrl(regs::RD_ADDR, fuse_address(page.into(), row, 0));
        let isr = self.wait_for(
            regs::ISR,
            Isr::RD_DONE::SET.value,
            self.config().timeouts.read,
            EfuseError::RD_TIMEOUT,
        );
        let data = self.read_ctrl(regs::RD_DATA);
        self.clear_isr(Isr::RD_DONE::SET.value);
        isr?;
        Ok(data)
    }

    pub fn verify_bit(&self, page: Page, row: u32, col: u32) -> EfuseResult<bool> {
        check_address(row, col)?;
        Ok(self.read_row(page, row)? & (1 << col) != 0)
    }

    pub fn program_and_verify_bit(
        &self,
        page: Page,
        row: u32,
        col: u32,
        policy: VerifyPolicy,
    ) -> EfuseResult<()> {
        let skip_verify = policy.skip()?;
        self.program_bit(page, row, col)?;
        if skip_verify {
            return Ok(());
        }
        if !self.verify_bit(page, row, col)? {
            romtime::println!(
                "[efuse] Verify failed at {}",
                HexWord(fuse_address(page.into(), row, col))
            );
            return Err(EfuseError::PGM_VERIFY);
        }
        Ok(())
    }
}
