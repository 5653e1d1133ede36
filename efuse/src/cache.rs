// Licensed under the Apache-2.0 license

//! Cache reload and the post-programming protection check.

use core::hint::black_box;

use romtime::HexWord;

use crate::controller::Controller;
use crate::error::{EfuseError, EfuseResult};
use crate::geometry::Guard;
use crate::regs::{self, CacheLoad, Isr, RegisterIo, Status};
use crate::session::ControllerSession;

impl<R: RegisterIo> Controller<'_, R> {
    fn read_twice(&self, offset: u32) -> EfuseResult<(u32, u32)> {
        let first = black_box(self.read_cache_raw(offset)?);
        let second = black_box(self.read_cache_raw(offset)?);
        Ok((first, second))
    }

    /// Reads a cache word twice. Disagreeing reads give `GLITCH_DETECTED`.
    pub fn read_redundant(&self, offset: u32) -> EfuseResult<u32> {
        let (first, second) = self.read_twice(offset)?;
        if first != second {
            romtime::println!("[efuse] Redundant read mismatch at {}", HexWord(offset));
            return Err(EfuseError::GLITCH_DETECTED);
        }
        Ok(first)
    }

    /// Evaluates a protection guard over the cache.
    ///
    /// `locked` selects the stricter form that must hold once the
    /// protection bits are set.
    pub(crate) fn guard_satisfied(&self, guard: &Guard, locked: bool) -> EfuseResult<bool> {
        match *guard {
            Guard::AnyNonZero {
                offset,
                words,
                mask,
            } => {
                for i in 0..words {
                    if self.read_redundant(offset + i * 4)? & mask != 0 {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Guard::Exact { offset, mask } => {
                let value = self.read_redundant(offset)? & mask;
                Ok(if locked { value == mask } else { value != 0 })
            }
            Guard::AllNonZero { offsets } => {
                for &offset in offsets {
                    if self.read_redundant(offset)? == 0 {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    /// Checks the anchor bits, then that every protected row group still
    /// holds what its protection bits promise.
    pub fn check_protection(&self) -> EfuseResult<()> {
        let Some(tbits) = self.geometry().tbits() else {
            return Ok(());
        };
        let (first, second) = self
            .read_twice(tbits.cache_offset)
            .map_err(|_| EfuseError::ANCHOR_BIT_PATTERN)?;
        if first & tbits.anchor_mask != tbits.anchor_expected
            || second & tbits.anchor_mask != tbits.anchor_expected
        {
            romtime::println!(
                "[efuse] Bad anchor pattern: {} {}",
                HexWord(first),
                HexWord(second)
            );
            return Err(EfuseError::ANCHOR_BIT_PATTERN);
        }

        let indicators = first | second;
        for rule in self.geometry().protection_rules() {
            let protected = rule
                .columns
                .iter()
                .any(|(col, _)| indicators & (1 << col) != 0);
            if !protected {
                continue;
            }
            if !matches!(self.guard_satisfied(&rule.guard, true), Ok(true)) {
                romtime::println!("[efuse] Protection check failed: {:?}", rule.guard);
                return Err(EfuseError::IN_PROTECTION_CHECK);
            }
        }
        Ok(())
    }
}

impl<R: RegisterIo> ControllerSession<'_, R> {
    /// Reloads the cache from the array.
    pub fn reload(&self) -> EfuseResult<()> {
        self.write_ctrl(regs::CACHE_LOAD, CacheLoad::LOAD::SET.value);
        let done = self.wait_for(
            regs::STATUS,
            Status::CACHE_DONE::SET.value,
            self.config().timeouts.cache_load,
            EfuseError::CACHE_LOAD_TIMEOUT,
        );
        let isr = self.isr();
        self.clear_isr(Isr::CACHE_ERROR::SET.value);
        done?;
        if isr.is_set(Isr::CACHE_ERROR) {
            romtime::println!("[efuse] Cache load error");
            return Err(EfuseError::CACHE_LOAD);
        }
        Ok(())
    }

    pub fn reload_and_check(&self) -> EfuseResult<()> {
        self.reload()?;
        self.check_protection()
    }
}
