// Licensed under the Apache-2.0 license

use romtime::HexWord;

use crate::bit::VerifyPolicy;
use crate::error::{EfuseError, EfuseResult};
use crate::geometry::{Page, TbitsLayout};
use crate::regs::{self, RegisterIo, StatusVal, TestCtrl};
use crate::session::ControllerSession;

impl<R: RegisterIo> ControllerSession<'_, R> {
    /// Sets the protection bits of every row group that now holds data, then
    /// reloads and checks the cache.
    pub fn program_protection_rows(&self) -> EfuseResult<()> {
        let Some(tbits) = self.geometry().tbits() else {
            return self.reload();
        };
        let indicators = self.read_cache_word(tbits.cache_offset)?;

        for rule in self.geometry().protection_rules() {
            let clear = |col: u32| indicators & (1 << col) == 0;
            if !rule.columns.iter().any(|(col, _)| clear(*col)) {
                continue;
            }
            if !self.guard_satisfied(&rule.guard, false)? {
                continue;
            }
            for &(col, err) in rule.columns {
                if !clear(col) {
                    continue;
                }
                self.program_and_verify_bit(Page::Page0, tbits.row, col, VerifyPolicy::VERIFY)
                    .map_err(|e| e | err)?;
            }
        }
        self.reload_and_check()
    }

    /// Burns the anchor bits on pages that do not report them yet.
    pub(crate) fn provision_anchors(&self) -> EfuseResult<()> {
        let Some(tbits) = self.geometry().tbits() else {
            return Ok(());
        };
        let status = StatusVal::new(self.read_ctrl(regs::STATUS)).get();
        if status & tbits.status_mask == tbits.status_mask {
            return Ok(());
        }

        romtime::println!("[efuse] Provisioning anchor bits, status {}", HexWord(status));
        self.write_ctrl(regs::TEST_CTRL, TestCtrl::TBITS_PRGRMG_EN::SET.value);
        let result = self.program_anchors(tbits, status);
        self.write_ctrl(regs::TEST_CTRL, 0);
        result?;
        self.reload()
    }

    fn program_anchors(&self, tbits: &TbitsLayout, status: u32) -> EfuseResult<()> {
        for index in 0..self.geometry().pages() {
            if status & (1 << index) != 0 {
                continue;
            }
            let page = Page::from_index(index)?;
            if self.read_row(page, tbits.row)? & tbits.anchor_mask != 0 {
                return Err(EfuseError::PGM_TBIT_PATTERN);
            }
            for &col in tbits.anchor_columns {
                self.program_and_verify_bit(page, tbits.row, col, VerifyPolicy::VERIFY)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EfuseConfig;
    use crate::controller::Controller;
    use crate::mock::{serial, MockEfuse};

    fn open(mock: &MockEfuse) -> ControllerSession<'_, MockEfuse> {
        ControllerSession::open(Controller::new(mock, EfuseConfig::versal())).unwrap()
    }

    #[test]
    fn test_programs_only_populated_groups() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        mock.burn_row(0, 43, 1 << 2);
        mock.load_cache();
        let session = open(&mock);
        session.program_protection_rows().unwrap();
        let tbits = mock.row(0, 0);
        assert_eq!(tbits & 0x0FFF_0000, (1 << 19) | (1 << 20));
    }

    #[test]
    fn test_protection_is_idempotent() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        mock.burn_row(0, 43, 1 << 2);
        mock.burn_row(0, 64, 0xDEAD);
        mock.load_cache();
        let session = open(&mock);
        session.program_protection_rows().unwrap();
        let first = mock.row(0, 0);
        let pulses = mock.pulses();
        assert_eq!(pulses, 4);

        session.program_protection_rows().unwrap();
        assert_eq!(mock.row(0, 0), first);
        assert_eq!(mock.pulses(), pulses);
    }

    #[test]
    fn test_boot_env_needs_trims() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        mock.burn_row(0, 37, 1 << 21);
        mock.load_cache();
        let session = open(&mock);
        session.program_protection_rows().unwrap();
        assert_ne!(mock.row(0, 0) & (1 << 16), 0);
    }

    #[test]
    fn test_failure_names_the_indicator() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        mock.burn_row(0, 42, 0x55);
        mock.load_cache();
        let session = open(&mock);
        mock.fail_program(true);
        assert_eq!(
            session.program_protection_rows(),
            Err(EfuseError::PGM | EfuseError::WRITE_ROW_42_PROT)
        );
    }

    #[test]
    fn test_anchors_provisioned_on_blank_page() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        mock.blank_page(1);
        let session = open(&mock);
        assert_eq!(mock.row(1, 0), (1 << 31) | (1 << 29));
        assert_eq!(mock.pulses(), 2);
        assert_eq!(mock.ctrl_reg(regs::TEST_CTRL), 0);
        assert!(session.check_protection().is_ok());
    }

    #[test]
    fn test_partial_anchor_pattern_refused() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        mock.blank_page(2);
        mock.burn_row(2, 0, 1 << 28);
        assert!(matches!(
            ControllerSession::open(Controller::new(&mock, EfuseConfig::versal())),
            Err(EfuseError::PGM_TBIT_PATTERN)
        ));
        assert!(mock.is_locked());
        assert_eq!(mock.ctrl_reg(regs::TEST_CTRL), 0);
    }
}
