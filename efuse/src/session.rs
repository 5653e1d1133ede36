// Licensed under the Apache-2.0 license

use core::ops::Deref;

use portable_atomic::{AtomicBool, Ordering};
use romtime::HexWord;
use tock_registers::LocalRegisterCopy;

use crate::controller::Controller;
use crate::error::{EfuseError, EfuseResult};
use crate::regs::{self, Cfg, Pd, RegisterIo};

/// Set while a session holds the controller unlocked.
static SESSION_OPEN: AtomicBool = AtomicBool::new(false);

type CfgVal = LocalRegisterCopy<u32, Cfg::Register>;

/// Exclusive programming session.
///
/// Opening one unlocks and configures the controller for programming.
/// Dropping it, or calling [`close`](Self::close), restores normal read mode,
/// disables programming and locks the controller again. Only one session can
/// exist at a time.
pub struct ControllerSession<'a, R: RegisterIo> {
    ctrl: Controller<'a, R>,
    closed: bool,
}

impl<'a, R: RegisterIo> ControllerSession<'a, R> {
    pub fn open(ctrl: Controller<'a, R>) -> EfuseResult<Self> {
        if SESSION_OPEN
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            romtime::println!("[efuse] Session already open");
            return Err(EfuseError::SESSION_BUSY);
        }
        let session = ControllerSession {
            ctrl,
            closed: false,
        };
        let setup = session.setup().and_then(|_| session.provision_anchors());
        match setup {
            Ok(()) => Ok(session),
            Err(err) => session.finish(Err(err)),
        }
    }

    fn setup(&self) -> EfuseResult<()> {
        romtime::println!("[efuse] Unlocking controller");
        self.ctrl
            .write_ctrl(regs::WR_LOCK, regs::WR_UNLOCK_PASSCODE);
        if self.ctrl.read_ctrl(regs::WR_LOCK) != 0 {
            romtime::println!("[efuse] Unlock failed");
            return Err(EfuseError::UNLOCK);
        }

        // leave power down and run from the system oscillator
        self.ctrl.write_ctrl(regs::PD, Pd::ENABLE::CLEAR.value);
        self.ctrl
            .write_crp(regs::CRP_REF_CLK, regs::CRP_REF_CLK_SYSOSC);

        let mut cfg = CfgVal::new(self.ctrl.read_ctrl(regs::CFG));
        cfg.modify(Cfg::PGM_EN::SET + Cfg::MARGIN_RD::Margin);
        self.ctrl.write_ctrl(regs::CFG, cfg.get());

        let timers = self.ctrl.config().timer_values();
        let offsets = [
            regs::TPGM,
            regs::TRD,
            regs::TRDM,
            regs::TSU_H_PS,
            regs::TSU_H_PS_CS,
            regs::TSU_H_CS,
        ];
        for (offset, value) in offsets.into_iter().zip(timers) {
            self.ctrl.write_ctrl(offset, value);
        }
        self.ctrl.write_ctrl(regs::TEST_CTRL, 0);
        Ok(())
    }

    /// Runs every teardown step, reporting the first that failed.
    fn teardown(&mut self) -> EfuseResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut cfg = CfgVal::new(self.ctrl.read_ctrl(regs::CFG));
        cfg.modify(Cfg::MARGIN_RD::Normal);
        self.ctrl.write_ctrl(regs::CFG, cfg.get());

        cfg.modify(Cfg::PGM_EN::CLEAR);
        self.ctrl.write_ctrl(regs::CFG, cfg.get());

        self.ctrl
            .write_ctrl(regs::WR_LOCK, !regs::WR_UNLOCK_PASSCODE);
        let lock = self.ctrl.read_ctrl(regs::WR_LOCK);
        if lock != 1 {
            romtime::println!("[efuse] Lock failed: {}", HexWord(lock));
            return Err(EfuseError::LOCK);
        }
        Ok(())
    }

    pub fn close(mut self) -> EfuseResult<()> {
        self.teardown()
    }

    /// Closes the session and merges its outcome into `result`.
    ///
    /// The first failure wins. A failed teardown adds `TEARDOWN_FAILED`
    /// without hiding an earlier cause.
    pub fn finish<T>(self, result: EfuseResult<T>) -> EfuseResult<T> {
        let teardown = self.close();
        match (result, teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(_)) | (Ok(_), Err(err)) => Err(err | EfuseError::TEARDOWN_FAILED),
        }
    }

    pub fn controller(&self) -> &Controller<'a, R> {
        &self.ctrl
    }
}

impl<'a, R: RegisterIo> Deref for ControllerSession<'a, R> {
    type Target = Controller<'a, R>;

    fn deref(&self) -> &Self::Target {
        &self.ctrl
    }
}

impl<R: RegisterIo> Drop for ControllerSession<'_, R> {
    fn drop(&mut self) {
        let _ = self.teardown();
        SESSION_OPEN.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EfuseConfig;
    use crate::mock::{serial, MockEfuse};

    #[test]
    fn test_open_configures_controller() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        let session = ControllerSession::open(Controller::new(&mock, EfuseConfig::versal())).unwrap();
        assert!(!mock.is_locked());
        assert!(mock.programming_enabled());
        assert!(mock.margin_read());
        assert_eq!(mock.ctrl_reg(regs::TPGM), EfuseConfig::versal().timer_values()[0]);
        assert_eq!(mock.ctrl_reg(regs::TEST_CTRL), 0);
        assert_eq!(mock.crp_reg(regs::CRP_REF_CLK), regs::CRP_REF_CLK_SYSOSC);
        session.close().unwrap();
        assert!(mock.is_locked());
        assert!(!mock.programming_enabled());
        assert!(!mock.margin_read());
    }

    #[test]
    fn test_second_session_is_refused() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        let first = ControllerSession::open(Controller::new(&mock, EfuseConfig::versal())).unwrap();
        assert!(matches!(
            ControllerSession::open(Controller::new(&mock, EfuseConfig::versal())),
            Err(EfuseError::SESSION_BUSY)
        ));
        drop(first);
        assert!(mock.is_locked());
        assert!(ControllerSession::open(Controller::new(&mock, EfuseConfig::versal())).is_ok());
    }

    #[test]
    fn test_unlock_failure_still_locks() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        mock.refuse_unlock(true);
        assert!(matches!(
            ControllerSession::open(Controller::new(&mock, EfuseConfig::versal())),
            Err(EfuseError::UNLOCK)
        ));
        assert!(mock.is_locked());
        assert!(!mock.programming_enabled());
    }

    #[test]
    fn test_teardown_failure_is_flagged() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        let session = ControllerSession::open(Controller::new(&mock, EfuseConfig::versal())).unwrap();
        mock.refuse_lock(true);
        let result: EfuseResult<()> = session.finish(Err(EfuseError::PGM));
        let err = result.unwrap_err();
        assert!(err.contains(EfuseError::PGM));
        assert!(err.contains(EfuseError::TEARDOWN_FAILED));

        mock.refuse_lock(false);
        let session = ControllerSession::open(Controller::new(&mock, EfuseConfig::versal())).unwrap();
        mock.refuse_lock(true);
        assert_eq!(
            session.finish(Ok(())),
            Err(EfuseError::LOCK | EfuseError::TEARDOWN_FAILED)
        );
    }
}
