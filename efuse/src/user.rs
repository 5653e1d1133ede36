// Licensed under the Apache-2.0 license

//! General-purpose fuse rows: the user fuse area, and PUF syndrome rows
//! reused as user data on parts that never store helper data.
//!
//! Both are addressed as 1-based row numbers inside their field. Requested
//! words may only add bits to what is already burnt.

use crate::control::{PufEccCtrlBits, SecCtrl, SecCtrlBits, DEC_ONLY_MASK, PUF_AUX_MASK};
use crate::controller::Controller;
use crate::error::{EfuseError, EfuseResult};
use crate::geometry::{Field, FieldDescriptor, Page, PpkIndex};
use crate::regs::RegisterIo;
use crate::request::PUF_SYN_WORDS;
use crate::session::ControllerSession;
use crate::write::Efuse;

/// Longest run either area can hold.
const MAX_WINDOW_WORDS: usize = PUF_SYN_WORDS;

/// The last syndrome row keeps its top nibble clear.
const PUF_LAST_ROW_RESERVED: u32 = 0xF000_0000;

/// Whole rows `start_row..start_row + count` of one full-row field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RowWindow {
    pub page: Page,
    pub start_row: u32,
    pub count: u32,
    pub cache_offset: u32,
    /// The window ends on the field's last row.
    pub at_end: bool,
}

impl RowWindow {
    /// Rows `first..first + count` of `desc`, numbered from 1.
    pub fn within(desc: &FieldDescriptor, first: u32, count: usize) -> EfuseResult<Self> {
        let [seg] = desc.segments else {
            return Err(EfuseError::INVALID_PARAM);
        };
        let end = (first as usize).checked_add(count);
        if !seg.is_full_row()
            || first == 0
            || count == 0
            || count > MAX_WINDOW_WORDS
            || end.map_or(true, |end| end - 1 > desc.words)
        {
            return Err(EfuseError::INVALID_PARAM);
        }
        Ok(RowWindow {
            page: seg.page,
            start_row: seg.start_row + first - 1,
            count: count as u32,
            cache_offset: desc.cache_offset + (first - 1) * 4,
            at_end: end == Some(desc.words + 1),
        })
    }

    fn overlaps(&self, desc: &FieldDescriptor) -> bool {
        desc.segments.iter().any(|seg| {
            seg.page == self.page
                && seg.start_row < self.start_row + self.count
                && self.start_row < seg.start_row + seg.row_count
        })
    }
}

impl<R: RegisterIo> Controller<'_, R> {
    /// Every burnt bit in the window is still set in `data`.
    fn check_no_revert(&self, window: &RowWindow, data: &[u32]) -> EfuseResult<()> {
        for (i, word) in data.iter().enumerate() {
            let cached = self.read_cache_word(window.cache_offset + i as u32 * 4)?;
            if cached & word != cached {
                return Err(EfuseError::BIT_CANT_REVERT);
            }
        }
        Ok(())
    }

    /// User fuse rows that hold PPK3 or PPK4 are off limits once the
    /// additional slots are enabled.
    fn reserved_for_additional_ppks(&self, window: &RowWindow) -> EfuseResult<bool> {
        for index in [PpkIndex::Ppk3, PpkIndex::Ppk4] {
            let Some(ppk) = self.geometry().field(Field::PpkHash(index)) else {
                continue;
            };
            if window.overlaps(ppk) && self.additional_ppks_enabled(0)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub(crate) fn validate_user_fuses(&self, first: u32, data: &[u32]) -> EfuseResult<RowWindow> {
        let desc = self.geometry().field_or_invalid(Field::UserFuses)?;
        let window = RowWindow::within(desc, first, data.len())?;
        if self.reserved_for_additional_ppks(&window)? {
            return Err(EfuseError::USER_FUSE_PGM_NOT_ALLOWED | EfuseError::WRITE_USER_FUSES);
        }
        self.check_no_revert(&window, data)
            .map_err(|err| err | EfuseError::WRITE_USER_FUSES)?;
        Ok(window)
    }

    /// Syndrome rows are only free while no PUF helper data or
    /// decrypt-only setting claims them.
    pub(crate) fn validate_puf_fuses(&self, first: u32, data: &[u32]) -> EfuseResult<RowWindow> {
        let desc = self.geometry().field_or_invalid(Field::PufSyndrome)?;
        let window = RowWindow::within(desc, first, data.len())?;

        let sec = SecCtrlBits::new(self.read_field_word(Field::SecurityControl)?);
        if sec.is_set(SecCtrl::PUF_SYN_LK) {
            return Err(EfuseError::FUSE_PROTECTED | EfuseError::PUF_SYN_ALREADY_PRGMD);
        }
        if !self.field_is_zero(Field::PufChash)? {
            return Err(EfuseError::PUF_CHASH_ALREADY_PRGMD);
        }
        let ecc = PufEccCtrlBits::new(self.read_field_word(Field::PufEccControl)?);
        if ecc.get() & PUF_AUX_MASK != 0 {
            return Err(EfuseError::PUF_AUX_ALREADY_PRGMD);
        }
        if self.read_field_word(Field::SecurityMisc0)? & DEC_ONLY_MASK != 0 {
            return Err(EfuseError::DEC_ONLY_ALREADY_PRGMD);
        }
        self.check_no_revert(&window, data)
            .map_err(|err| err | EfuseError::WRITE_PUF_FUSES)?;
        let last = data.last().copied().unwrap_or(0);
        if window.at_end && last & PUF_LAST_ROW_RESERVED != 0 {
            return Err(EfuseError::INVALID_PARAM | EfuseError::WRITE_PUF_FUSES);
        }
        Ok(window)
    }
}

impl<R: RegisterIo> ControllerSession<'_, R> {
    /// Burns the bits of `data` the window does not hold yet.
    pub(crate) fn program_window(&self, window: &RowWindow, data: &[u32]) -> EfuseResult<()> {
        let mut scratch = [0u32; MAX_WINDOW_WORDS];
        let bits = scratch
            .get_mut(..data.len())
            .ok_or(EfuseError::INVALID_PARAM)?;
        self.compute_programmable_words(data, window.cache_offset, bits)?;
        self.program_rows(window.page.into(), window.start_row, window.count, bits)
    }
}

impl<R: RegisterIo> Efuse<'_, R> {
    /// Burns `data` into user fuses `first..first + data.len()`, numbered
    /// from 1.
    pub fn write_user_fuses(
        &self,
        first: u32,
        data: &[u32],
        env_monitor_disable: bool,
    ) -> EfuseResult<()> {
        if data.iter().all(|word| *word == 0) {
            return Err(EfuseError::NOTHING_TO_PROGRAM);
        }
        self.run(env_monitor_disable, |session| {
            let window = session
                .validate_user_fuses(first, data)
                .map_err(|err| err | EfuseError::BEFORE_PROGRAMMING)?;
            romtime::println!(
                "[efuse] Programming user fuses {}..{}",
                first,
                first + window.count
            );
            session
                .program_window(&window, data)
                .map_err(|err| err | EfuseError::WRITE_USER_FUSES)?;
            session.reload_and_check()?;
            session.program_protection_rows()
        })
    }

    pub fn read_user_fuses(&self, first: u32, out: &mut [u32]) -> EfuseResult<()> {
        self.read_window(Field::UserFuses, first, out)
            .map_err(|err| err | EfuseError::RD_USER_FUSES)
    }

    /// Burns `data` into PUF syndrome rows `first..first + data.len()`,
    /// numbered from 1.
    pub fn write_puf_as_user_fuses(
        &self,
        first: u32,
        data: &[u32],
        env_monitor_disable: bool,
    ) -> EfuseResult<()> {
        if data.iter().all(|word| *word == 0) {
            return Err(EfuseError::NOTHING_TO_PROGRAM);
        }
        self.run(env_monitor_disable, |session| {
            let window = session
                .validate_puf_fuses(first, data)
                .map_err(|err| err | EfuseError::BEFORE_PROGRAMMING)?;
            session
                .program_window(&window, data)
                .map_err(|err| err | EfuseError::WRITE_PUF_FUSES)?;
            session.reload_and_check()?;
            session.program_protection_rows()
        })
    }

    pub fn read_puf_as_user_fuses(&self, first: u32, out: &mut [u32]) -> EfuseResult<()> {
        self.read_window(Field::PufSyndrome, first, out)
            .map_err(|err| err | EfuseError::RD_PUF_FUSES)
    }

    fn read_window(&self, field: Field, first: u32, out: &mut [u32]) -> EfuseResult<()> {
        let ctrl = self.controller();
        let desc = ctrl.geometry().field_or_invalid(field)?;
        let window = RowWindow::within(desc, first, out.len())?;
        ctrl.read_cache(window.cache_offset, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EfuseConfig;
    use crate::control::{MiscCtrl, MiscCtrlBits};
    use crate::error::ErrorKind;
    use crate::geometry::{FieldGeometry, Versal};
    use crate::mock::{serial, MockEfuse};

    fn versal(mock: &MockEfuse) -> Efuse<'_, MockEfuse> {
        Efuse::new(mock, EfuseConfig::versal())
    }

    #[test]
    fn test_window_bounds() {
        let desc = Versal.field(Field::UserFuses).unwrap();
        let window = RowWindow::within(desc, 1, 63).unwrap();
        assert_eq!((window.start_row, window.count), (193, 63));
        assert!(window.at_end);
        let window = RowWindow::within(desc, 10, 2).unwrap();
        assert_eq!(window.start_row, 202);
        assert_eq!(window.cache_offset, 202 * 4);
        assert!(!window.at_end);

        for (first, count) in [(0, 1), (1, 0), (1, 64), (63, 2), (u32::MAX, 1)] {
            assert!(
                matches!(RowWindow::within(desc, first, count), Err(EfuseError::INVALID_PARAM)),
                "{} {}",
                first,
                count
            );
        }
        // column-ranged fields have no whole rows to hand out
        let net = crate::geometry::VersalNet
            .field(Field::RevocationIds)
            .unwrap();
        assert!(RowWindow::within(net, 1, 1).is_err());
    }

    #[test]
    fn test_user_fuses_round_trip() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        let efuse = versal(&mock);
        efuse.write_user_fuses(5, &[0x1234, 0x8000_0000], true).unwrap();
        assert_eq!(mock.row(0, 197), 0x1234);
        assert_eq!(mock.row(0, 198), 0x8000_0000);

        let mut out = [0u32; 3];
        efuse.read_user_fuses(4, &mut out).unwrap();
        assert_eq!(out, [0, 0x1234, 0x8000_0000]);

        // adding bits only pulses the new ones
        let pulses = mock.pulses();
        efuse.write_user_fuses(5, &[0x1236], true).unwrap();
        assert_eq!(mock.pulses(), pulses + 1);
        assert_eq!(mock.row(0, 197), 0x1236);
    }

    #[test]
    fn test_user_fuse_revert_refused() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        let efuse = versal(&mock);
        efuse.write_user_fuses(1, &[0xFF], true).unwrap();
        let before = mock.snapshot();
        let pulses = mock.pulses();
        let err = efuse.write_user_fuses(1, &[0x0F], true).unwrap_err();
        assert_eq!(
            err,
            EfuseError::BIT_CANT_REVERT
                | EfuseError::WRITE_USER_FUSES
                | EfuseError::BEFORE_PROGRAMMING
        );
        assert_eq!(mock.pulses(), pulses);
        assert!(mock.changed_rows(&before).is_empty());
    }

    #[test]
    fn test_user_fuses_behind_enabled_ppk_slots() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        let efuse = versal(&mock);
        // fuse 48 is row 240, the first row of PPK3
        efuse.write_user_fuses(48, &[1], true).unwrap();

        let mut misc = MiscCtrlBits::new(0);
        misc.modify(MiscCtrl::ADD_PPK_EN::SET);
        efuse.write_misc_control_bits(misc, true).unwrap();
        let err = efuse.write_user_fuses(47, &[1, 3], true).unwrap_err();
        assert!(err.contains(EfuseError::USER_FUSE_PGM_NOT_ALLOWED));
        assert_eq!(err.kind(), ErrorKind::FuseProtected);
        assert_eq!(mock.row(0, 240), 1);
        // rows below the slots stay usable
        efuse.write_user_fuses(47, &[1], true).unwrap();
    }

    #[test]
    fn test_user_fuses_per_variant() {
        let _guard = serial();
        let mock = MockEfuse::zynqmp();
        let efuse = Efuse::new(&mock, EfuseConfig::zynqmp());
        efuse.write_user_fuses(8, &[0xAB], true).unwrap();
        assert_eq!(mock.row(0, 15), 0xAB);
        assert!(matches!(
            efuse.write_user_fuses(9, &[1], true),
            Err(e) if e == EfuseError::INVALID_PARAM | EfuseError::BEFORE_PROGRAMMING
        ));

        let mock = MockEfuse::versal_net();
        let efuse = Efuse::new(&mock, EfuseConfig::versal_net());
        efuse.write_user_fuses(16, &[0x5], true).unwrap();
        assert_eq!(mock.row(0, 255), 0x5);
        let mut out = [0u32; 1];
        efuse.read_user_fuses(16, &mut out).unwrap();
        assert_eq!(out, [0x5]);
    }

    #[test]
    fn test_nothing_to_program() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        let efuse = versal(&mock);
        assert!(matches!(
            efuse.write_user_fuses(1, &[0, 0], true),
            Err(EfuseError::NOTHING_TO_PROGRAM)
        ));
        assert!(matches!(
            efuse.write_puf_as_user_fuses(1, &[], true),
            Err(EfuseError::NOTHING_TO_PROGRAM)
        ));
        assert_eq!(mock.unlock_attempts(), 0);
    }

    #[test]
    fn test_puf_rows_as_user_data() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        let efuse = versal(&mock);
        efuse.write_puf_as_user_fuses(1, &[0xDEAD_BEEF], true).unwrap();
        efuse.write_puf_as_user_fuses(127, &[0x0FFF_FFFF], true).unwrap();
        assert_eq!(mock.row(2, 129), 0xDEAD_BEEF);
        assert_eq!(mock.row(2, 255), 0x0FFF_FFFF);

        let mut out = [0u32; 2];
        efuse.read_puf_as_user_fuses(126, &mut out).unwrap();
        assert_eq!(out, [0, 0x0FFF_FFFF]);
    }

    #[test]
    fn test_puf_rows_refused() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        let efuse = versal(&mock);
        assert_eq!(
            efuse.write_puf_as_user_fuses(127, &[0x1000_0000], true),
            Err(EfuseError::INVALID_PARAM
                | EfuseError::WRITE_PUF_FUSES
                | EfuseError::BEFORE_PROGRAMMING)
        );

        mock.burn_row(0, 42, 1);
        mock.load_cache();
        assert_eq!(
            efuse.write_puf_as_user_fuses(3, &[1], true),
            Err(EfuseError::PUF_CHASH_ALREADY_PRGMD | EfuseError::BEFORE_PROGRAMMING)
        );

        mock.burn_row(0, 43, 1 << 16);
        mock.load_cache();
        let err = efuse.write_puf_as_user_fuses(3, &[1], true).unwrap_err();
        assert!(err.contains(EfuseError::PUF_SYN_ALREADY_PRGMD));
        assert_eq!(err.kind(), ErrorKind::FuseProtected);
        assert_eq!(mock.pulses(), 0);
    }

    #[test]
    fn test_puf_rows_after_dec_only() {
        let _guard = serial();
        let mock = MockEfuse::versal();
        mock.burn_row(0, 57, 0x1);
        mock.load_cache();
        let efuse = versal(&mock);
        assert_eq!(
            efuse.write_puf_as_user_fuses(3, &[1], true),
            Err(EfuseError::DEC_ONLY_ALREADY_PRGMD | EfuseError::BEFORE_PROGRAMMING)
        );
    }
}
