// Licensed under the Apache-2.0 license

use core::hint::black_box;

use crate::bit::VerifyPolicy;
use crate::control::{bit_error, table_mask};
use crate::error::{EfuseError, EfuseResult};
use crate::geometry::{FieldDescriptor, Page, COLS_PER_ROW, ROWS_PER_PAGE};
use crate::regs::RegisterIo;
use crate::session::ControllerSession;

impl<R: RegisterIo> ControllerSession<'_, R> {
    /// Burns every set bit of `data[i]` into row `start_row + i` of `page`.
    pub fn program_rows(
        &self,
        page: u32,
        start_row: u32,
        row_count: u32,
        data: &[u32],
    ) -> EfuseResult<()> {
        let end_row = start_row.checked_add(row_count);
        if row_count == 0
            || data.len() < row_count as usize
            || page >= self.geometry().pages()
            || end_row.map_or(true, |end| end > ROWS_PER_PAGE)
        {
            return Err(EfuseError::INVALID_PARAM);
        }
        let page = Page::from_index(page)?;

        let mut visited = 0u32;
        for (row, word) in (start_row..start_row + row_count).zip(data) {
            let policy = VerifyPolicy::for_row(self.geometry(), page, row);
            for col in 0..COLS_PER_ROW {
                if word & (1 << col) != 0 {
                    self.program_and_verify_bit(page, row, col, policy)?;
                }
            }
            visited += 1;
        }
        if black_box(visited) != row_count {
            return Err(EfuseError::GLITCH_DETECTED);
        }
        Ok(())
    }

    /// Burns the set bits of a field value, following its segments.
    pub fn program_field(&self, desc: &FieldDescriptor, data: &[u32]) -> EfuseResult<()> {
        if data.len() < desc.words {
            return Err(EfuseError::INVALID_PARAM);
        }

        let mut bit = 0u32;
        for seg in desc.segments {
            if seg.is_full_row() && bit % 32 == 0 {
                let words = data
                    .get((bit / 32) as usize..)
                    .ok_or(EfuseError::INVALID_PARAM)?;
                self.program_rows(seg.page.into(), seg.start_row, seg.row_count, words)?;
                bit += seg.row_count * COLS_PER_ROW;
                continue;
            }

            let mut visited = 0u32;
            for row in seg.start_row..seg.start_row + seg.row_count {
                let policy = VerifyPolicy::for_row(self.geometry(), seg.page, row);
                for col in seg.col_start..=seg.col_end {
                    let word = data
                        .get((bit / 32) as usize)
                        .ok_or(EfuseError::INVALID_PARAM)?;
                    if word & (1 << (bit % 32)) != 0 {
                        self.program_and_verify_bit(seg.page, row, col, policy)?;
                    }
                    bit += 1;
                }
                visited += 1;
            }
            if black_box(visited) != seg.row_count {
                return Err(EfuseError::GLITCH_DETECTED);
            }
        }
        Ok(())
    }

    /// Burns the set bits of a one-word control field. A failing bit reports
    /// the error `table` names for it.
    pub fn program_word_bits(
        &self,
        desc: &FieldDescriptor,
        bits: u32,
        table: &[(u32, EfuseError)],
    ) -> EfuseResult<()> {
        if bits & !table_mask(table) != 0 {
            return Err(EfuseError::INVALID_PARAM);
        }
        for bit in 0..COLS_PER_ROW {
            if bits & (1 << bit) == 0 {
                continue;
            }
            let (page, row, col) = desc.locate(bit).ok_or(EfuseError::INVALID_PARAM)?;
            let policy = VerifyPolicy::for_row(self.geometry(), page, row);
            if let Err(err) = self.program_and_verify_bit(page, row, col, policy) {
                return Err(bit_error(table, bit).map_or(err, |field| err | field));
            }
        }
        Ok(())
    }
}
