// Licensed under the Apache-2.0 license

use crate::controller::Controller;
use crate::error::{EfuseError, EfuseResult};
use crate::regs::RegisterIo;

impl<R: RegisterIo> Controller<'_, R> {
    /// Bits of `requested` not yet burnt, given the field cached at
    /// `cache_offset`.
    pub fn compute_programmable_bits<const N: usize>(
        &self,
        requested: &[u32; N],
        cache_offset: u32,
    ) -> EfuseResult<[u32; N]> {
        let mut bits = [0u32; N];
        self.compute_programmable_words(requested, cache_offset, &mut bits)?;
        Ok(bits)
    }

    /// Slice form of [`compute_programmable_bits`](Self::compute_programmable_bits)
    /// for runs whose length is only known at run time. `out` must be as
    /// long as `requested`.
    pub fn compute_programmable_words(
        &self,
        requested: &[u32],
        cache_offset: u32,
        out: &mut [u32],
    ) -> EfuseResult<()> {
        self.check_cache_error()?;
        Self::check_cache_range(cache_offset, requested.len())?;
        if out.len() != requested.len() {
            return Err(EfuseError::INVALID_PARAM);
        }

        for (i, (out, req)) in out.iter_mut().zip(requested).enumerate() {
            let cached = self.read_cache_raw(cache_offset + (i as u32) * 4)?;
            *out = !cached & req;
        }
        Ok(())
    }
}
