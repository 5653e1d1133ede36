// Licensed under the Apache-2.0 license

use crate::error::EfuseResult;

/// Temperature and voltage monitor consulted before a programming session.
///
/// Implementations return `TEMP_OUT_OF_RANGE` or `VOLT_OUT_OF_RANGE` when the
/// die is outside the window in which fuses can be burnt reliably.
pub trait Sysmon {
    fn check_temperature_and_voltage(&self) -> EfuseResult<()>;
}
