/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Runtime helpers shared by the boot-time drivers: console printing,
    hex formatting and static MMIO references.

--*/

#![no_std]

mod static_ref;
pub use static_ref::StaticRef;

use core::fmt::{self, Write};

/// Sink for console output, usually a UART or an emulator print register.
pub trait Printer {
    fn write_str(&mut self, s: &str);
}

static mut PRINTER: Option<&'static mut dyn Printer> = None;

/// Set the console printer.
///
/// SAFETY: the passed printer must not be used otherwise and no other
/// references to it may exist. Create a single instance, pass it in
/// immediately and never touch it again.
pub fn set_printer(printer: &'static mut dyn Printer) {
    unsafe {
        PRINTER = Some(printer);
    }
}

struct PrinterWriter;

impl Write for PrinterWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        #[allow(static_mut_refs)]
        if let Some(printer) = unsafe { PRINTER.as_mut() } {
            printer.write_str(s);
        }
        Ok(())
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    // Console errors are never fatal.
    let _ = PrinterWriter.write_fmt(args);
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ({
        $crate::_print(format_args!($($arg)*));
        $crate::print!("\n");
    });
}

/// Formats a word as `0x` followed by eight hex digits.
pub struct HexWord(pub u32);

impl fmt::Display for HexWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl fmt::Debug for HexWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Formats a byte slice as contiguous lowercase hex.
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::fmt::Write;
    use std::string::String;

    #[test]
    fn test_hex_word() {
        let mut s = String::new();
        write!(&mut s, "{}", HexWord(0xdf0d)).unwrap();
        assert_eq!(s, "0x0000df0d");
    }

    #[test]
    fn test_hex_bytes() {
        let mut s = String::new();
        write!(&mut s, "{}", HexBytes(&[0xde, 0xad, 0x01])).unwrap();
        assert_eq!(s, "dead01");
    }

    #[test]
    fn test_println_without_printer_is_noop() {
        crate::println!("[test] {}", HexWord(1));
    }
}
