//! Debug trace over the UART
//!
//! The LoRaWAN stack prints human-readable traces through the MCU shim.
//! Lines are formatted into a fixed buffer and sent with a blocking write.
//! Output that does not fit is cut off and flagged.

use core::fmt::{self, Write};

use heapless::String;
use lorashim_hal::UartTx;

/// Longest formatted line (bytes)
pub const TRACE_LINE_LEN: usize = 200;

/// Appended when a line was cut off
const TRUNCATED_MARK: &str = "~\n";

/// Line buffer that keeps whatever fits
struct Line {
    text: String<TRACE_LINE_LEN>,
    truncated: bool,
}

impl Write for Line {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            if self.text.push(ch).is_err() {
                self.truncated = true;
                break;
            }
        }
        // Keep formatting going; the rest is dropped
        Ok(())
    }
}

/// UART trace switch and formatter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugTrace {
    enabled: bool,
}

impl DebugTrace {
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Format one trace and send it on `uart`
    ///
    /// Returns the number of bytes written, 0 when tracing is off.
    pub fn print<U: UartTx>(
        &self,
        uart: &mut U,
        args: fmt::Arguments<'_>,
    ) -> Result<usize, U::Error> {
        if !self.enabled {
            return Ok(0);
        }

        let mut line = Line {
            text: String::new(),
            truncated: false,
        };
        // Line::write_str never fails
        let _ = line.write_fmt(args);

        uart.write_blocking(line.text.as_bytes())?;
        let mut sent = line.text.len();
        if line.truncated {
            uart.write_blocking(TRUNCATED_MARK.as_bytes())?;
            sent += TRUNCATED_MARK.len();
        }
        uart.flush()?;
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    #[derive(Default)]
    struct CaptureUart {
        bytes: Vec<u8, 512>,
        flushes: u32,
    }

    impl UartTx for CaptureUart {
        type Error = ();

        fn write_blocking(&mut self, data: &[u8]) -> Result<(), ()> {
            self.bytes.extend_from_slice(data).map_err(|_| ())
        }

        fn flush(&mut self) -> Result<(), ()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_disabled_prints_nothing() {
        let mut uart = CaptureUart::default();
        let trace = DebugTrace::new(false);
        assert_eq!(trace.print(&mut uart, format_args!("fcnt={}", 7)), Ok(0));
        assert!(uart.bytes.is_empty());
    }

    #[test]
    fn test_formats_line() {
        let mut uart = CaptureUart::default();
        let trace = DebugTrace::new(true);
        let sent = trace
            .print(&mut uart, format_args!("fcnt={} dr={}\n", 7, 5))
            .unwrap();

        assert_eq!(uart.bytes.as_slice(), b"fcnt=7 dr=5\n");
        assert_eq!(sent, 12);
        assert_eq!(uart.flushes, 1);
    }

    #[test]
    fn test_long_line_is_truncated() {
        let mut uart = CaptureUart::default();
        let trace = DebugTrace::new(true);
        let long = [b'x'; 300];
        let text = core::str::from_utf8(&long).unwrap();

        let sent = trace.print(&mut uart, format_args!("{}", text)).unwrap();

        assert_eq!(sent, TRACE_LINE_LEN + TRUNCATED_MARK.len());
        assert!(uart.bytes.ends_with(b"x~\n"));
    }
}
