//! Debug serial output
//!
//! The shim never receives on its UART; it only carries trace lines, so
//! the abstraction is transmit-only.

/// Transmit half of a UART
pub trait UartTx {
    type Error;

    /// Queue `data` for transmission, returning once the last byte has
    /// been accepted by the peripheral
    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Wait until the shift register has drained
    fn flush(&mut self) -> Result<(), Self::Error>;
}
