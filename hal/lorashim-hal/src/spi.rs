//! SPI master abstraction for the radio link

/// SPI bus master
///
/// The radio driver talks to the transceiver one byte at a time, so the
/// byte transfer is the primitive the shim exposes. Chip select is a
/// plain GPIO driven by the stack.
pub trait SpiBus {
    type Error;

    /// Full-duplex transfer; `data` is sent and overwritten with the
    /// bytes clocked in
    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error>;

    /// Write one byte and return the byte clocked in at the same time
    fn transfer_byte(&mut self, value: u8) -> Result<u8, Self::Error> {
        let mut buf = [value];
        self.transfer_in_place(&mut buf)?;
        Ok(buf[0])
    }
}
