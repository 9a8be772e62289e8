//! SPI master for the radio transceiver

use embassy_stm32::mode::Blocking;
use embassy_stm32::spi::{Error as SpiError, Spi};
use lorashim_hal::SpiBus;

/// Error from SPI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiBusError {
    /// Frame format error
    Framing,
    /// CRC mismatch
    Crc,
    /// Mode fault
    ModeFault,
    /// Receive overrun
    Overrun,
    /// Other error
    Other,
}

impl From<SpiError> for SpiBusError {
    fn from(e: SpiError) -> Self {
        match e {
            SpiError::Framing => SpiBusError::Framing,
            SpiError::Crc => SpiBusError::Crc,
            SpiError::ModeFault => SpiBusError::ModeFault,
            SpiError::Overrun => SpiBusError::Overrun,
            #[allow(unreachable_patterns)]
            _ => SpiBusError::Other,
        }
    }
}

/// Blocking SPI wrapper
///
/// Chip select stays with the radio driver; it toggles NSS through
/// `Mcu::set_pin` around each register access.
pub struct Stm32l4Spi<'d> {
    spi: Spi<'d, Blocking>,
}

impl<'d> Stm32l4Spi<'d> {
    pub fn new(spi: Spi<'d, Blocking>) -> Self {
        Self { spi }
    }
}

impl SpiBus for Stm32l4Spi<'_> {
    type Error = SpiBusError;

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error> {
        self.spi.blocking_transfer_in_place(data)?;
        Ok(())
    }
}
