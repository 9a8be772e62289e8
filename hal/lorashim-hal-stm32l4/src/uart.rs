//! Debug UART transmitter

use embassy_stm32::mode::Blocking;
use embassy_stm32::usart::{Error as UsartError, UartTx};

/// Error from UART operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartBusError {
    /// Framing error
    Framing,
    /// Noise error
    Noise,
    /// Overrun error
    Overrun,
    /// Parity error
    Parity,
    /// Other error
    Other,
}

impl From<UsartError> for UartBusError {
    fn from(e: UsartError) -> Self {
        match e {
            UsartError::Framing => UartBusError::Framing,
            UsartError::Noise => UartBusError::Noise,
            UsartError::Overrun => UartBusError::Overrun,
            UsartError::Parity => UartBusError::Parity,
            _ => UartBusError::Other,
        }
    }
}

/// Blocking transmit-only UART for debug traces
pub struct Stm32l4Uart<'d> {
    tx: UartTx<'d, Blocking>,
}

impl<'d> Stm32l4Uart<'d> {
    pub fn new(tx: UartTx<'d, Blocking>) -> Self {
        Self { tx }
    }
}

impl lorashim_hal::UartTx for Stm32l4Uart<'_> {
    type Error = UartBusError;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.tx.blocking_write(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.tx.blocking_flush()?;
        Ok(())
    }
}
