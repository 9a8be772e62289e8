//! GPIO port abstractions
//!
//! The LoRaWAN stack names pins by a linear index; `lorashim-core` decodes
//! that index into a port and bit, and chip HALs only need to drive a
//! port by bit mask.

/// GPIO port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Port {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    E = 4,
    F = 5,
    G = 6,
}

impl Port {
    /// Port number (A = 0)
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Port-level digital I/O
///
/// Implementations handle the register writes for the specific chip.
pub trait PortIo {
    /// Drive the pins selected by `mask` on `port`
    fn write(&mut self, port: Port, mask: u16, high: bool);

    /// Read the input level of the pins selected by `mask`
    ///
    /// Returns true if any selected pin reads high.
    fn read(&self, port: Port, mask: u16) -> bool;

    /// Clear the pending external-interrupt flag for the given EXTI lines
    fn acknowledge_edge(&mut self, line_mask: u16);
}
