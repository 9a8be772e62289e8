//! Boot and reset control
//!
//! Dual-bank parts can boot from either bank. The bank currently mapped at
//! the execution address is reported by a hardware flag; selecting the other
//! one is a persisted option-byte change that only takes effect after reset.

use crate::flash::{Bank, FlashError};

/// Boot/reset controller
pub trait BootControl {
    /// Bank currently mapped at the execution address
    fn active_bank(&self) -> Bank;

    /// Remove the write-protection areas of bank 2
    ///
    /// Bank 2 is the physical second bank, whichever bank is executing.
    /// Once the image runs from bank 1 after promotion, that is the
    /// persistence bank.
    fn clear_write_protection(&mut self) -> Result<(), FlashError>;

    /// Flip the persisted boot-bank selection
    ///
    /// Takes effect on the next reset. Some parts reload option bytes
    /// immediately, in which case this call does not return.
    fn toggle_boot_bank(&mut self) -> Result<(), FlashError>;

    /// Force a system reset
    ///
    /// On hardware this never returns. Simulated controllers record the
    /// request and return so the caller can be observed.
    fn system_reset(&mut self);
}
