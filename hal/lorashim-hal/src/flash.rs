//! Flash control abstractions
//!
//! The primitives a dual-bank NOR flash controller exposes: unlocking the
//! control register, erasing a page or a whole bank, and programming one
//! double-word at a time. Everything above this (merge, verify, retry) lives
//! in `lorashim-core`.

/// Physical flash bank
///
/// The controller addresses banks physically; which one is mapped at the
/// execution address depends on the boot-time bank mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bank {
    Bank1,
    Bank2,
}

impl Bank {
    /// The opposite bank
    pub fn other(self) -> Self {
        match self {
            Bank::Bank1 => Bank::Bank2,
            Bank::Bank2 => Bank::Bank1,
        }
    }
}

/// Errors reported by the flash controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Control register is still locked (unlock sequence rejected)
    Locked,
    /// Target area is write protected
    WriteProtected,
    /// Programming sequence, size or alignment error
    Sequence,
    /// Programmed over a non-erased double-word
    NotErased,
    /// Operation did not complete in time
    Timeout,
    /// Option byte programming failed
    OptionBytes,
    /// Page index outside the bank
    InvalidPage,
}

/// Flash control register interface
///
/// All mutating operations require a prior successful [`unlock`]; callers
/// hold the unlocked state for their whole erase/program sequence and call
/// [`lock`] on every exit path.
///
/// [`unlock`]: FlashControl::unlock
/// [`lock`]: FlashControl::lock
pub trait FlashControl {
    /// Unlock the flash control register
    fn unlock(&mut self) -> Result<(), FlashError>;

    /// Lock the flash control register
    fn lock(&mut self);

    /// Erase one page of a bank
    ///
    /// # Arguments
    /// * `bank` - Physical bank holding the page
    /// * `page` - Page index inside the bank
    fn erase_page(&mut self, bank: Bank, page: u16) -> Result<(), FlashError>;

    /// Erase a whole bank
    fn erase_bank(&mut self, bank: Bank) -> Result<(), FlashError>;

    /// Program one 64-bit double-word at an 8-byte aligned address
    ///
    /// Does not verify; read the value back with [`read_double_word`].
    ///
    /// [`read_double_word`]: FlashControl::read_double_word
    fn program_double_word(&mut self, address: u32, value: u64) -> Result<(), FlashError>;

    /// Read raw bytes from the memory-mapped flash
    fn read(&self, address: u32, buf: &mut [u8]);

    /// Read a little-endian double-word back for verification
    fn read_double_word(&self, address: u32) -> u64 {
        let mut word = [0u8; 8];
        self.read(address, &mut word);
        u64::from_le_bytes(word)
    }
}
