//! Error types for flash persistence, boot promotion and the MCU facade

use embedded_storage::nor_flash::{NorFlashError, NorFlashErrorKind};
use lorashim_hal::{FlashError, RtcError};

use crate::pins::InvalidPin;
use crate::time::TimeError;

/// Errors from the page writer and the context store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Request longer than one page
    SizeTooLarge { size: usize },
    /// Request does not lie inside the persistence bank
    OutOfRange { address: u32 },
    /// Bulk store address is not double-word aligned
    Misaligned { address: u32 },
    /// Flash control register could not be unlocked
    Locked,
    /// Page erase rejected by the controller
    EraseFailed { page: u16, cause: FlashError },
    /// Controller rejected one or more double-word programs
    ///
    /// `address` is the first failing double-word, `count` the number of
    /// failures on that page.
    ProgramFailed { address: u32, count: u16 },
    /// Programming was accepted but the read-back differs
    VerifyMismatch { address: u32, count: u16 },
    /// Every attempt of a retried store failed; `last` is why the final one did
    Exhausted { attempts: u8, last: StoreFault },
    /// Operation has no meaning on this MCU
    Unsupported,
}

/// Kind of failure behind one attempt of a retried store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreFault {
    Locked,
    EraseFailed,
    ProgramFailed,
    VerifyMismatch,
}

impl StoreFault {
    /// Failure kind of a store attempt error, `None` for request errors
    pub fn of(err: &StorageError) -> Option<Self> {
        match err {
            StorageError::Locked => Some(StoreFault::Locked),
            StorageError::EraseFailed { .. } => Some(StoreFault::EraseFailed),
            StorageError::ProgramFailed { .. } => Some(StoreFault::ProgramFailed),
            StorageError::VerifyMismatch { .. } => Some(StoreFault::VerifyMismatch),
            StorageError::Exhausted { last, .. } => Some(*last),
            _ => None,
        }
    }
}

impl NorFlashError for StorageError {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            StorageError::OutOfRange { .. } | StorageError::SizeTooLarge { .. } => {
                NorFlashErrorKind::OutOfBounds
            }
            StorageError::Misaligned { .. } => NorFlashErrorKind::NotAligned,
            _ => NorFlashErrorKind::Other,
        }
    }
}

/// Errors from the bank-switch boot check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootError {
    /// Running image has no valid initial stack pointer
    InvalidImage,
    /// Flash control register could not be unlocked
    Locked,
    /// Mass erase of the target bank failed
    EraseFailed(FlashError),
    /// Copy failed at the given destination address
    CopyFailed { address: u32 },
    /// Copied double-word does not read back
    VerifyMismatch { address: u32 },
    /// Bank-select option byte could not be changed
    BankSwitchFailed(FlashError),
}

/// Errors from facade operations that touch more than one peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum McuError {
    Storage(StorageError),
    Boot(BootError),
    Rtc(RtcError),
    Time(TimeError),
    Pin(InvalidPin),
}

impl From<StorageError> for McuError {
    fn from(e: StorageError) -> Self {
        McuError::Storage(e)
    }
}

impl From<BootError> for McuError {
    fn from(e: BootError) -> Self {
        McuError::Boot(e)
    }
}

impl From<RtcError> for McuError {
    fn from(e: RtcError) -> Self {
        McuError::Rtc(e)
    }
}

impl From<TimeError> for McuError {
    fn from(e: TimeError) -> Self {
        McuError::Time(e)
    }
}

impl From<InvalidPin> for McuError {
    fn from(e: InvalidPin) -> Self {
        McuError::Pin(e)
    }
}
