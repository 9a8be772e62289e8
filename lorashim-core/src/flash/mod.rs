//! Flash persistence
//!
//! - [`layout`] - Page geometry and address decoding
//! - [`writer`] - Erase-modify-write of up to one page anywhere in the bank
//! - [`context`] - Bulk store/restore with a bounded retry policy

pub mod context;
pub mod layout;
pub mod writer;

pub use context::{ContextRegion, ContextStore};
pub use layout::{PageSpan, StagingPage, DOUBLE_WORD, PAGE_SIZE};
pub use writer::{PageWriter, WriteReport};

use lorashim_hal::FlashControl;

use crate::error::StorageError;

/// Run `op` with the flash control register unlocked
///
/// The register is locked again on every exit path, so a failed erase or
/// program never leaves the controller open.
pub(crate) fn with_unlocked<F, T>(
    flash: &mut F,
    op: impl FnOnce(&mut F) -> Result<T, StorageError>,
) -> Result<T, StorageError>
where
    F: FlashControl,
{
    flash.unlock().map_err(|_| StorageError::Locked)?;
    let result = op(flash);
    flash.lock();
    result
}

/// Why a single verified double-word program failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WordFault {
    /// Controller rejected the program
    Rejected { address: u32 },
    /// Read-back differs from the programmed value
    Mismatch { address: u32 },
}

impl From<WordFault> for StorageError {
    fn from(fault: WordFault) -> Self {
        match fault {
            WordFault::Rejected { address } => StorageError::ProgramFailed { address, count: 1 },
            WordFault::Mismatch { address } => StorageError::VerifyMismatch { address, count: 1 },
        }
    }
}

/// Program one double-word and read it back
pub(crate) fn program_verified<F: FlashControl>(
    flash: &mut F,
    address: u32,
    value: u64,
) -> Result<(), WordFault> {
    flash
        .program_double_word(address, value)
        .map_err(|_| WordFault::Rejected { address })?;
    if flash.read_double_word(address) != value {
        return Err(WordFault::Mismatch { address });
    }
    Ok(())
}
