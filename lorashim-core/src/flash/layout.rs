//! Flash geometry for the 1 MB dual-bank STM32L4 parts
//!
//! Each bank holds 256 pages of 2 KB. The bank the MCU executes from is
//! always mapped at `ACTIVE_BANK_BASE`; the other one follows at
//! `INACTIVE_BANK_BASE` and is where the LoRaWAN context is persisted.

use lorashim_hal::FlashControl;

use crate::error::StorageError;

/// Minimum erasable unit
pub const PAGE_SIZE: usize = 2048;

/// Minimum programmable unit
pub const DOUBLE_WORD: usize = 8;

/// Double-words per page
pub const DOUBLE_WORDS_PER_PAGE: usize = PAGE_SIZE / DOUBLE_WORD;

/// Pages per bank
pub const PAGES_PER_BANK: u16 = 256;

/// Bank size in bytes (512 KB)
pub const BANK_SIZE: u32 = PAGE_SIZE as u32 * PAGES_PER_BANK as u32;

/// Execution address of the active bank
pub const ACTIVE_BANK_BASE: u32 = 0x0800_0000;

/// Address of the bank that is not executing
pub const INACTIVE_BANK_BASE: u32 = 0x0808_0000;

/// End of the flash address space
pub const FLASH_END: u32 = INACTIVE_BANK_BASE + BANK_SIZE;

/// Value of an erased byte
pub const ERASED_BYTE: u8 = 0xFF;

/// Value of an erased double-word
pub const ERASED_DOUBLE_WORD: u64 = u64::MAX;

/// Start address of `page` in the bank mapped at `base`
pub fn page_address(base: u32, page: u16) -> u32 {
    base + page as u32 * PAGE_SIZE as u32
}

/// Location of a write request inside a bank
///
/// `offset` and `end` are relative to the start of `page`; an `end` past
/// `PAGE_SIZE` means the request continues at the start of `page + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PageSpan {
    /// Page holding the first byte
    pub page: u16,
    /// Byte offset of the first byte within `page`
    pub offset: usize,
    /// `offset + size`
    pub end: usize,
}

impl PageSpan {
    /// Locate `size` bytes at `address` in the bank mapped at `base`
    ///
    /// Fails with `SizeTooLarge` for requests longer than a page and with
    /// `OutOfRange` when any byte would fall outside the bank.
    pub fn locate(base: u32, address: u32, size: usize) -> Result<Self, StorageError> {
        if size > PAGE_SIZE {
            return Err(StorageError::SizeTooLarge { size });
        }
        let relative = address
            .checked_sub(base)
            .filter(|rel| *rel < BANK_SIZE)
            .ok_or(StorageError::OutOfRange { address })?;

        let page = (relative / PAGE_SIZE as u32) as u16;
        let offset = (relative - page as u32 * PAGE_SIZE as u32) as usize;
        let span = Self {
            page,
            offset,
            end: offset + size,
        };

        if span.last_page() >= PAGES_PER_BANK {
            return Err(StorageError::OutOfRange { address });
        }
        Ok(span)
    }

    /// Whether the request spills into `page + 1`
    pub fn crosses_page(&self) -> bool {
        self.end > PAGE_SIZE
    }

    /// Last page touched by the request
    pub fn last_page(&self) -> u16 {
        if self.crosses_page() {
            self.page + 1
        } else {
            self.page
        }
    }

    /// Bytes that land in the first page
    pub fn head_len(&self) -> usize {
        self.end.min(PAGE_SIZE) - self.offset
    }

    /// Bytes that land in `page + 1`
    pub fn tail_len(&self) -> usize {
        self.end.saturating_sub(PAGE_SIZE)
    }
}

/// One page of scratch memory for erase-modify-write
///
/// Holds a page's pre-image merged with the incoming bytes. Each writer owns
/// its own staging page, so two writers never share scratch state; contents
/// are not meaningful between calls.
#[derive(Clone)]
pub struct StagingPage {
    bytes: [u8; PAGE_SIZE],
}

impl Default for StagingPage {
    fn default() -> Self {
        Self::new()
    }
}

impl StagingPage {
    /// Create an erased staging page
    pub const fn new() -> Self {
        Self {
            bytes: [ERASED_BYTE; PAGE_SIZE],
        }
    }

    /// Copy the full page at `address` from flash
    pub fn load<F: FlashControl>(&mut self, flash: &F, address: u32) {
        flash.read(address, &mut self.bytes);
    }

    /// Overwrite `data.len()` bytes starting at `offset`
    ///
    /// `offset + data.len()` must not exceed `PAGE_SIZE`.
    pub fn merge(&mut self, offset: usize, data: &[u8]) {
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
    }

    /// The page as little-endian double-words, in address order
    pub fn double_words(&self) -> impl Iterator<Item = u64> + '_ {
        self.bytes.chunks_exact(DOUBLE_WORD).map(|chunk| {
            let mut word = [0u8; DOUBLE_WORD];
            word.copy_from_slice(chunk);
            u64::from_le_bytes(word)
        })
    }

    /// Raw page bytes
    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.bytes
    }
}
