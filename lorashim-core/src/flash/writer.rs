//! Flash page writer
//!
//! Writes up to one page of bytes anywhere in the persistence bank while
//! preserving the rest of the page(s) it touches:
//!
//! ```text
//!   page N                         page N+1
//! ┌──────────────┬───────────────┐┌──────────┬────────────────────┐
//! │  preserved   │  head of buf  ││ tail buf │     preserved      │
//! └──────────────┴───────────────┘└──────────┴────────────────────┘
//!                ^offset          ^PAGE_SIZE ^end - PAGE_SIZE
//! ```
//!
//! Each touched page goes through stage, erase, merge, program. Every
//! double-word is read back after programming. If the first page fails,
//! the second page is left untouched.

use lorashim_hal::{Bank, FlashControl};

use super::layout::{page_address, PageSpan, StagingPage, DOUBLE_WORD, INACTIVE_BANK_BASE};
use super::{program_verified, with_unlocked, WordFault};
use crate::error::StorageError;

/// Outcome of a successful write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WriteReport {
    /// First page rewritten
    pub first_page: u16,
    /// Number of pages erased and reprogrammed (0, 1 or 2)
    pub pages: u8,
}

/// Failure tally for one page
#[derive(Default)]
struct Tally {
    first: Option<u32>,
    count: u16,
}

impl Tally {
    fn record(&mut self, address: u32) {
        self.first.get_or_insert(address);
        self.count = self.count.saturating_add(1);
    }
}

/// Erase-modify-write page writer
///
/// Owns its staging page, so concurrent writers (one per flash region or
/// context) cannot corrupt each other's scratch data.
pub struct PageWriter {
    bank: Bank,
    base: u32,
    staging: StagingPage,
}

impl PageWriter {
    /// Writer for the bank mapped at `INACTIVE_BANK_BASE`
    ///
    /// # Arguments
    /// - `bank`: Physical bank currently mapped at that address
    pub const fn new(bank: Bank) -> Self {
        Self::with_base(bank, INACTIVE_BANK_BASE)
    }

    /// Writer for `bank` mapped at an arbitrary base address
    pub const fn with_base(bank: Bank, base: u32) -> Self {
        Self {
            bank,
            base,
            staging: StagingPage::new(),
        }
    }

    /// Physical bank this writer erases
    pub fn bank(&self) -> Bank {
        self.bank
    }

    /// Base address of the bank this writer targets
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Write `buffer` at `address`, preserving the other bytes of the page(s)
    ///
    /// `buffer` may be up to one page long and may straddle a page boundary.
    /// The flash control register stays unlocked for the whole sequence.
    pub fn write_without_erase<F: FlashControl>(
        &mut self,
        flash: &mut F,
        buffer: &[u8],
        address: u32,
    ) -> Result<WriteReport, StorageError> {
        let span = PageSpan::locate(self.base, address, buffer.len())?;
        if buffer.is_empty() {
            return Ok(WriteReport {
                first_page: span.page,
                pages: 0,
            });
        }

        let (head, tail) = buffer.split_at(span.head_len());

        with_unlocked(flash, |flash| {
            self.rewrite_page(flash, span.page, span.offset, head)?;
            if !span.crosses_page() {
                return Ok(WriteReport {
                    first_page: span.page,
                    pages: 1,
                });
            }

            self.rewrite_page(flash, span.page + 1, 0, tail)?;
            Ok(WriteReport {
                first_page: span.page,
                pages: 2,
            })
        })
    }

    /// Stage, erase, merge and program one page
    fn rewrite_page<F: FlashControl>(
        &mut self,
        flash: &mut F,
        page: u16,
        offset: usize,
        data: &[u8],
    ) -> Result<(), StorageError> {
        let address = page_address(self.base, page);

        // Pre-image must be staged before the erase
        self.staging.load(flash, address);
        flash
            .erase_page(self.bank, page)
            .map_err(|cause| StorageError::EraseFailed { page, cause })?;

        self.staging.merge(offset, data);
        self.program_staging(flash, page, address)
    }

    /// Program the staging page at `address`, verifying every double-word
    ///
    /// Keeps going after a failure so the rest of the pre-image is restored,
    /// then reports the first failing address and the failure count.
    #[cfg_attr(not(feature = "defmt"), allow(unused_variables))]
    fn program_staging<F: FlashControl>(
        &self,
        flash: &mut F,
        page: u16,
        address: u32,
    ) -> Result<(), StorageError> {
        let mut rejected = Tally::default();
        let mut mismatched = Tally::default();

        for (index, word) in self.staging.double_words().enumerate() {
            let target = address + (index * DOUBLE_WORD) as u32;
            match program_verified(flash, target, word) {
                Ok(()) => {}
                Err(WordFault::Rejected { address }) => rejected.record(address),
                Err(WordFault::Mismatch { address }) => mismatched.record(address),
            }
        }

        if let Some(first) = rejected.first {
            #[cfg(feature = "defmt")]
            defmt::error!(
                "page {}: {} double-word programs rejected (first at {:#x})",
                page,
                rejected.count,
                first
            );
            return Err(StorageError::ProgramFailed {
                address: first,
                count: rejected.count,
            });
        }

        if let Some(first) = mismatched.first {
            #[cfg(feature = "defmt")]
            defmt::error!(
                "page {}: {} double-words failed read-back (first at {:#x})",
                page,
                mismatched.count,
                first
            );
            return Err(StorageError::VerifyMismatch {
                address: first,
                count: mismatched.count,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::layout::{ERASED_BYTE, PAGE_SIZE};
    use crate::sim::{Fault, SimFlash};

    const PAGE1: u32 = 0x0808_0800;
    const PAGE2: u32 = 0x0808_1000;

    fn patterned() -> SimFlash {
        let mut flash = SimFlash::new();
        flash.fill_page(Bank::Bank2, 1, |i| i as u8);
        flash.fill_page(Bank::Bank2, 2, |i| (i as u8).wrapping_mul(3));
        flash
    }

    fn read_page(flash: &SimFlash, address: u32) -> [u8; PAGE_SIZE] {
        let mut page = [0u8; PAGE_SIZE];
        flash.read(address, &mut page);
        page
    }

    #[test]
    fn test_single_page_preserves_neighbours() {
        let mut flash = patterned();
        let before = read_page(&flash, PAGE1);
        let mut writer = PageWriter::new(Bank::Bank2);

        let data = [0xA5u8; 10];
        let report = writer.write_without_erase(&mut flash, &data, PAGE1).unwrap();

        assert_eq!(report, WriteReport { first_page: 1, pages: 1 });
        let after = read_page(&flash, PAGE1);
        assert_eq!(&after[..10], &data);
        assert_eq!(&after[10..], &before[10..]);
        assert_eq!(flash.erase_count(Bank::Bank2, 1), 1);
        assert_eq!(flash.erase_count(Bank::Bank2, 2), 0);
        assert!(flash.is_locked());
    }

    #[test]
    fn test_two_page_split() {
        let mut flash = patterned();
        let page1_before = read_page(&flash, PAGE1);
        let page2_before = read_page(&flash, PAGE2);
        let mut writer = PageWriter::new(Bank::Bank2);

        let data = [0x11, 0x22, 0x33, 0x44];
        let report = writer
            .write_without_erase(&mut flash, &data, 0x0808_0FFE)
            .unwrap();

        assert_eq!(report.pages, 2);
        let page1 = read_page(&flash, PAGE1);
        let page2 = read_page(&flash, PAGE2);
        assert_eq!(&page1[..2046], &page1_before[..2046]);
        assert_eq!(&page1[2046..], &[0x11, 0x22]);
        assert_eq!(&page2[..2], &[0x33, 0x44]);
        assert_eq!(&page2[2..], &page2_before[2..]);
    }

    #[test]
    fn test_empty_buffer_is_noop() {
        let mut flash = patterned();
        let mut writer = PageWriter::new(Bank::Bank2);

        let report = writer.write_without_erase(&mut flash, &[], PAGE1).unwrap();
        assert_eq!(report.pages, 0);
        assert_eq!(flash.erase_count(Bank::Bank2, 1), 0);
    }

    #[test]
    fn test_size_too_large_touches_nothing() {
        let mut flash = patterned();
        let mut writer = PageWriter::new(Bank::Bank2);
        let data = [0u8; PAGE_SIZE + 1];

        assert_eq!(
            writer.write_without_erase(&mut flash, &data, PAGE1),
            Err(StorageError::SizeTooLarge { size: PAGE_SIZE + 1 })
        );
        assert_eq!(flash.erase_count(Bank::Bank2, 1), 0);
    }

    #[test]
    fn test_program_failure_reported_and_second_page_untouched() {
        let mut flash = patterned();
        flash.inject(Fault::RejectProgram { address: PAGE1 + 16 });
        let page2_before = read_page(&flash, PAGE2);
        let mut writer = PageWriter::new(Bank::Bank2);

        let result = writer.write_without_erase(&mut flash, &[1, 2, 3, 4], 0x0808_0FFE);

        assert_eq!(
            result,
            Err(StorageError::ProgramFailed {
                address: PAGE1 + 16,
                count: 1
            })
        );
        assert_eq!(flash.erase_count(Bank::Bank2, 2), 0);
        assert_eq!(read_page(&flash, PAGE2), page2_before);
        assert!(flash.is_locked());
    }

    #[test]
    fn test_verify_mismatch_is_distinct() {
        let mut flash = patterned();
        flash.inject(Fault::CorruptProgram { address: PAGE1 + 8 });
        let mut writer = PageWriter::new(Bank::Bank2);

        let result = writer.write_without_erase(&mut flash, &[9; 4], PAGE1);

        assert_eq!(
            result,
            Err(StorageError::VerifyMismatch {
                address: PAGE1 + 8,
                count: 1
            })
        );
    }

    #[test]
    fn test_erase_failure() {
        let mut flash = patterned();
        flash.inject(Fault::RejectErase { bank: Bank::Bank2, page: 1 });
        let mut writer = PageWriter::new(Bank::Bank2);

        let result = writer.write_without_erase(&mut flash, &[9; 4], PAGE1);

        assert!(matches!(result, Err(StorageError::EraseFailed { page: 1, .. })));
        // Nothing erased, so the page still holds its old contents
        assert_eq!(read_page(&flash, PAGE1)[0], 0);
        assert!(flash.is_locked());
    }

    #[test]
    fn test_unlock_failure() {
        let mut flash = patterned();
        flash.inject(Fault::RejectUnlock);
        let mut writer = PageWriter::new(Bank::Bank2);

        assert_eq!(
            writer.write_without_erase(&mut flash, &[1], PAGE1),
            Err(StorageError::Locked)
        );
    }

    #[test]
    fn test_erased_flash_round_trip() {
        let mut flash = SimFlash::new();
        let mut writer = PageWriter::new(Bank::Bank2);

        writer
            .write_without_erase(&mut flash, b"lorawan", PAGE1 + 100)
            .unwrap();

        let page = read_page(&flash, PAGE1);
        assert_eq!(&page[100..107], b"lorawan");
        assert!(page[..100].iter().all(|b| *b == ERASED_BYTE));
        assert!(page[107..].iter().all(|b| *b == ERASED_BYTE));
    }
}
