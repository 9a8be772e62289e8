//! Bulk context store/restore
//!
//! Persists the LoRaWAN context (keys, frame counters, join state) in the
//! persistence bank. Unlike the page writer, a store erases every page it
//! touches without preserving their other bytes.
//!
//! A failed erase+program cycle is retried after a pause, up to the
//! configured number of attempts, then reported as `Exhausted` together
//! with the kind of the final failure.

use embedded_hal::delay::DelayNs;
use embedded_storage::nor_flash::{
    check_erase, check_read, check_write, ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash,
};
use lorashim_hal::{Bank, FlashControl};

use super::layout::{BANK_SIZE, DOUBLE_WORD, ERASED_BYTE, INACTIVE_BANK_BASE, PAGE_SIZE};
use super::{program_verified, with_unlocked};
use crate::config::RetryPolicy;
use crate::error::{StorageError, StoreFault};

/// Context store for one bank
#[derive(Debug, Clone, Copy)]
pub struct ContextStore {
    bank: Bank,
    base: u32,
    policy: RetryPolicy,
}

impl ContextStore {
    /// Store for the bank mapped at `INACTIVE_BANK_BASE`
    pub fn new(bank: Bank, policy: RetryPolicy) -> Self {
        Self {
            bank,
            base: INACTIVE_BANK_BASE,
            policy,
        }
    }

    /// Erase the pages covering `[address, address + data.len())` and write `data`
    ///
    /// `address` must be double-word aligned. A trailing partial double-word
    /// is padded with `0xFF`.
    pub fn store<F, D>(
        &self,
        flash: &mut F,
        delay: &mut D,
        address: u32,
        data: &[u8],
    ) -> Result<(), StorageError>
    where
        F: FlashControl,
        D: DelayNs,
    {
        self.check_range(address, data.len())?;
        if address as usize % DOUBLE_WORD != 0 {
            return Err(StorageError::Misaligned { address });
        }

        let attempts = self.policy.max_attempts.max(1);
        let mut last = StoreFault::Locked;
        for attempt in 1..=attempts {
            match self.try_store(flash, address, data) {
                Ok(()) => {
                    delay.delay_ms(self.policy.settle_ms);
                    return Ok(());
                }
                Err(err) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!(
                        "context store attempt {}/{} failed: {}",
                        attempt,
                        attempts,
                        err
                    );
                    last = match StoreFault::of(&err) {
                        Some(fault) => fault,
                        None => return Err(err),
                    };
                    if attempt < attempts {
                        delay.delay_ms(self.policy.delay_ms);
                    }
                }
            }
        }

        Err(StorageError::Exhausted { attempts, last })
    }

    /// Read `buf.len()` bytes back from `address`
    pub fn restore<F: FlashControl>(
        &self,
        flash: &F,
        address: u32,
        buf: &mut [u8],
    ) -> Result<(), StorageError> {
        self.check_range(address, buf.len())?;
        flash.read(address, buf);
        Ok(())
    }

    /// One erase+program cycle
    fn try_store<F: FlashControl>(
        &self,
        flash: &mut F,
        address: u32,
        data: &[u8],
    ) -> Result<(), StorageError> {
        with_unlocked(flash, |flash| {
            if !data.is_empty() {
                let first = self.page_of(address);
                let last = self.page_of(address + data.len() as u32 - 1);
                for page in first..=last {
                    flash
                        .erase_page(self.bank, page)
                        .map_err(|cause| StorageError::EraseFailed { page, cause })?;
                }
            }
            program_bytes(flash, address, data)
        })
    }

    fn page_of(&self, address: u32) -> u16 {
        ((address - self.base) / PAGE_SIZE as u32) as u16
    }

    fn check_range(&self, address: u32, len: usize) -> Result<(), StorageError> {
        let end = self.base + BANK_SIZE;
        if address < self.base || address as u64 + len as u64 > end as u64 {
            return Err(StorageError::OutOfRange { address });
        }
        Ok(())
    }

    /// View the bank as an `embedded-storage` NOR flash
    pub fn region<'a, F: FlashControl>(&self, flash: &'a mut F) -> ContextRegion<'a, F> {
        ContextRegion {
            flash,
            bank: self.bank,
            base: self.base,
        }
    }
}

/// Program `data` from an aligned `address`, stopping at the first failure
fn program_bytes<F: FlashControl>(
    flash: &mut F,
    address: u32,
    data: &[u8],
) -> Result<(), StorageError> {
    for (index, chunk) in data.chunks(DOUBLE_WORD).enumerate() {
        let mut word = [ERASED_BYTE; DOUBLE_WORD];
        word[..chunk.len()].copy_from_slice(chunk);
        let target = address + (index * DOUBLE_WORD) as u32;
        program_verified(flash, target, u64::from_le_bytes(word))?;
    }
    Ok(())
}

/// The persistence bank as an `embedded-storage` NOR flash
///
/// Offsets are relative to the start of the bank. Lets storage crates that
/// speak `NorFlash` (key-value maps, queues) run on the persistence bank.
pub struct ContextRegion<'a, F> {
    flash: &'a mut F,
    bank: Bank,
    base: u32,
}

fn kind_to_error(kind: NorFlashErrorKind, offset: u32) -> StorageError {
    match kind {
        NorFlashErrorKind::NotAligned => StorageError::Misaligned { address: offset },
        _ => StorageError::OutOfRange { address: offset },
    }
}

impl<F: FlashControl> ErrorType for ContextRegion<'_, F> {
    type Error = StorageError;
}

impl<F: FlashControl> ReadNorFlash for ContextRegion<'_, F> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(self, offset, bytes.len()).map_err(|kind| kind_to_error(kind, offset))?;
        self.flash.read(self.base + offset, bytes);
        Ok(())
    }

    fn capacity(&self) -> usize {
        BANK_SIZE as usize
    }
}

impl<F: FlashControl> NorFlash for ContextRegion<'_, F> {
    const WRITE_SIZE: usize = DOUBLE_WORD;
    const ERASE_SIZE: usize = PAGE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check_erase(self, from, to).map_err(|kind| kind_to_error(kind, from))?;
        let bank = self.bank;
        with_unlocked(&mut *self.flash, |flash| {
            for page in (from / PAGE_SIZE as u32)..(to / PAGE_SIZE as u32) {
                let page = page as u16;
                flash
                    .erase_page(bank, page)
                    .map_err(|cause| StorageError::EraseFailed { page, cause })?;
            }
            Ok(())
        })
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_write(self, offset, bytes.len()).map_err(|kind| kind_to_error(kind, offset))?;
        let address = self.base + offset;
        with_unlocked(&mut *self.flash, |flash| program_bytes(flash, address, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Fault, SimFlash};

    /// Delay that records how long it was asked to wait
    #[derive(Default)]
    struct RecordingDelay {
        total_ms: u32,
        calls: u32,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ms += ns / 1_000_000;
            self.calls += 1;
        }

        fn delay_ms(&mut self, ms: u32) {
            self.total_ms += ms;
            self.calls += 1;
        }
    }

    fn store() -> ContextStore {
        ContextStore::new(Bank::Bank2, RetryPolicy::default())
    }

    #[test]
    fn test_store_then_restore() {
        let mut flash = SimFlash::new();
        let mut delay = RecordingDelay::default();
        let context = [0x5Au8; 20];

        store()
            .store(&mut flash, &mut delay, INACTIVE_BANK_BASE, &context)
            .unwrap();

        let mut back = [0u8; 24];
        store()
            .restore(&flash, INACTIVE_BANK_BASE, &mut back)
            .unwrap();
        assert_eq!(&back[..20], &context);
        // Padding of the last double-word
        assert_eq!(&back[20..], &[ERASED_BYTE; 4]);
        // Settle pause only
        assert_eq!(delay.total_ms, 300);
        assert!(flash.is_locked());
    }

    #[test]
    fn test_store_overwrites_previous_context() {
        let mut flash = SimFlash::new();
        let mut delay = RecordingDelay::default();

        store()
            .store(&mut flash, &mut delay, INACTIVE_BANK_BASE, &[1; 16])
            .unwrap();
        store()
            .store(&mut flash, &mut delay, INACTIVE_BANK_BASE, &[2; 16])
            .unwrap();

        let mut back = [0u8; 16];
        store()
            .restore(&flash, INACTIVE_BANK_BASE, &mut back)
            .unwrap();
        assert_eq!(back, [2; 16]);
    }

    #[test]
    fn test_store_spanning_pages_erases_each_once() {
        let mut flash = SimFlash::new();
        let mut delay = RecordingDelay::default();
        let data = [0x33u8; PAGE_SIZE + 16];

        store()
            .store(&mut flash, &mut delay, INACTIVE_BANK_BASE, &data)
            .unwrap();

        assert_eq!(flash.erase_count(Bank::Bank2, 0), 1);
        assert_eq!(flash.erase_count(Bank::Bank2, 1), 1);
        assert_eq!(flash.erase_count(Bank::Bank2, 2), 0);
    }

    #[test]
    fn test_transient_failure_is_retried() {
        let mut flash = SimFlash::new();
        flash.inject_times(Fault::RejectAllPrograms, 2);
        let mut delay = RecordingDelay::default();

        store()
            .store(&mut flash, &mut delay, INACTIVE_BANK_BASE, &[7; 8])
            .unwrap();

        // Two retry pauses plus the settle pause
        assert_eq!(delay.total_ms, 900);
        assert_eq!(flash.read_double_word(INACTIVE_BANK_BASE), u64::from_le_bytes([7; 8]));
    }

    #[test]
    fn test_persistent_failure_exhausts() {
        let mut flash = SimFlash::new();
        flash.inject(Fault::RejectAllPrograms);
        let mut delay = RecordingDelay::default();
        let policy = RetryPolicy {
            max_attempts: 3,
            delay_ms: 10,
            settle_ms: 50,
        };

        let result = ContextStore::new(Bank::Bank2, policy).store(
            &mut flash,
            &mut delay,
            INACTIVE_BANK_BASE,
            &[7; 8],
        );

        assert_eq!(
            result,
            Err(StorageError::Exhausted {
                attempts: 3,
                last: StoreFault::ProgramFailed
            })
        );
        // No pause after the last attempt, no settle
        assert_eq!(delay.total_ms, 20);
        assert_eq!(flash.erase_count(Bank::Bank2, 0), 3);
        assert!(flash.is_locked());
    }

    #[test]
    fn test_exhausted_reports_last_failure_kind() {
        let policy = RetryPolicy {
            max_attempts: 2,
            delay_ms: 0,
            settle_ms: 0,
        };
        let context = ContextStore::new(Bank::Bank2, policy);
        let mut delay = RecordingDelay::default();

        let mut stuck = SimFlash::new();
        stuck.inject(Fault::RejectErase {
            bank: Bank::Bank2,
            page: 0,
        });
        let erase = context.store(&mut stuck, &mut delay, INACTIVE_BANK_BASE, &[7; 8]);

        let mut corrupt = SimFlash::new();
        corrupt.inject(Fault::CorruptProgram {
            address: INACTIVE_BANK_BASE,
        });
        let verify = context.store(&mut corrupt, &mut delay, INACTIVE_BANK_BASE, &[7; 8]);

        assert_eq!(
            erase,
            Err(StorageError::Exhausted {
                attempts: 2,
                last: StoreFault::EraseFailed
            })
        );
        assert_eq!(
            verify,
            Err(StorageError::Exhausted {
                attempts: 2,
                last: StoreFault::VerifyMismatch
            })
        );
        assert_ne!(erase, verify);
        assert_eq!(stuck.erase_count(Bank::Bank2, 0), 0);
        assert_eq!(corrupt.erase_count(Bank::Bank2, 0), 2);
        assert_eq!(stuck.program_count(), 0);
        assert_eq!(corrupt.program_count(), 2);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let mut flash = SimFlash::new();
        let mut delay = RecordingDelay::default();
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };

        ContextStore::new(Bank::Bank2, policy)
            .store(&mut flash, &mut delay, INACTIVE_BANK_BASE, &[1; 8])
            .unwrap();
        assert_eq!(flash.erase_count(Bank::Bank2, 0), 1);
    }

    #[test]
    fn test_rejects_bad_requests() {
        let mut flash = SimFlash::new();
        let mut delay = RecordingDelay::default();

        assert_eq!(
            store().store(&mut flash, &mut delay, INACTIVE_BANK_BASE + 4, &[1; 8]),
            Err(StorageError::Misaligned {
                address: INACTIVE_BANK_BASE + 4
            })
        );
        assert_eq!(
            store().store(&mut flash, &mut delay, 0x0800_0000, &[1; 8]),
            Err(StorageError::OutOfRange {
                address: 0x0800_0000
            })
        );
        let last = INACTIVE_BANK_BASE + BANK_SIZE - 8;
        assert_eq!(
            store().store(&mut flash, &mut delay, last, &[1; 16]),
            Err(StorageError::OutOfRange { address: last })
        );
        assert_eq!(delay.calls, 0);
    }

    #[test]
    fn test_nor_flash_region() {
        let mut flash = SimFlash::new();
        let context = store();
        let mut region = context.region(&mut flash);

        region.erase(0, PAGE_SIZE as u32).unwrap();
        region.write(16, &[0xAB; 8]).unwrap();

        let mut back = [0u8; 8];
        region.read(16, &mut back).unwrap();
        assert_eq!(back, [0xAB; 8]);
        assert_eq!(region.capacity(), BANK_SIZE as usize);

        assert_eq!(
            region.write(3, &[0; 8]),
            Err(StorageError::Misaligned { address: 3 })
        );
        assert_eq!(
            region.erase(0, 100),
            Err(StorageError::Misaligned { address: 0 })
        );
        assert_eq!(
            region.read(BANK_SIZE, &mut back),
            Err(StorageError::OutOfRange { address: BANK_SIZE })
        );
    }
}
