//! Dual-bank flash controller
//!
//! STM32L476/L496 parts carry 1 MB of flash as two 512 KB banks of 256
//! pages. Pages are erased per physical bank (`BKER`), programming is one
//! 64-bit double-word at a time through the memory-mapped array.

use core::ptr::{read_volatile, write_volatile};

use embassy_stm32::pac::flash::regs::Sr;
use embassy_stm32::pac::FLASH;
use embassy_stm32::peripherals;
use embassy_stm32::Peri;
use lorashim_hal::{Bank, FlashControl, FlashError};

use crate::wait_until;

/// Polls of `SR.BSY` before an operation is declared stuck
///
/// Mass erase of one bank is the longest operation (about 22 ms).
const BUSY_SPINS: u32 = 8_000_000;

const PAGES_PER_BANK: u16 = 256;

const KEY1: u32 = 0x4567_0123;
const KEY2: u32 = 0xCDEF_89AB;

/// Write the `KEYR` sequence if the control register is locked
///
/// Returns `false` when `CR.LOCK` is still set afterwards; a wrong key
/// sequence locks the controller until reset.
pub(crate) fn unlock_control() -> bool {
    if FLASH.cr().read().lock() {
        FLASH.keyr().write_value(KEY1);
        FLASH.keyr().write_value(KEY2);
    }
    !FLASH.cr().read().lock()
}

/// Any error flag raised
pub(crate) fn has_error(sr: Sr) -> bool {
    sr.operr()
        || sr.progerr()
        || sr.wrperr()
        || sr.pgaerr()
        || sr.sizerr()
        || sr.pgserr()
        || sr.miserr()
        || sr.fasterr()
        || sr.rderr()
        || sr.optverr()
}

/// Clear `EOP` and the error flags
pub(crate) fn clear_status() {
    // Writing back what was read clears every write-1-to-clear flag
    FLASH.sr().modify(|_| {});
}

/// Map the `SR` error flags to a `FlashError`
fn status_to_result(sr: Sr) -> Result<(), FlashError> {
    if sr.wrperr() {
        Err(FlashError::WriteProtected)
    } else if sr.progerr() {
        Err(FlashError::NotErased)
    } else if sr.optverr() {
        Err(FlashError::OptionBytes)
    } else if has_error(sr) {
        Err(FlashError::Sequence)
    } else {
        Ok(())
    }
}

/// Flash controller driven through its registers
///
/// Owns the embassy `FLASH` peripheral so nothing else in the firmware can
/// drive the controller at the same time.
pub struct Stm32l4Flash<'d> {
    _flash: Peri<'d, peripherals::FLASH>,
}

impl<'d> Stm32l4Flash<'d> {
    pub fn new(flash: Peri<'d, peripherals::FLASH>) -> Self {
        Self { _flash: flash }
    }

    /// Wait for the controller, then translate the error flags
    fn finish(&mut self) -> Result<(), FlashError> {
        if !wait_until(BUSY_SPINS, || !FLASH.sr().read().bsy()) {
            return Err(FlashError::Timeout);
        }
        let status = FLASH.sr().read();
        clear_status();
        status_to_result(status)
    }

    fn prepare(&mut self) -> Result<(), FlashError> {
        if FLASH.cr().read().lock() {
            return Err(FlashError::Locked);
        }
        if !wait_until(BUSY_SPINS, || !FLASH.sr().read().bsy()) {
            return Err(FlashError::Timeout);
        }
        clear_status();
        Ok(())
    }
}

impl FlashControl for Stm32l4Flash<'_> {
    fn unlock(&mut self) -> Result<(), FlashError> {
        if unlock_control() {
            Ok(())
        } else {
            Err(FlashError::Locked)
        }
    }

    fn lock(&mut self) {
        FLASH.cr().modify(|w| w.set_lock(true));
    }

    fn erase_page(&mut self, bank: Bank, page: u16) -> Result<(), FlashError> {
        if page >= PAGES_PER_BANK {
            return Err(FlashError::InvalidPage);
        }
        self.prepare()?;

        FLASH.cr().modify(|w| {
            w.set_per(true);
            w.set_pnb(page as u8);
            w.set_bker(bank == Bank::Bank2);
        });
        FLASH.cr().modify(|w| w.set_start(true));
        let result = self.finish();
        FLASH.cr().modify(|w| {
            w.set_per(false);
            w.set_pnb(0);
            w.set_bker(false);
        });
        result
    }

    fn erase_bank(&mut self, bank: Bank) -> Result<(), FlashError> {
        self.prepare()?;

        FLASH.cr().modify(|w| match bank {
            Bank::Bank1 => w.set_mer1(true),
            Bank::Bank2 => w.set_mer2(true),
        });
        FLASH.cr().modify(|w| w.set_start(true));
        let result = self.finish();
        FLASH.cr().modify(|w| {
            w.set_mer1(false);
            w.set_mer2(false);
        });
        result
    }

    fn program_double_word(&mut self, address: u32, value: u64) -> Result<(), FlashError> {
        if address % 8 != 0 {
            return Err(FlashError::Sequence);
        }
        self.prepare()?;

        FLASH.cr().modify(|w| w.set_pg(true));
        write_array_word(address, value as u32);
        write_array_word(address + 4, (value >> 32) as u32);
        let result = self.finish();
        FLASH.cr().modify(|w| w.set_pg(false));

        #[cfg(feature = "defmt")]
        if let Err(e) = result {
            defmt::trace!("flash: program at {:#x} failed: {}", address, e);
        }
        result
    }

    fn read(&self, address: u32, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            // SAFETY: callers pass addresses inside the flash array, which
            // is always mapped and readable
            *byte = unsafe { read_volatile((address as usize + i) as *const u8) };
        }
    }
}

/// Store one word into the flash array while `PG` is set
fn write_array_word(address: u32, value: u32) {
    // SAFETY: the address is word aligned and inside the flash array; the
    // controller turns the store into a program operation
    unsafe { write_volatile(address as *mut u32, value) }
}
