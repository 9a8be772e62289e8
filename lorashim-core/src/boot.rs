//! Dual-bank boot promotion
//!
//! A firmware update lands in bank 2 and the option bytes are flipped so the
//! MCU boots from it. On that first boot the running image copies itself
//! into bank 1, selects bank 1 again and resets, so the device always ends
//! up executing from bank 1 with bank 2 free for context persistence.
//!
//! ```text
//!  boot ──► clear WRP ──► bank 1 active? ──yes──► Primary
//!                               │ no
//!                               ▼
//!               check image ─► erase other bank ─► copy ─► toggle BFB2 ─► reset
//! ```
//!
//! Any failure before the toggle leaves the bank selection alone, so the
//! next boot retries from the same side.

use lorashim_hal::{Bank, BootControl, FlashControl};

use crate::config::BootConfig;
use crate::error::BootError;
use crate::flash::layout::{ACTIVE_BANK_BASE, BANK_SIZE, DOUBLE_WORD, INACTIVE_BANK_BASE};
use crate::flash::{program_verified, WordFault};

/// Top byte of a stack pointer that lies in SRAM1
const SRAM_SP_TAG: u32 = 0x20;

/// Result of the boot check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootOutcome {
    /// Running from bank 1, nothing to do
    Primary,
    /// Image copied and bank selection flipped; a reset has been requested
    ///
    /// Only observable with controllers whose reset returns.
    Promoted {
        /// Bank the next boot will execute from
        target: Bank,
        /// Bytes copied
        copied: u32,
    },
}

/// Bank-switch boot check
#[derive(Debug, Clone, Copy)]
pub struct BankSwitch {
    config: BootConfig,
}

impl BankSwitch {
    pub const fn new(config: BootConfig) -> Self {
        Self { config }
    }

    /// Run the check; call once, early in startup
    ///
    /// # Arguments
    /// - `flash`: Flash controller, used for the erase and the copy
    /// - `boot`: Boot controller, used for the bank flag, BFB2 and the reset
    pub fn run<F, B>(&self, flash: &mut F, boot: &mut B) -> Result<BootOutcome, BootError>
    where
        F: FlashControl,
        B: BootControl,
    {
        if let Err(_err) = boot.clear_write_protection() {
            #[cfg(feature = "defmt")]
            defmt::warn!("boot: clearing write protection failed: {}", _err);
        }

        let active = boot.active_bank();
        if active == Bank::Bank1 {
            return Ok(BootOutcome::Primary);
        }

        #[cfg(feature = "defmt")]
        defmt::info!("boot: running from {}, promoting image", active);

        if self.config.check_image && !image_looks_valid(flash) {
            return Err(BootError::InvalidImage);
        }

        let target = active.other();
        let copied = self.copy_image(flash, target)?;
        boot.toggle_boot_bank().map_err(BootError::BankSwitchFailed)?;

        #[cfg(feature = "defmt")]
        defmt::info!("boot: {} bytes copied to {}, resetting", copied, target);

        boot.system_reset();
        Ok(BootOutcome::Promoted { target, copied })
    }

    /// Mass-erase `target` and copy the running image into it
    fn copy_image<F: FlashControl>(&self, flash: &mut F, target: Bank) -> Result<u32, BootError> {
        let len = self.image_len();

        flash.unlock().map_err(|_| BootError::Locked)?;
        let result = flash
            .erase_bank(target)
            .map_err(BootError::EraseFailed)
            .and_then(|()| copy_double_words(flash, len));
        flash.lock();

        result.map(|()| len)
    }

    /// Image length rounded up to whole double-words and clamped to one bank
    fn image_len(&self) -> u32 {
        let step = DOUBLE_WORD as u32;
        self.config.image_len.min(BANK_SIZE).div_ceil(step) * step
    }
}

fn copy_double_words<F: FlashControl>(flash: &mut F, len: u32) -> Result<(), BootError> {
    for offset in (0..len).step_by(DOUBLE_WORD) {
        let word = flash.read_double_word(ACTIVE_BANK_BASE + offset);
        program_verified(flash, INACTIVE_BANK_BASE + offset, word).map_err(|fault| match fault {
            WordFault::Rejected { address } => BootError::CopyFailed { address },
            WordFault::Mismatch { address } => BootError::VerifyMismatch { address },
        })?;
    }
    Ok(())
}

/// Whether the vector table at the execution address holds an SRAM stack pointer
fn image_looks_valid<F: FlashControl>(flash: &F) -> bool {
    let mut sp = [0u8; 4];
    flash.read(ACTIVE_BANK_BASE, &mut sp);
    u32::from_le_bytes(sp) >> 24 == SRAM_SP_TAG
}
