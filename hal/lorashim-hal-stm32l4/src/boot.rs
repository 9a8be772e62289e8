//! Bank mode flag, option bytes and reset

use embassy_stm32::pac::{FLASH, RCC, SYSCFG};
use lorashim_hal::{Bank, BootControl, FlashError};

use crate::flash::{clear_status, has_error, unlock_control};
use crate::wait_until;

const OPTION_SPINS: u32 = 8_000_000;

const OPT_KEY1: u32 = 0x0819_2A3B;
const OPT_KEY2: u32 = 0x4C5D_6E7F;

/// WRPxyR start offset [7:0] and end offset [23:16]
const WRP_AREA_MASK: u32 = 0x00FF_00FF;
/// Start above end: the area covers no page
const WRP_AREA_DISABLED: u32 = 0x0000_00FF;

fn unlock_options() -> bool {
    if FLASH.cr().read().optlock() {
        FLASH.optkeyr().write_value(OPT_KEY1);
        FLASH.optkeyr().write_value(OPT_KEY2);
    }
    !FLASH.cr().read().optlock()
}

/// Boot controller
///
/// Option byte changes go through the flash controller, so this type
/// should only be used while no flash operation is running.
pub struct Stm32l4Boot {
    _private: (),
}

impl Stm32l4Boot {
    pub fn new() -> Self {
        // FB_MODE reads as zero while SYSCFG is unclocked
        RCC.apb2enr().modify(|w| w.set_syscfgen(true));
        Self { _private: () }
    }

    /// Run `op` with the flash and option-byte registers unlocked
    fn with_option_bytes(&mut self, op: impl FnOnce()) -> Result<(), FlashError> {
        if !unlock_control() || !unlock_options() {
            return Err(FlashError::Locked);
        }

        op();

        clear_status();
        FLASH.cr().modify(|w| w.set_optstrt(true));
        let done = wait_until(OPTION_SPINS, || !FLASH.sr().read().bsy());
        let status = FLASH.sr().read();
        FLASH.cr().modify(|w| {
            w.set_optlock(true);
            w.set_lock(true);
        });

        if !done {
            Err(FlashError::Timeout)
        } else if has_error(status) {
            Err(FlashError::OptionBytes)
        } else {
            Ok(())
        }
    }
}

impl Default for Stm32l4Boot {
    fn default() -> Self {
        Self::new()
    }
}

impl BootControl for Stm32l4Boot {
    fn active_bank(&self) -> Bank {
        if SYSCFG.memrmp().read().fb_mode() {
            Bank::Bank2
        } else {
            Bank::Bank1
        }
    }

    /// Disable both write-protection areas of bank 2
    fn clear_write_protection(&mut self) -> Result<(), FlashError> {
        let area_a = FLASH.wrp2ar().read().0 & WRP_AREA_MASK;
        let area_b = FLASH.wrp2br().read().0 & WRP_AREA_MASK;
        if area_a == WRP_AREA_DISABLED && area_b == WRP_AREA_DISABLED {
            return Ok(());
        }

        self.with_option_bytes(|| {
            FLASH
                .wrp2ar()
                .modify(|w| w.0 = (w.0 & !WRP_AREA_MASK) | WRP_AREA_DISABLED);
            FLASH
                .wrp2br()
                .modify(|w| w.0 = (w.0 & !WRP_AREA_MASK) | WRP_AREA_DISABLED);
        })
    }

    fn toggle_boot_bank(&mut self) -> Result<(), FlashError> {
        self.with_option_bytes(|| FLASH.optr().modify(|w| w.set_bfb2(!w.bfb2())))?;

        #[cfg(feature = "defmt")]
        defmt::info!("boot: BFB2 toggled, reloading option bytes");

        // Reloading the option bytes resets the MCU; unlock again for it
        if !unlock_control() || !unlock_options() {
            return Err(FlashError::Locked);
        }
        FLASH.cr().modify(|w| w.set_obl_launch(true));
        Ok(())
    }

    fn system_reset(&mut self) {
        cortex_m::peripheral::SCB::sys_reset();
    }
}
