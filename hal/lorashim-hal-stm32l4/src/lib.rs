//! STM32L4-specific HAL for the lorashim MCU shim
//!
//! Implements the `lorashim-hal` traits for the dual-bank STM32L476/L496
//! parts. Clocks, pin modes, SPI and USART setup come from embassy-stm32;
//! the flash controller, option bytes, RTC wake-up timer and LPTIM1 are
//! driven through the `embassy_stm32::pac` register blocks since embassy
//! does not cover dual-bank page programming or the wake-up timer.
//!
//! # Features
//!
//! - `stm32l476rg` / `stm32l476vg` / `stm32l496zg` - Chip selection
//! - `defmt` - Enable debug formatting support
//!
//! # Usage
//!
//! Build a [`lorashim_core::Peripherals`] of the types below and hand it to
//! [`lorashim_core::Mcu::new`] with [`Stm32l4`] as the platform.

#![no_std]

pub mod boot;
pub mod flash;
pub mod gpio;
pub mod lptim;
pub mod power;
pub mod rtc;
pub mod spi;
pub mod uart;
pub mod watchdog;

use core::marker::PhantomData;

pub use boot::Stm32l4Boot;
pub use flash::Stm32l4Flash;
pub use gpio::Stm32l4Gpio;
pub use lptim::Stm32l4Lptim;
pub use power::Stm32l4Power;
pub use rtc::Stm32l4Rtc;
pub use spi::Stm32l4Spi;
pub use uart::Stm32l4Uart;
pub use watchdog::Stm32l4Watchdog;

/// Busy-wait until `done` holds, giving up after `spins` polls
pub(crate) fn wait_until(spins: u32, mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..spins {
        if done() {
            return true;
        }
    }
    done()
}

/// Platform binding for [`lorashim_core::Mcu`]
pub struct Stm32l4<'d> {
    _lifetime: PhantomData<&'d ()>,
}

impl<'d> lorashim_core::Platform for Stm32l4<'d> {
    type Flash = Stm32l4Flash<'d>;
    type Boot = Stm32l4Boot;
    type Spi = Stm32l4Spi<'d>;
    type Uart = Stm32l4Uart<'d>;
    type Rtc = Stm32l4Rtc;
    type Timer = Stm32l4Lptim;
    type Watchdog = Stm32l4Watchdog<'d>;
    type Gpio = Stm32l4Gpio;
    type Power = Stm32l4Power;
    type Delay = embassy_time::Delay;
}
