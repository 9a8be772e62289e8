//! Independent watchdog

use embassy_stm32::peripherals::IWDG;
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_stm32::Peri;
use lorashim_hal::Watchdog;

/// Watchdog period
///
/// Sleeps are chunked at 30 s with a release after each chunk, so the
/// period has to be longer than that.
pub const WATCHDOG_TIMEOUT_US: u32 = 32_000_000;

pub struct Stm32l4Watchdog<'d> {
    iwdg: IndependentWatchdog<'d, IWDG>,
}

impl<'d> Stm32l4Watchdog<'d> {
    pub fn new(iwdg: Peri<'d, IWDG>) -> Self {
        Self {
            iwdg: IndependentWatchdog::new(iwdg, WATCHDOG_TIMEOUT_US),
        }
    }
}

impl Watchdog for Stm32l4Watchdog<'_> {
    fn start(&mut self) {
        self.iwdg.unleash();
    }

    fn release(&mut self) {
        self.iwdg.pet();
    }
}
