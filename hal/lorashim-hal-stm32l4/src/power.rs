//! Sleep entry

use lorashim_hal::PowerControl;

/// Core sleep until the next interrupt
#[derive(Default)]
pub struct Stm32l4Power;

impl PowerControl for Stm32l4Power {
    fn sleep(&mut self) {
        cortex_m::asm::dsb();
        cortex_m::asm::wfi();
    }
}
