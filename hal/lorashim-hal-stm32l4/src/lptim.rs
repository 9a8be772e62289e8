//! LPTIM1 one-shot timeout
//!
//! Clocked from the LSE through a /16 prescaler (2048 Hz), so one tick is
//! about 0.49 ms and the 16-bit compare covers 32 s.

use embassy_stm32::pac::{LPTIM1, RCC};
use lorashim_hal::LowPowerTimer;

/// `CCIPR.LPTIM1SEL` field and its LSE selection
const CCIPR_LPTIM1SEL_MASK: u32 = 0b11 << 18;
const CCIPR_LPTIM1SEL_LSE: u32 = 0b11 << 18;

/// `CFGR.PRESC` = /16
const CFGR_PRESC_DIV16: u32 = 0b100 << 9;

/// Every `ICR` clear bit
const ICR_ALL: u32 = 0x7F;

pub struct Stm32l4Lptim {
    _private: (),
}

impl Stm32l4Lptim {
    /// Enable the LPTIM1 clock, select the LSE and set the prescaler
    ///
    /// The LSE must already be running (embassy RCC config).
    pub fn new() -> Self {
        RCC.apb1enr1().modify(|w| w.set_lptim1en(true));
        RCC.ccipr()
            .modify(|w| w.0 = (w.0 & !CCIPR_LPTIM1SEL_MASK) | CCIPR_LPTIM1SEL_LSE);

        // CFGR is only writable while the timer is disabled
        LPTIM1.cr().write(|w| w.set_enable(false));
        LPTIM1.cfgr().write(|w| {
            w.0 = CFGR_PRESC_DIV16;
            w.set_timout(true);
        });
        Self { _private: () }
    }
}

/// Disable the timer and clear its flags, from the `LPTIM1` handler
pub fn acknowledge() {
    LPTIM1.cr().write(|w| w.set_enable(false));
    LPTIM1.icr().write(|w| w.0 = ICR_ALL);
}

impl Default for Stm32l4Lptim {
    fn default() -> Self {
        Self::new()
    }
}

impl LowPowerTimer for Stm32l4Lptim {
    fn start_timeout(&mut self, ticks: u16) {
        acknowledge();
        // IER is only writable while the timer is disabled
        LPTIM1.ier().write(|w| w.set_cmpmie(true));

        LPTIM1.cr().write(|w| w.set_enable(true));
        // ARR and CMP need the timer enabled
        LPTIM1.arr().write(|w| w.set_arr(0xFFFF));
        LPTIM1.cmp().write(|w| w.set_cmp(ticks));
        LPTIM1.cr().modify(|w| w.set_cntstrt(true));
    }

    fn stop(&mut self) {
        acknowledge();
    }
}
