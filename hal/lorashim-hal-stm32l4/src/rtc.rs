//! RTC calendar readout and wake-up timer
//!
//! The RTC kernel clock (LSE) is selected and enabled by embassy's RCC
//! init; the reset prescalers 127/255 give the 1 Hz calendar. This driver
//! reads the shadow registers and owns the wake-up timer.

use embassy_stm32::interrupt::{self, InterruptExt};
use embassy_stm32::pac::rtc::regs::{Dr, Tr};
use embassy_stm32::pac::rtc::vals::Wucksel;
use embassy_stm32::pac::{EXTI, RTC};
use lorashim_hal::{RtcClock, RtcDateTime, RtcError, Wakeup};

use crate::wait_until;

/// Polls of `WUTWF` after the wake-up timer is disabled
const WUTWF_SPINS: u32 = 100_000;

/// Largest value the wake-up counter accepts, plus one
const WAKEUP_MAX: u32 = 0x1_0000;

/// EXTI line of the RTC wake-up event
const EXTI_LINE_WAKEUP: usize = 20;

/// `WUCKSEL` for the 1 Hz `ck_spre` clock
const WUCKSEL_CK_SPRE: u8 = 0b100;

fn bcd(tens: u8, units: u8) -> u8 {
    tens * 10 + units
}

/// Decode the calendar shadow registers
fn decode(tr: Tr, dr: Dr, sub_seconds: u16) -> RtcDateTime {
    RtcDateTime {
        year: bcd(dr.yt(), dr.yu()),
        month: bcd(dr.mt() as u8, dr.mu()),
        day: bcd(dr.dt(), dr.du()),
        hours: bcd(tr.ht(), tr.hu()),
        minutes: bcd(tr.mnt(), tr.mnu()),
        seconds: bcd(tr.st(), tr.su()),
        sub_seconds,
    }
}

pub struct Stm32l4Rtc {
    _private: (),
}

impl Stm32l4Rtc {
    /// Route the wake-up event to its EXTI line (rising edge, unmasked)
    pub fn new() -> Self {
        EXTI.imr(0).modify(|w| w.set_line(EXTI_LINE_WAKEUP, true));
        EXTI.rtsr(0).modify(|w| w.set_line(EXTI_LINE_WAKEUP, true));
        Self { _private: () }
    }

    fn unprotect() {
        RTC.wpr().write(|w| w.set_key(0xCA));
        RTC.wpr().write(|w| w.set_key(0x53));
    }

    fn protect() {
        RTC.wpr().write(|w| w.set_key(0xFF));
    }
}

/// Clear the wake-up flags, from the `RTC_WKUP` handler
pub fn clear_wakeup() {
    RTC.isr().modify(|w| w.set_wutf(false));
    EXTI.pr(0).write(|w| w.set_line(EXTI_LINE_WAKEUP, true));
}

impl Default for Stm32l4Rtc {
    fn default() -> Self {
        Self::new()
    }
}

impl RtcClock for Stm32l4Rtc {
    fn now(&mut self) -> Result<RtcDateTime, RtcError> {
        // The calendar runs from 2000-01-01 after a backup-domain reset, so
        // only shadow synchronization is checked, not INITS
        if !RTC.isr().read().rsf() {
            return Err(RtcError::NotReady);
        }

        // Reading SSR locks the shadows until DR is read
        let ssr = RTC.ssr().read().ss();
        let tr = RTC.tr().read();
        let dr = RTC.dr().read();
        Ok(decode(tr, dr, ssr))
    }

    fn arm_wakeup(&mut self, wakeup: Wakeup) -> Result<(), RtcError> {
        let (count, clock) = match wakeup {
            Wakeup::Ticks(n) => (n, Wucksel::DIV16),
            Wakeup::Seconds(n) => (n, Wucksel::from_bits(WUCKSEL_CK_SPRE)),
        };
        if count == 0 || count > WAKEUP_MAX {
            return Err(RtcError::WakeupBusy);
        }

        Self::unprotect();
        RTC.cr().modify(|w| {
            w.set_wute(false);
            w.set_wutie(false);
        });
        if !wait_until(WUTWF_SPINS, || RTC.isr().read().wutwf()) {
            Self::protect();
            return Err(RtcError::WakeupBusy);
        }

        // The timer fires after WUT + 1 cycles
        RTC.wutr().write(|w| w.set_wut((count - 1) as u16));
        RTC.cr().modify(|w| w.set_wucksel(clock));
        clear_wakeup();
        // A wake-up left pending from the previous period would end the
        // next sleep at once
        interrupt::RTC_WKUP.unpend();
        RTC.cr().modify(|w| {
            w.set_wute(true);
            w.set_wutie(true);
        });
        Self::protect();
        Ok(())
    }
}
