//! Timer tick and RTC calendar conversions
//!
//! LPTIM1 and the RTC wake-up timer both count a 32.768 kHz LSE divided by
//! 16, so one millisecond is 2.048 ticks. The LoRaWAN timing budget is
//! built around the integer approximation `ms * 2 + (6 * ms) >> 7`, which
//! runs about 0.05 % short.

use lorashim_hal::{RtcDateTime, Wakeup};

/// Shortest LoRaWAN timer delay (ms)
pub const MIN_TIMER_MS: u32 = 1;

/// Longest LoRaWAN timer delay (ms)
pub const MAX_TIMER_MS: u32 = 16_000;

/// Largest RTC wake-up counter value (16-bit auto-reload + 1)
pub const MAX_WAKEUP_PERIOD: u32 = 0x1_0000;

/// Longest millisecond wake-up that fits the counter (65 500 ticks)
pub const MAX_WAKEUP_MS: u32 = 32_000;

/// RTC synchronous prescaler; `sub_seconds` counts down from this
pub const RTC_SYNC_PREDIV: u32 = 255;

/// Days from 1970-01-01 to 2000-01-01
const EPOCH_2000_DAYS: i64 = 10_957;

const SECONDS_PER_DAY: u32 = 86_400;

/// Requested duration cannot be programmed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeError {
    /// Timer delay outside 1 ms to 16 s
    TimerRange { ms: u32 },
    /// Wake-up period does not fit the 16-bit counter
    WakeupRange,
}

/// Milliseconds to LSE/16 ticks, without range checks
pub const fn ms_to_ticks(ms: u32) -> u64 {
    let ms = ms as u64;
    ms * 2 + ((6 * ms) >> 7)
}

/// LPTIM1 compare value for a LoRaWAN timer delay
pub fn lptim_ticks(ms: u32) -> Result<u16, TimeError> {
    if !(MIN_TIMER_MS..=MAX_TIMER_MS).contains(&ms) {
        return Err(TimeError::TimerRange { ms });
    }
    // 16 s is 32 750 ticks
    Ok(ms_to_ticks(ms) as u16)
}

/// RTC wake-up request for a millisecond alarm
pub fn wakeup_ms(ms: u32) -> Result<Wakeup, TimeError> {
    let ticks = ms_to_ticks(ms);
    if ticks == 0 || ticks > MAX_WAKEUP_PERIOD as u64 {
        return Err(TimeError::WakeupRange);
    }
    Ok(Wakeup::Ticks(ticks as u32))
}

/// RTC wake-up request for a whole-second alarm
pub fn wakeup_s(seconds: u32) -> Result<Wakeup, TimeError> {
    if seconds == 0 || seconds > MAX_WAKEUP_PERIOD {
        return Err(TimeError::WakeupRange);
    }
    Ok(Wakeup::Seconds(seconds))
}

/// Days since 1970-01-01 of a proleptic Gregorian date
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let year_of_era = year - era * 400;
    let month = month as i64;
    let day_of_year = (153 * (month + if month > 2 { -3 } else { 9 }) + 2) / 5 + day as i64 - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}

/// Seconds since the Unix epoch
pub fn unix_seconds(now: &RtcDateTime) -> u32 {
    let days = days_from_civil(2000 + now.year as i64, now.month as u32, now.day as u32);
    // The RTC calendar starts in 2000, so `days` is never before the epoch
    let days = days.max(EPOCH_2000_DAYS) as u64;
    let seconds = days * SECONDS_PER_DAY as u64
        + now.hours as u64 * 3600
        + now.minutes as u64 * 60
        + now.seconds as u64;
    seconds.min(u32::MAX as u64) as u32
}

/// Milliseconds since the Unix epoch
///
/// The sub-second counter runs down from [`RTC_SYNC_PREDIV`], so the
/// fraction is `999 - sub_seconds * 999 / 255`.
pub fn unix_millis(now: &RtcDateTime) -> u64 {
    let sub = (now.sub_seconds as u32).min(RTC_SYNC_PREDIV);
    let fraction = 999 - sub * 999 / RTC_SYNC_PREDIV;
    unix_seconds(now) as u64 * 1000 + fraction as u64
}
