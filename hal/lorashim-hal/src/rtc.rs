//! Real-time clock abstractions

/// Calendar time as latched by the RTC shadow registers
///
/// Fields are binary (not BCD). `year` counts from 2000. `sub_seconds` is the
/// raw down-counter of the synchronous prescaler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RtcDateTime {
    /// Years since 2000 (0-99)
    pub year: u8,
    /// Month (1-12)
    pub month: u8,
    /// Day of month (1-31)
    pub day: u8,
    /// Hours (0-23)
    pub hours: u8,
    /// Minutes (0-59)
    pub minutes: u8,
    /// Seconds (0-59)
    pub seconds: u8,
    /// Synchronous prescaler down-counter
    pub sub_seconds: u16,
}

/// Wake-up timer request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wakeup {
    /// Ticks of RTCCLK / 16 (2048 Hz with a 32.768 kHz LSE)
    Ticks(u32),
    /// Whole seconds on the 1 Hz wake-up clock
    Seconds(u32),
}

/// Errors from the RTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RtcError {
    /// Calendar not initialized or shadow registers not synchronized
    NotReady,
    /// Wake-up counter could not be written
    WakeupBusy,
}

/// Real-time clock
pub trait RtcClock {
    /// Read the current calendar time
    fn now(&mut self) -> Result<RtcDateTime, RtcError>;

    /// Arm the periodic wake-up interrupt
    fn arm_wakeup(&mut self, wakeup: Wakeup) -> Result<(), RtcError>;
}
