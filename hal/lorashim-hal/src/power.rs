//! Power mode control

/// Low-power mode entry
pub trait PowerControl {
    /// Enter sleep until the next interrupt (RTC wake-up, radio pin edge...)
    fn sleep(&mut self);
}
