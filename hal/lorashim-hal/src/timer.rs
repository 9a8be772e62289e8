//! Low-power timer abstraction
//!
//! The LoRaWAN layer owns one dedicated one-shot timer for its receive
//! windows. The timer runs from the LSE so it keeps counting in stop modes.

/// One-shot low-power timer
pub trait LowPowerTimer {
    /// Start a timeout that fires the timer interrupt after `ticks`
    ///
    /// Restarting an armed timer replaces the pending timeout.
    fn start_timeout(&mut self, ticks: u16);

    /// Cancel a pending timeout and clear its interrupt flag
    fn stop(&mut self);
}
