//! Watchdog abstraction

/// Independent watchdog
///
/// Once started it cannot be stopped; it resets the MCU unless released
/// within its period.
pub trait Watchdog {
    /// Start the watchdog
    fn start(&mut self);

    /// Reload the counter
    fn release(&mut self);
}
