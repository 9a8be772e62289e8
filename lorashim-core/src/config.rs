//! Shim configuration
//!
//! Defaults match the reference STM32L476 board: five store attempts 300 ms
//! apart, a 30 s watchdog release period and an 80 KB boot image.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default number of erase+program attempts for a context store
pub const DEFAULT_STORE_ATTEMPTS: u8 = 5;

/// Default pause between store attempts and after a successful store (ms)
pub const DEFAULT_STORE_DELAY_MS: u32 = 300;

/// Watchdog release period (s); must stay below the 32 s IWDG period
pub const DEFAULT_WATCHDOG_RELEASE_PERIOD_S: u32 = 30;

/// Bytes of the running image copied by the boot check (20480 words)
pub const DEFAULT_BOOT_IMAGE_LEN: u32 = 20480 * 4;

/// Retry policy for the context store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RetryPolicy {
    /// Total attempts, including the first one (0 is treated as 1)
    pub max_attempts: u8,
    /// Delay before each retry (ms)
    pub delay_ms: u32,
    /// Delay after a successful store (ms)
    pub settle_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_STORE_ATTEMPTS,
            delay_ms: DEFAULT_STORE_DELAY_MS,
            settle_ms: DEFAULT_STORE_DELAY_MS,
        }
    }
}

/// Boot check configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BootConfig {
    /// Bytes copied from the running bank to the other bank
    pub image_len: u32,
    /// Check the initial stack pointer before copying
    pub check_image: bool,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            image_len: DEFAULT_BOOT_IMAGE_LEN,
            check_image: true,
        }
    }
}

/// Complete shim configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct McuConfig {
    /// Context store retry policy
    pub store_retry: RetryPolicy,
    /// Boot check settings
    pub boot: BootConfig,
    /// Longest sleep chunk between two watchdog releases (s)
    pub watchdog_release_period_s: u32,
    /// Sleep with the RTC wake-up timer instead of busy-waiting
    pub low_power: bool,
    /// Forward `print` output to the debug UART
    pub debug_trace: bool,
}

impl Default for McuConfig {
    fn default() -> Self {
        Self {
            store_retry: RetryPolicy::default(),
            boot: BootConfig::default(),
            watchdog_release_period_s: DEFAULT_WATCHDOG_RELEASE_PERIOD_S,
            low_power: true,
            debug_trace: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_board() {
        let config = McuConfig::default();
        assert_eq!(config.store_retry.max_attempts, 5);
        assert_eq!(config.store_retry.delay_ms, 300);
        assert_eq!(config.boot.image_len, 81920);
        assert!(config.watchdog_release_period_s < 32);
    }
}
