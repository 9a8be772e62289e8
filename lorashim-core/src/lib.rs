//! Board-agnostic core of the LoRaWAN MCU shim
//!
//! This crate contains all logic that does not depend on a specific chip:
//!
//! - Flash page writer (erase-modify-write across page boundaries)
//! - Context store with bounded retries
//! - Dual-bank boot promotion check
//! - Pin index decoding and timer/RTC tick conversions
//! - Sleep planning around the watchdog period
//! - The [`Mcu`] facade the LoRaWAN stack talks to

#![no_std]
#![deny(unsafe_code)]

pub mod boot;
pub mod config;
pub mod error;
pub mod flash;
pub mod mcu;
pub mod pins;
pub mod sleep;
pub mod time;
pub mod trace;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use config::McuConfig;
pub use error::{BootError, McuError, StorageError, StoreFault};
pub use mcu::{Callback, Mcu, Peripherals, Platform};
