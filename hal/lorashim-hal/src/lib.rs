//! lorashim Hardware Abstraction Layer
//!
//! This crate defines the hardware primitives the LoRaWAN MCU shim is built
//! on. Chip-specific HALs implement them against real registers; the core
//! crate implements them against a simulated flash for host testing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  LoRaWAN stack / lorashim-firmware      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  lorashim-core (Mcu, page writer, boot) │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  lorashim-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ lorashim-hal- │
//!             │    stm32l4    │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`flash::FlashControl`] - Unlock/lock, page erase, double-word program
//! - [`boot::BootControl`] - Active bank flag, bank select, system reset
//! - [`gpio::PortIo`] - Port-level digital I/O and EXTI acknowledge
//! - [`spi::SpiBus`] - SPI master transfers
//! - [`uart::UartTx`] - Debug serial output
//! - [`rtc::RtcClock`] - Calendar readout and wake-up timer
//! - [`timer::LowPowerTimer`] - One-shot timeout for the LoRaWAN layer
//! - [`watchdog::Watchdog`] - Independent watchdog
//! - [`power::PowerControl`] - Low-power sleep entry

#![no_std]
#![deny(unsafe_code)]

pub mod boot;
pub mod flash;
pub mod gpio;
pub mod power;
pub mod rtc;
pub mod spi;
pub mod timer;
pub mod uart;
pub mod watchdog;

// Re-export key traits at crate root for convenience
pub use boot::BootControl;
pub use flash::{Bank, FlashControl, FlashError};
pub use gpio::{Port, PortIo};
pub use power::PowerControl;
pub use rtc::{RtcClock, RtcDateTime, RtcError, Wakeup};
pub use spi::SpiBus;
pub use timer::LowPowerTimer;
pub use uart::UartTx;
pub use watchdog::Watchdog;
