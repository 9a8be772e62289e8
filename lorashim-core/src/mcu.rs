//! MCU facade for the LoRaWAN stack
//!
//! [`Mcu`] owns every peripheral the stack needs and exposes the small set
//! of operations it calls: SPI to the radio, context persistence, RTC time,
//! sleeps, the watchdog, the LoRaWAN timer, GPIO and debug traces.
//!
//! Interrupt handlers call [`Mcu::timer_isr`] and [`Mcu::radio_irq`]. Both
//! acknowledge the hardware and hand back the attached callback instead of
//! calling it, so the caller can release its lock on the facade first.

use core::fmt;

use embedded_hal::delay::DelayNs;
use lorashim_hal::{
    BootControl, FlashControl, LowPowerTimer, PortIo, PowerControl, RtcClock, RtcError, SpiBus,
    UartTx, Watchdog,
};

use crate::boot::{BankSwitch, BootOutcome};
use crate::config::McuConfig;
use crate::error::{BootError, McuError, StorageError};
use crate::flash::{ContextStore, PageWriter, WriteReport};
use crate::pins::{InvalidPin, PinName, RadioPins};
use crate::sleep::SleepPlan;
use crate::time::{self, TimeError};
use crate::trace::DebugTrace;

/// Interrupt callback registered by the LoRaWAN stack
pub type Callback = fn();

/// Peripheral types of a board
pub trait Platform {
    type Flash: FlashControl;
    type Boot: BootControl;
    type Spi: SpiBus;
    type Uart: UartTx;
    type Rtc: RtcClock;
    type Timer: LowPowerTimer;
    type Watchdog: Watchdog;
    type Gpio: PortIo;
    type Power: PowerControl;
    type Delay: DelayNs;
}

/// Peripherals handed to [`Mcu::new`]
pub struct Peripherals<P: Platform> {
    pub flash: P::Flash,
    pub boot: P::Boot,
    pub spi: P::Spi,
    pub uart: P::Uart,
    pub rtc: P::Rtc,
    pub timer: P::Timer,
    pub watchdog: P::Watchdog,
    pub gpio: P::Gpio,
    pub power: P::Power,
    pub delay: P::Delay,
}

/// The MCU shim
pub struct Mcu<P: Platform> {
    hw: Peripherals<P>,
    config: McuConfig,
    radio: RadioPins,
    writer: PageWriter,
    context: ContextStore,
    trace: DebugTrace,
    timer_callback: Option<Callback>,
    radio_callback: Option<Callback>,
}

impl<P: Platform> Mcu<P> {
    /// Create the facade
    ///
    /// # Arguments
    /// - `hw`: Initialized peripherals
    /// - `config`: Shim configuration
    /// - `radio`: Radio interrupt pins acknowledged by [`Mcu::radio_irq`]
    pub fn new(hw: Peripherals<P>, config: McuConfig, radio: RadioPins) -> Self {
        // The persistence bank is whichever one is not executing
        let bank = hw.boot.active_bank().other();
        Self {
            hw,
            config,
            radio,
            writer: PageWriter::new(bank),
            context: ContextStore::new(bank, config.store_retry),
            trace: DebugTrace::new(config.debug_trace),
            timer_callback: None,
            radio_callback: None,
        }
    }

    pub fn config(&self) -> &McuConfig {
        &self.config
    }

    /// Peripherals, for board code and tests
    pub fn hw(&self) -> &Peripherals<P> {
        &self.hw
    }

    pub fn hw_mut(&mut self) -> &mut Peripherals<P> {
        &mut self.hw
    }

    /// Release the peripherals
    pub fn into_parts(self) -> Peripherals<P> {
        self.hw
    }

    /// Run the dual-bank boot check
    ///
    /// On hardware a successful promotion resets the MCU and this call does
    /// not return.
    pub fn init(&mut self) -> Result<BootOutcome, BootError> {
        BankSwitch::new(self.config.boot).run(&mut self.hw.flash, &mut self.hw.boot)
    }

    // ========================================================================
    // SPI
    // ========================================================================

    /// Send one byte to the radio and return the byte it clocked back
    pub fn spi_write(&mut self, value: u8) -> Result<u8, <P::Spi as SpiBus>::Error> {
        self.hw.spi.transfer_byte(value)
    }

    // ========================================================================
    // Flash
    // ========================================================================

    /// Read a stored context back into `buffer`
    pub fn restore_context(&self, buffer: &mut [u8], address: u32) -> Result<(), StorageError> {
        self.context.restore(&self.hw.flash, address, buffer)
    }

    /// Persist a context, retrying per the configured policy
    ///
    /// Blocks for the retry and settle delays; the watchdog is not released
    /// in between.
    pub fn store_context(&mut self, data: &[u8], address: u32) -> Result<(), StorageError> {
        self.context.store(&mut self.hw.flash, &mut self.hw.delay, address, data)
    }

    /// Write up to one page anywhere in the persistence bank, keeping the
    /// rest of the touched page(s)
    pub fn write_flash_without_erase(
        &mut self,
        buffer: &[u8],
        address: u32,
    ) -> Result<WriteReport, StorageError> {
        self.writer.write_without_erase(&mut self.hw.flash, buffer, address)
    }

    /// External EEPROM address; there is no external EEPROM on this MCU
    pub fn eeprom_set_device_addr(&mut self, _addr: u8) -> Result<(), StorageError> {
        Err(StorageError::Unsupported)
    }

    /// External EEPROM address; there is no external EEPROM on this MCU
    pub fn eeprom_get_device_addr(&self) -> Result<u8, StorageError> {
        Err(StorageError::Unsupported)
    }

    // ========================================================================
    // RTC and sleep
    // ========================================================================

    /// Milliseconds since the Unix epoch
    pub fn rtc_time_ms(&mut self) -> Result<u64, RtcError> {
        self.hw.rtc.now().map(|now| time::unix_millis(&now))
    }

    /// Seconds since the Unix epoch
    pub fn rtc_time_s(&mut self) -> Result<u32, RtcError> {
        self.hw.rtc.now().map(|now| time::unix_seconds(&now))
    }

    /// Arm the RTC wake-up timer `ms` milliseconds ahead
    pub fn wake_up_alarm_ms(&mut self, ms: u32) -> Result<(), McuError> {
        let wakeup = time::wakeup_ms(ms)?;
        self.hw.rtc.arm_wakeup(wakeup)?;
        Ok(())
    }

    /// Arm the RTC wake-up timer `seconds` seconds ahead
    pub fn wake_up_alarm_s(&mut self, seconds: u32) -> Result<(), McuError> {
        let wakeup = time::wakeup_s(seconds)?;
        self.hw.rtc.arm_wakeup(wakeup)?;
        Ok(())
    }

    /// Sleep for `duration` seconds
    ///
    /// The sleep is cut into chunks no longer than the watchdog release
    /// period and the watchdog is released after each chunk.
    pub fn sleep_s(&mut self, duration: u32) -> Result<(), McuError> {
        for chunk in SleepPlan::seconds(duration, self.config.watchdog_release_period_s) {
            if self.config.low_power {
                self.wake_up_alarm_s(chunk)?;
                self.hw.power.sleep();
            } else {
                self.hw.delay.delay_ms(chunk.saturating_mul(1000));
            }
            self.hw.watchdog.release();
        }
        Ok(())
    }

    /// Sleep for `ms` milliseconds
    ///
    /// Chunked like [`Mcu::sleep_s`]; a chunk is also capped at
    /// [`time::MAX_WAKEUP_MS`] so each one fits a single wake-up alarm.
    pub fn sleep_ms(&mut self, ms: u32) -> Result<(), McuError> {
        let period = self
            .config
            .watchdog_release_period_s
            .saturating_mul(1000)
            .min(time::MAX_WAKEUP_MS);
        for chunk in SleepPlan::millis(ms, period) {
            if self.config.low_power {
                self.wake_up_alarm_ms(chunk)?;
                self.hw.power.sleep();
            } else {
                self.hw.delay.delay_ms(chunk);
            }
            self.hw.watchdog.release();
        }
        Ok(())
    }

    // ========================================================================
    // Watchdog
    // ========================================================================

    pub fn watchdog_start(&mut self) {
        self.hw.watchdog.start();
    }

    pub fn watchdog_release(&mut self) {
        self.hw.watchdog.release();
    }

    // ========================================================================
    // LoRaWAN timer
    // ========================================================================

    /// Start the LoRaWAN timer; `callback` runs from [`Mcu::timer_isr`]
    ///
    /// # Arguments
    /// - `callback`: Handler returned by the next timer interrupt
    /// - `delay_ms`: Timeout, 1 ms to 16 s
    pub fn start_timer_ms(&mut self, callback: Callback, delay_ms: u32) -> Result<(), TimeError> {
        let ticks = time::lptim_ticks(delay_ms)?;
        self.timer_callback = Some(callback);
        self.hw.timer.start_timeout(ticks);
        Ok(())
    }

    /// Timer interrupt: stop the timer and return the attached callback
    pub fn timer_isr(&mut self) -> Option<Callback> {
        self.hw.timer.stop();
        self.timer_callback
    }

    // ========================================================================
    // GPIO
    // ========================================================================

    pub fn set_pin(&mut self, pin: PinName, high: bool) -> Result<(), InvalidPin> {
        let location = pin.decode()?;
        self.hw.gpio.write(location.port, location.mask(), high);
        Ok(())
    }

    pub fn get_pin(&self, pin: PinName) -> Result<bool, InvalidPin> {
        let location = pin.decode()?;
        Ok(self.hw.gpio.read(location.port, location.mask()))
    }

    /// Attach the radio interrupt handler
    pub fn attach_interrupt_in(&mut self, callback: Callback) {
        self.radio_callback = Some(callback);
    }

    /// Radio pin interrupt: clear both radio lines and return the handler
    pub fn radio_irq(&mut self) -> Option<Callback> {
        self.hw.gpio.acknowledge_edge(self.radio.line_mask());
        self.radio_callback
    }

    // ========================================================================
    // Debug trace
    // ========================================================================

    /// Formatted trace on the debug UART when `debug_trace` is on
    ///
    /// ```ignore
    /// mcu.print(format_args!("fcnt up {}\n", fcnt))?;
    /// ```
    pub fn print(
        &mut self,
        args: fmt::Arguments<'_>,
    ) -> Result<usize, <P::Uart as UartTx>::Error> {
        self.trace.print(&mut self.hw.uart, args)
    }
}
