//! lorashim - reference firmware
//!
//! Brings up the MCU shim on an STM32L476RG LoRaWAN node with an SX127x
//! radio on SPI1 and a debug console on USART2:
//!
//! 1. Boot check: promote the image to bank 1 when running from bank 2
//! 2. Restore the persisted LoRaWAN context from the other bank
//! 3. Arm the watchdog, the radio interrupt and the first RX window timer
//!
//! Interrupt handlers only acknowledge the hardware and raise a signal.
//! Dispatch tasks fetch the stack callback under the shim lock and run it
//! after the lock is released.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::InterruptExt;
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use embassy_stm32::usart::{self, UartTx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Delay, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use lorashim_core::boot::BootOutcome;
use lorashim_core::flash::layout::{INACTIVE_BANK_BASE, PAGE_SIZE};
use lorashim_core::pins::{PinName, RadioPins};
use lorashim_core::{Mcu, McuConfig, Peripherals};
use lorashim_hal::Port;
use lorashim_hal_stm32l4::{
    gpio, lptim, rtc, Stm32l4, Stm32l4Boot, Stm32l4Flash, Stm32l4Gpio, Stm32l4Lptim, Stm32l4Power,
    Stm32l4Rtc, Stm32l4Spi, Stm32l4Uart, Stm32l4Watchdog,
};

type Board = Mcu<Stm32l4<'static>>;
type SharedBoard = Mutex<CriticalSectionRawMutex, Board>;

/// SX127x DIO0 (TX/RX done) on PB10, DIO1 (RX timeout) on PB11
const RADIO: RadioPins = RadioPins {
    tx_rx_done: PinName::new(Port::B, 10),
    rx_timeout: PinName::new(Port::B, 11),
};

/// Persisted LoRaWAN context: second page of the persistence bank
const CONTEXT_ADDRESS: u32 = INACTIVE_BANK_BASE + PAGE_SIZE as u32;
const CONTEXT_LEN: usize = 64;

/// First RX window after join request
const RX1_DELAY_MS: u32 = 5000;

/// Watchdog kick interval, well inside the 32 s IWDG period
const WATCHDOG_KICK_S: u64 = 10;

static BOARD: StaticCell<SharedBoard> = StaticCell::new();
static TIMER_EVENT: Signal<CriticalSectionRawMutex, ()> = Signal::new();
static RADIO_EVENT: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("lorashim firmware starting...");

    let mut config = embassy_stm32::Config::default();
    // LSE feeds the RTC and LPTIM1
    config.rcc.ls = embassy_stm32::rcc::LsConfig::default_lse();
    let p = embassy_stm32::init(config);
    info!("Peripherals initialized");

    // Radio: SPI1 on PA5/PA7/PA6, NSS on PA4 driven by the stack
    let mut spi_config = spi::Config::default();
    spi_config.frequency = Hertz(8_000_000);
    let spi = Spi::new_blocking(p.SPI1, p.PA5, p.PA7, p.PA6, spi_config);
    let _nss = Output::new(p.PA4, Level::High, Speed::VeryHigh);
    let _dio0 = Input::new(p.PB10, Pull::Down);
    let _dio1 = Input::new(p.PB11, Pull::Down);

    // Debug console
    let uart = unwrap!(UartTx::new_blocking(p.USART2, p.PA2, usart::Config::default()));

    let mut ports = Stm32l4Gpio::new();
    for pin in [RADIO.tx_rx_done, RADIO.rx_timeout] {
        match pin.decode() {
            Ok(loc) => ports.route_rising_edge(loc.port, loc.bit),
            Err(e) => warn!("radio pin {} not routable", e.0),
        }
    }

    let hw = Peripherals::<Stm32l4<'static>> {
        flash: Stm32l4Flash::new(p.FLASH),
        boot: Stm32l4Boot::new(),
        spi: Stm32l4Spi::new(spi),
        uart: Stm32l4Uart::new(uart),
        rtc: Stm32l4Rtc::new(),
        timer: Stm32l4Lptim::new(),
        watchdog: Stm32l4Watchdog::new(p.IWDG),
        gpio: ports,
        power: Stm32l4Power,
        delay: Delay,
    };
    let shim_config = McuConfig {
        debug_trace: true,
        ..McuConfig::default()
    };
    let mut mcu = Mcu::new(hw, shim_config, RADIO);

    // Does not return when the image gets promoted
    match mcu.init() {
        Ok(BootOutcome::Primary) => info!("Boot: running from bank 1"),
        Ok(BootOutcome::Promoted { target, copied }) => {
            warn!("Boot: promoted {} bytes to {} without reset", copied, target)
        }
        Err(e) => error!("Boot: promotion failed, staying on bank 2: {}", e),
    }

    let mut context = [0u8; CONTEXT_LEN];
    match mcu.restore_context(&mut context, CONTEXT_ADDRESS) {
        Ok(()) => info!("Context restored from {:#x}", CONTEXT_ADDRESS),
        Err(e) => warn!("Context restore failed: {}", e),
    }
    let frame_counter = u32::from_le_bytes([context[0], context[1], context[2], context[3]]);

    mcu.watchdog_start();
    mcu.attach_interrupt_in(on_radio_event);
    if let Err(e) = mcu.start_timer_ms(on_rx_window, RX1_DELAY_MS) {
        warn!("RX window timer rejected: {}", e);
    }
    if mcu
        .print(format_args!("lorashim up, fcnt {}\n", frame_counter))
        .is_err()
    {
        warn!("Debug UART write failed");
    }

    // SAFETY: the handlers below only touch their own peripheral flags
    // and the signals
    unsafe {
        interrupt::LPTIM1.enable();
        interrupt::EXTI15_10.enable();
        interrupt::RTC_WKUP.enable();
    }

    let board: &'static SharedBoard = BOARD.init(Mutex::new(mcu));
    spawner.spawn(timer_task(board)).unwrap();
    spawner.spawn(radio_task(board)).unwrap();
    info!("Tasks spawned, entering watchdog loop");

    loop {
        board.lock().await.watchdog_release();
        Timer::after_secs(WATCHDOG_KICK_S).await;
    }
}

// ============================================================================
// Stack callbacks
// ============================================================================

fn on_rx_window() {
    info!("RX window opened");
}

fn on_radio_event() {
    info!("Radio DIO event");
}

// ============================================================================
// Dispatch tasks
// ============================================================================

/// Run the timer callback after each LPTIM1 compare match
#[embassy_executor::task]
async fn timer_task(board: &'static SharedBoard) {
    loop {
        TIMER_EVENT.wait().await;
        let callback = board.lock().await.timer_isr();
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// Run the radio callback after each DIO edge
#[embassy_executor::task]
async fn radio_task(board: &'static SharedBoard) {
    loop {
        RADIO_EVENT.wait().await;
        let callback = board.lock().await.radio_irq();
        if let Some(callback) = callback {
            callback();
        }
    }
}

// ============================================================================
// Interrupt handlers
// ============================================================================

#[interrupt]
fn LPTIM1() {
    lptim::acknowledge();
    TIMER_EVENT.signal(());
}

#[interrupt]
fn EXTI15_10() {
    gpio::acknowledge_lines(RADIO.line_mask());
    RADIO_EVENT.signal(());
}

/// Only ends a sleep chunk
#[interrupt]
fn RTC_WKUP() {
    rtc::clear_wakeup();
}
