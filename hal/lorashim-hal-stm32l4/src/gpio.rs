//! Port-level GPIO and EXTI pending flags

use embassy_stm32::pac::{self, gpio::Gpio, EXTI, RCC, SYSCFG};
use lorashim_hal::{Port, PortIo};

/// Register block of a port
fn regs(port: Port) -> Gpio {
    match port {
        Port::A => pac::GPIOA,
        Port::B => pac::GPIOB,
        Port::C => pac::GPIOC,
        Port::D => pac::GPIOD,
        Port::E => pac::GPIOE,
        Port::F => pac::GPIOF,
        Port::G => pac::GPIOG,
    }
}

/// Port I/O through `BSRR`/`IDR`
///
/// Pin modes are configured by the firmware through embassy before the
/// shim takes over; this type only drives and samples levels.
pub struct Stm32l4Gpio {
    _private: (),
}

impl Stm32l4Gpio {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Route rising edges of `port`/`bit` to EXTI line `bit` and unmask it
    ///
    /// Each line serves one port at a time; routing a second port to the
    /// same bit replaces the first.
    pub fn route_rising_edge(&mut self, port: Port, bit: u8) {
        let line = (bit & 0x0F) as usize;
        RCC.apb2enr().modify(|w| w.set_syscfgen(true));

        SYSCFG
            .exticr(line / 4)
            .modify(|w| w.set_exti(line % 4, port.index() as u8));

        EXTI.pr(0).write(|w| w.set_line(line, true));
        EXTI.rtsr(0).modify(|w| w.set_line(line, true));
        EXTI.imr(0).modify(|w| w.set_line(line, true));
    }
}

/// Clear pending EXTI lines, from the EXTI handlers
pub fn acknowledge_lines(line_mask: u16) {
    // Write-1-to-clear
    EXTI.pr(0).write(|w| w.0 = line_mask as u32);
}

impl Default for Stm32l4Gpio {
    fn default() -> Self {
        Self::new()
    }
}

impl PortIo for Stm32l4Gpio {
    fn write(&mut self, port: Port, mask: u16, high: bool) {
        // BSRR: set in the low half, reset in the high half
        let bits = if high {
            mask as u32
        } else {
            (mask as u32) << 16
        };
        regs(port).bsrr().write(|w| w.0 = bits);
    }

    fn read(&self, port: Port, mask: u16) -> bool {
        regs(port).idr().read().0 & mask as u32 != 0
    }

    fn acknowledge_edge(&mut self, line_mask: u16) {
        acknowledge_lines(line_mask);
    }
}
