//! Pin index decoding
//!
//! The LoRaWAN stack names pins by a linear index: 16 pins per port,
//! port A first. `PinName(18)` is PB2.

use lorashim_hal::Port;

/// Pins per GPIO port
pub const PINS_PER_PORT: u8 = 16;

/// Ports in index order
const PORTS: [Port; 7] = [
    Port::A,
    Port::B,
    Port::C,
    Port::D,
    Port::E,
    Port::F,
    Port::G,
];

/// Number of valid pin indices (PA0 to PG15)
pub const PIN_COUNT: u8 = PORTS.len() as u8 * PINS_PER_PORT;

/// Linear pin index as used by the LoRaWAN stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PinName(pub u8);

/// Decoded pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinLocation {
    pub port: Port,
    /// Bit within the port (0-15)
    pub bit: u8,
}

impl PinLocation {
    /// Port bit mask, also the EXTI line mask
    pub fn mask(self) -> u16 {
        1 << self.bit
    }
}

/// Pin index outside PA0..PG15
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidPin(pub u8);

impl PinName {
    /// Pin `bit` of `port`
    pub const fn new(port: Port, bit: u8) -> Self {
        Self(port as u8 * PINS_PER_PORT + (bit % PINS_PER_PORT))
    }

    pub fn decode(self) -> Result<PinLocation, InvalidPin> {
        let port = PORTS
            .get((self.0 / PINS_PER_PORT) as usize)
            .ok_or(InvalidPin(self.0))?;
        Ok(PinLocation {
            port: *port,
            bit: self.0 % PINS_PER_PORT,
        })
    }
}

/// Radio interrupt pins
///
/// Both lines share one handler: the pending flags are cleared and the
/// attached callback runs once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RadioPins {
    /// TX done / RX done
    pub tx_rx_done: PinName,
    /// RX timeout
    pub rx_timeout: PinName,
}

impl RadioPins {
    /// Combined EXTI line mask of the valid radio pins
    pub fn line_mask(&self) -> u16 {
        [self.tx_rx_done, self.rx_timeout]
            .iter()
            .filter_map(|pin| pin.decode().ok())
            .fold(0, |mask, location| mask | location.mask())
    }
}
