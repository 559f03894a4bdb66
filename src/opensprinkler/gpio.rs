use core::fmt;
use std::{
    error,
    sync::{Arc, Mutex, MutexGuard},
};

#[cfg(feature = "station-gpio")]
use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};
#[cfg(feature = "station-gpio")]
use std::sync::atomic::{AtomicBool, Ordering};

pub use rppal::gpio::Level;

use super::station::{MAX_NUM_BOARDS, SHIFT_REGISTER_LINES};

pub mod pin {
    /// Shift register **CLOCK** pin
    pub const SHIFT_REGISTER_CLOCK: u8 = 4;
    /// Shift register **OE** (output enable) pin
    pub const SHIFT_REGISTER_OE: u8 = 17;
    /// Shift register **LATCH** pin
    pub const SHIFT_REGISTER_LATCH: u8 = 22;
    /// Shift register **DATA** pin
    pub const SHIFT_REGISTER_DATA: u8 = 27;
    /// Rain sensor pin
    pub const RAIN_SENSOR: u8 = 14;
}

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Gpio(rppal::gpio::Error),
    /// The output chain could not be written
    Latch(&'static str),
}

impl From<rppal::gpio::Error> for Error {
    fn from(err: rppal::gpio::Error) -> Self {
        Error::Gpio(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Gpio(err) => write!(f, "GPIO error: {}", err),
            Error::Latch(reason) => write!(f, "Latch error: {}", reason),
        }
    }
}

impl error::Error for Error {}

/// Station outputs and the rain sensor input
pub trait Backend {
    /// Shift out every board and latch them at once
    fn latch(&mut self, boards: &[u8; MAX_NUM_BOARDS]) -> Result<()>;

    /// Enable the outputs (only after a known pattern has been latched)
    fn enable_outputs(&mut self) -> Result<()>;

    fn read_rain_sensor(&mut self) -> Result<Level>;

    /// Returns [true] (once) if the rain sensor input changed since the last call
    fn take_rain_sensor_edge(&mut self) -> bool;
}

/// 74HC595 shift register chain on the Raspberry Pi header
#[cfg(feature = "station-gpio")]
pub struct ShiftRegister {
    clock: OutputPin,
    output_enable: OutputPin,
    latch: OutputPin,
    data: OutputPin,
    rain_sensor: InputPin,
    /// Set from the interrupt thread, consumed by the control loop
    rain_sensor_edge: Arc<AtomicBool>,
}

#[cfg(feature = "station-gpio")]
impl ShiftRegister {
    pub fn new() -> Result<Self> {
        let gpio = Gpio::new()?;

        // outputs stay disabled (OE high) until the first pattern has been latched
        let output_enable = gpio.get(pin::SHIFT_REGISTER_OE)?.into_output_high();
        let latch = gpio.get(pin::SHIFT_REGISTER_LATCH)?.into_output_high();
        let clock = gpio.get(pin::SHIFT_REGISTER_CLOCK)?.into_output_high();
        let data = gpio.get(pin::SHIFT_REGISTER_DATA)?.into_output_high();

        let mut rain_sensor = gpio.get(pin::RAIN_SENSOR)?.into_input_pullup();
        let rain_sensor_edge = Arc::new(AtomicBool::new(false));
        let edge = Arc::clone(&rain_sensor_edge);
        rain_sensor.set_async_interrupt(Trigger::Both, move |_| edge.store(true, Ordering::Release))?;

        Ok(Self {
            clock,
            output_enable,
            latch,
            data,
            rain_sensor,
            rain_sensor_edge,
        })
    }
}

#[cfg(feature = "station-gpio")]
impl Backend for ShiftRegister {
    fn latch(&mut self, boards: &[u8; MAX_NUM_BOARDS]) -> Result<()> {
        self.latch.set_low();

        // Shift out all station bit values from the highest board and bit to the lowest
        for board_index in (0..MAX_NUM_BOARDS).rev() {
            let bits = boards[board_index];
            for line in (0..SHIFT_REGISTER_LINES).rev() {
                self.clock.set_low();
                self.data.write(if bits & (1 << line) != 0 { Level::High } else { Level::Low });
                self.clock.set_high();
            }
        }

        self.latch.set_high();
        Ok(())
    }

    fn enable_outputs(&mut self) -> Result<()> {
        // pull low to enable
        self.output_enable.set_low();
        Ok(())
    }

    fn read_rain_sensor(&mut self) -> Result<Level> {
        Ok(self.rain_sensor.read())
    }

    fn take_rain_sensor_edge(&mut self) -> bool {
        self.rain_sensor_edge.swap(false, Ordering::AcqRel)
    }
}

#[derive(Debug)]
pub struct SimulatedPins {
    /// Every latched pattern, oldest first
    pub latched: Vec<[u8; MAX_NUM_BOARDS]>,
    pub outputs_enabled: bool,
    pub rain_sensor: Level,
    pub rain_sensor_edge: bool,
    /// Make every latch fail
    pub fail_latch: bool,
}

impl Default for SimulatedPins {
    fn default() -> Self {
        Self {
            latched: Vec::new(),
            outputs_enabled: false,
            // pulled up, an open contact reads high
            rain_sensor: Level::High,
            rain_sensor_edge: false,
            fail_latch: false,
        }
    }
}

/// In-memory backend (demo build, hosts without GPIO and tests)
///
/// Clones share the same pins, so a clone can be kept to inspect or drive the backend handed to
/// the controller.
#[derive(Clone, Default)]
pub struct Simulated {
    pins: Arc<Mutex<SimulatedPins>>,
}

impl Simulated {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pins(&self) -> MutexGuard<'_, SimulatedPins> {
        self.pins.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Change the rain sensor input level (raises an edge if it changed)
    pub fn set_rain_sensor(&self, level: Level) {
        let mut pins = self.pins();
        if pins.rain_sensor != level {
            pins.rain_sensor = level;
            pins.rain_sensor_edge = true;
        }
    }

    /// Most recently latched pattern
    pub fn outputs(&self) -> Option<[u8; MAX_NUM_BOARDS]> {
        self.pins().latched.last().copied()
    }

    pub fn latch_count(&self) -> usize {
        self.pins().latched.len()
    }
}

impl Backend for Simulated {
    fn latch(&mut self, boards: &[u8; MAX_NUM_BOARDS]) -> Result<()> {
        let mut pins = self.pins();
        if pins.fail_latch {
            return Err(Error::Latch("simulated failure"));
        }
        pins.latched.push(*boards);
        Ok(())
    }

    fn enable_outputs(&mut self) -> Result<()> {
        self.pins().outputs_enabled = true;
        Ok(())
    }

    fn read_rain_sensor(&mut self) -> Result<Level> {
        Ok(self.pins().rain_sensor)
    }

    fn take_rain_sensor_edge(&mut self) -> bool {
        let mut pins = self.pins();
        let edge = pins.rain_sensor_edge;
        pins.rain_sensor_edge = false;
        edge
    }
}

#[cfg(test)]
mod tests {
    use super::{Backend, Level, Simulated};

    #[test]
    fn simulated_clones_share_pins() {
        let handle = Simulated::new();
        let mut backend = handle.clone();

        backend.latch(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(handle.outputs(), Some([1, 2, 3, 4, 5, 6]));
        assert_eq!(handle.latch_count(), 1);

        handle.set_rain_sensor(Level::Low);
        assert_eq!(backend.read_rain_sensor().unwrap(), Level::Low);
        assert!(backend.take_rain_sensor_edge());
        assert!(!backend.take_rain_sensor_edge(), "Testing edge is consumed");

        handle.set_rain_sensor(Level::Low);
        assert!(!backend.take_rain_sensor_edge(), "Testing same level is not an edge");
    }

    #[test]
    fn simulated_latch_failure() {
        let handle = Simulated::new();
        let mut backend = handle.clone();
        handle.pins().fail_latch = true;
        assert!(backend.latch(&[0; 6]).is_err());
        assert_eq!(handle.latch_count(), 0);
    }
}
