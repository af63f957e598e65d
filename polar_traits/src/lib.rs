//! Collaborator contracts for the cup core.
//!
//! Drivers (real or simulated) implement these; `polar_core` only ever talks
//! to hardware through them.
pub mod clock;

pub use clock::{test_clock, Clock, MonotonicClock};

/// Error type returned across every collaborator boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Liquid temperature probe.
pub trait Thermometer {
    /// Current liquid temperature in °C.
    fn read_celsius(&mut self) -> Result<f32, BoxError>;
}

/// Mass transducer returning raw ADC counts (e.g. an HX711 bridge amplifier).
pub trait LoadCell {
    fn read(&mut self, timeout: std::time::Duration) -> Result<i32, BoxError>;
}

/// Cooling actuator. Must be idempotent: repeating the same command is a no-op.
pub trait Cooler {
    fn set_cooling(&mut self, on: bool) -> Result<(), BoxError>;
}

impl<T: Thermometer + ?Sized> Thermometer for Box<T> {
    fn read_celsius(&mut self) -> Result<f32, BoxError> {
        (**self).read_celsius()
    }
}

impl<T: LoadCell + ?Sized> LoadCell for Box<T> {
    fn read(&mut self, timeout: std::time::Duration) -> Result<i32, BoxError> {
        (**self).read(timeout)
    }
}

impl<T: Cooler + ?Sized> Cooler for Box<T> {
    fn set_cooling(&mut self, on: bool) -> Result<(), BoxError> {
        (**self).set_cooling(on)
    }
}
