use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PolarError {
    /// Fatal at startup: bad window size, zero efficiency, ...
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Operator-facing and retryable.
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),
    /// Transient; the control loop skips or reuses prior state.
    #[error("sensor unavailable: {0}")]
    SensorUnavailable(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("calibration store error: {0}")]
    Store(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing thermometer")]
    MissingThermometer,
    #[error("missing volume sensor")]
    MissingVolumeSensor,
    #[error("missing cooler")]
    MissingCooler,
    #[error("missing control configuration")]
    MissingControl,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
