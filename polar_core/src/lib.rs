#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Sensing and cooling core of the cup (hardware-agnostic).
//!
//! All hardware interaction goes through the `polar_traits` collaborator
//! traits (`Thermometer`, `LoadCell`, `Cooler`).
//!
//! ## Architecture
//!
//! - **Filtering**: outlier-rejecting median filter (`filter`)
//! - **Sensing**: raw counts → mass → filtered volume (`sensing`)
//! - **Calibration**: tare + reference-mass procedure and its store
//!   (`calibration`, `store`)
//! - **Control**: clamp, cooling decision, time-to-target, actuation
//!   (`control`, `builder`, `runner`)
//! - **Telemetry**: best-effort snapshot publishing (`telemetry`)

pub mod atomic;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod control;
pub mod conversions;
pub mod error;
pub mod filter;
pub mod hw_error;
pub mod mocks;
pub mod runner;
pub mod sensing;
pub mod status;
pub mod store;
pub mod telemetry;
pub mod util;

pub use builder::{ControlLoopBuilder, Missing, Set};
pub use calibration::{
    CalibrationOutcome, CalibrationPhase, CalibrationRecord, ScaleCalibrator, ScaleConversion,
};
pub use config::{CalibrationCfg, ControlCfg, SensingCfg};
pub use control::{
    ControlLoop, CycleState, LoopStats, clamp_volume, cooling_decision, time_to_target,
};
pub use error::{BuildError, PolarError, Report, Result};
pub use filter::AdaptiveMedianFilter;
pub use runner::RunSummary;
pub use sensing::VolumeSensor;
pub use status::CycleStatus;
pub use store::{CalibrationStore, FileCalibrationStore, MemoryCalibrationStore};
pub use telemetry::{NullTelemetry, TelemetryChannel, TelemetrySink};

/// Load the stored record and turn it into a ready conversion (no tare).
///
/// Falls back to `previous` when the stored factor is unusable.
pub fn conversion_from_store<S: CalibrationStore + ?Sized>(
    store: &mut S,
) -> std::result::Result<ScaleConversion, PolarError> {
    let record = store.load()?;
    let factor = record.effective_factor().ok_or_else(|| {
        PolarError::InvalidCalibration(format!(
            "stored scale factor {} is unusable and no previous value exists",
            record.scale_factor
        ))
    })?;
    ScaleConversion::new(factor)
}
