#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the cup controller.
//!
//! - `Config` and its sections are deserialized from TOML and validated once
//!   at startup; the result is passed explicitly to every component.
//! - `PersistedCalibration` is the on-disk shape of the calibration record.
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Scale factor used until the first calibration has been persisted.
pub const DEFAULT_SCALE_FACTOR: f32 = -0.92;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pins {
    pub hx711_dt: u8,
    pub hx711_sck: u8,
    /// Relay driving the cooling plate (active low).
    pub cooler: u8,
    /// Optional second line driven opposite to the relay (fan / dissipator).
    pub cooler_aux: Option<u8>,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            hx711_dt: 4,
            hx711_sck: 5,
            cooler: 18,
            cooler_aux: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ControlCfg {
    /// Desired liquid temperature (°C).
    pub target_temperature_c: f32,
    /// Cooling rate in °C per time unit; time-to-target divides by this.
    pub cooling_efficiency: f32,
    /// Lower clamp for the reported volume.
    #[serde(default = "default_volume_min")]
    pub volume_min: f32,
    /// Upper clamp for the reported volume.
    #[serde(default = "default_volume_max")]
    pub volume_max: f32,
    /// Volume per mass unit (water at ~20 °C is 0.9982 ml/g).
    #[serde(default = "default_density_factor")]
    pub density_factor: f32,
    /// Symmetric band around the target that suppresses relay chatter.
    /// 0 keeps the strict `temperature > target` decision.
    #[serde(default)]
    pub deadband_c: f32,
    /// Delay between control cycles.
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
}

fn default_volume_min() -> f32 {
    10.0
}
fn default_volume_max() -> f32 {
    1000.0
}
fn default_density_factor() -> f32 {
    0.9982
}
fn default_period_ms() -> u64 {
    5_000
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FilterCfg {
    /// Number of samples kept for median / deviation (N).
    pub window: usize,
    /// Outlier threshold factor (T); rejection cutoff is σ × T.
    pub outlier_threshold: f32,
    /// Raw readings averaged into one filter sample.
    pub samples_per_read: usize,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self {
            window: 5,
            outlier_threshold: 3.0,
            samples_per_read: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Known reference mass placed on the scale during calibration.
    pub reference_mass: f32,
    /// Zero-load readings averaged for the tare.
    pub tare_samples: usize,
    /// Loaded readings averaged for the reference measurement.
    pub reference_samples: usize,
    /// Wait after the operator confirms placement before sampling.
    pub settle_ms: u64,
    /// Factor written to the store on first boot.
    pub default_scale_factor: f32,
    /// Location of the persisted calibration record.
    pub store_path: String,
    /// Tare the load cell before the control loop starts.
    pub tare_on_start: bool,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            reference_mass: 100.0,
            tare_samples: 20,
            reference_samples: 100,
            settle_ms: 1_000,
            default_scale_factor: DEFAULT_SCALE_FACTOR,
            store_path: "polar_calibration.toml".to_string(),
            tare_on_start: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// Max time to wait for HX711 data-ready before failing a read.
    pub sensor_read_timeout_ms: u64,
    /// I2C address of the MLX90614 probe.
    pub probe_i2c_addr: u16,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            sensor_read_timeout_ms: 150,
            probe_i2c_addr: 0x5A,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TelemetryCfg {
    /// Capacity of the publisher queue; snapshots beyond it are dropped.
    pub queue: usize,
    /// Optional CSV file receiving one row per published cycle.
    pub csv_file: Option<String>,
    /// Minimum spacing between published snapshots (0 publishes every cycle).
    pub min_interval_ms: u64,
}

impl Default for TelemetryCfg {
    fn default() -> Self {
        Self {
            queue: 16,
            csv_file: None,
            min_interval_ms: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pins: Pins,
    pub control: ControlCfg,
    #[serde(default)]
    pub filter: FilterCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub telemetry: TelemetryCfg,
}

/// On-disk calibration record: the active factor plus the one it replaced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistedCalibration {
    /// Raw counts per physical unit.
    pub scale_factor: f32,
    /// Factor in use before the last calibration; fallback if the current one is unusable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<f32>,
}

impl PersistedCalibration {
    pub fn new(scale_factor: f32) -> Self {
        Self {
            scale_factor,
            previous: None,
        }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_calibration_toml(s: &str) -> Result<PersistedCalibration, toml::de::Error> {
    toml::from_str::<PersistedCalibration>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Control
        if !self.control.target_temperature_c.is_finite() {
            eyre::bail!("control.target_temperature_c must be finite");
        }
        if !(self.control.cooling_efficiency.is_finite() && self.control.cooling_efficiency > 0.0)
        {
            eyre::bail!("control.cooling_efficiency must be > 0");
        }
        if !(self.control.volume_min.is_finite() && self.control.volume_max.is_finite()) {
            eyre::bail!("control.volume_min and control.volume_max must be finite");
        }
        if self.control.volume_min > self.control.volume_max {
            eyre::bail!("control.volume_min must be <= control.volume_max");
        }
        if !(self.control.density_factor.is_finite() && self.control.density_factor > 0.0) {
            eyre::bail!("control.density_factor must be > 0");
        }
        if !self.control.deadband_c.is_finite() || self.control.deadband_c.is_sign_negative() {
            eyre::bail!("control.deadband_c must be >= 0");
        }
        if self.control.period_ms > 60 * 60 * 1000 {
            eyre::bail!("control.period_ms is unreasonably large (>1h)");
        }

        // Filter
        if self.filter.window == 0 {
            eyre::bail!("filter.window must be >= 1");
        }
        if !self.filter.outlier_threshold.is_finite() || self.filter.outlier_threshold < 0.0 {
            eyre::bail!("filter.outlier_threshold must be >= 0");
        }
        if self.filter.samples_per_read == 0 {
            eyre::bail!("filter.samples_per_read must be >= 1");
        }

        // Calibration
        if !(self.calibration.reference_mass.is_finite() && self.calibration.reference_mass > 0.0)
        {
            eyre::bail!("calibration.reference_mass must be > 0");
        }
        if self.calibration.tare_samples < 10 {
            eyre::bail!("calibration.tare_samples must be >= 10");
        }
        if self.calibration.reference_samples < 100 {
            eyre::bail!("calibration.reference_samples must be >= 100");
        }
        if !self.calibration.default_scale_factor.is_finite()
            || self.calibration.default_scale_factor == 0.0
        {
            eyre::bail!("calibration.default_scale_factor must be finite and non-zero");
        }
        if self.calibration.store_path.trim().is_empty() {
            eyre::bail!("calibration.store_path must not be empty");
        }

        // Hardware
        if self.hardware.sensor_read_timeout_ms == 0 {
            eyre::bail!("hardware.sensor_read_timeout_ms must be >= 1");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Telemetry
        if self.telemetry.queue == 0 {
            eyre::bail!("telemetry.queue must be >= 1");
        }

        Ok(())
    }
}
