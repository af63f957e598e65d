//! Runtime configuration for the core components.
//!
//! These are separate from the TOML-deserialized config in `polar_config`;
//! see `conversions` for the bridge.

/// Filter and volume-estimation parameters.
#[derive(Debug, Clone)]
pub struct SensingCfg {
    /// Filter window N (>= 1).
    pub window: usize,
    /// Outlier threshold factor T (>= 0).
    pub outlier_threshold: f32,
    /// Raw load-cell reads averaged into one filter sample.
    pub samples_per_read: usize,
    /// Volume per mass unit.
    pub density_factor: f32,
    /// Max wait for a single load-cell read (ms).
    pub read_timeout_ms: u64,
}

impl Default for SensingCfg {
    fn default() -> Self {
        Self {
            window: 5,
            outlier_threshold: 3.0,
            samples_per_read: 10,
            density_factor: 0.9982,
            read_timeout_ms: 150,
        }
    }
}

/// Cooling decision and pacing parameters.
#[derive(Debug, Clone)]
pub struct ControlCfg {
    pub target_temperature_c: f32,
    /// Must be > 0; zero yields an infinite time-to-target estimate.
    pub cooling_efficiency: f32,
    pub volume_min: f32,
    pub volume_max: f32,
    /// 0 keeps the strict `temperature > target` decision.
    pub deadband_c: f32,
    pub period_ms: u64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            target_temperature_c: 4.0,
            cooling_efficiency: 0.5,
            volume_min: 10.0,
            volume_max: 1000.0,
            deadband_c: 0.0,
            period_ms: 5_000,
        }
    }
}

/// Calibration procedure parameters.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    pub tare_samples: usize,
    pub reference_samples: usize,
    pub settle_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            tare_samples: 20,
            reference_samples: 100,
            settle_ms: 1_000,
            read_timeout_ms: 150,
        }
    }
}
