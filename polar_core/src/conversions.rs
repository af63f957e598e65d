//! `From` implementations bridging `polar_config` types to `polar_core` types.

use crate::calibration::CalibrationRecord;
use crate::config::{CalibrationCfg, ControlCfg, SensingCfg};

// ── SensingCfg ───────────────────────────────────────────────────────────────

impl From<&polar_config::Config> for SensingCfg {
    fn from(c: &polar_config::Config) -> Self {
        Self {
            window: c.filter.window,
            outlier_threshold: c.filter.outlier_threshold,
            samples_per_read: c.filter.samples_per_read,
            density_factor: c.control.density_factor,
            read_timeout_ms: c.hardware.sensor_read_timeout_ms,
        }
    }
}

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&polar_config::ControlCfg> for ControlCfg {
    fn from(c: &polar_config::ControlCfg) -> Self {
        Self {
            target_temperature_c: c.target_temperature_c,
            cooling_efficiency: c.cooling_efficiency,
            volume_min: c.volume_min,
            volume_max: c.volume_max,
            deadband_c: c.deadband_c,
            period_ms: c.period_ms,
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&polar_config::Config> for CalibrationCfg {
    fn from(c: &polar_config::Config) -> Self {
        Self {
            tare_samples: c.calibration.tare_samples,
            reference_samples: c.calibration.reference_samples,
            settle_ms: c.calibration.settle_ms,
            read_timeout_ms: c.hardware.sensor_read_timeout_ms,
        }
    }
}

// ── CalibrationRecord ────────────────────────────────────────────────────────

impl From<polar_config::PersistedCalibration> for CalibrationRecord {
    fn from(p: polar_config::PersistedCalibration) -> Self {
        Self {
            scale_factor: p.scale_factor,
            previous: p.previous,
        }
    }
}

impl From<&CalibrationRecord> for polar_config::PersistedCalibration {
    fn from(r: &CalibrationRecord) -> Self {
        Self {
            scale_factor: r.scale_factor,
            previous: r.previous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_sections_map_to_runtime_cfgs() {
        let cfg = polar_config::load_toml(
            r#"
[control]
target_temperature_c = 6.5
cooling_efficiency = 0.25
deadband_c = 0.3

[filter]
window = 9
outlier_threshold = 1.5

[hardware]
sensor_read_timeout_ms = 80
"#,
        )
        .expect("parse");
        let sensing = SensingCfg::from(&cfg);
        assert_eq!(sensing.window, 9);
        assert_eq!(sensing.read_timeout_ms, 80);
        let control = ControlCfg::from(&cfg.control);
        assert!((control.deadband_c - 0.3).abs() < f32::EPSILON);
        assert_eq!(control.period_ms, 5_000);
        let cal = CalibrationCfg::from(&cfg);
        assert_eq!(cal.reference_samples, 100);
        assert_eq!(cal.read_timeout_ms, 80);
    }
}
