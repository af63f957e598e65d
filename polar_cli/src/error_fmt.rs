//! Human-readable error descriptions, exit codes and structured JSON errors.

use polar_core::error::{BuildError, PolarError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingThermometer => {
                "What happened: No thermometer was provided to the control loop.\nLikely causes: The IR probe failed to initialize or was not wired into the builder.\nHow to fix: Ensure the probe is created successfully and passed via with_thermometer(...).".to_string()
            }
            BuildError::MissingVolumeSensor => {
                "What happened: No volume sensor was provided to the control loop.\nLikely causes: The load cell failed to initialize.\nHow to fix: Check the HX711 wiring and the [pins] section, then rerun.".to_string()
            }
            BuildError::MissingCooler => {
                "What happened: No cooler was provided to the control loop.\nLikely causes: The relay pin could not be opened.\nHow to fix: Check pins.cooler in the config and GPIO permissions.".to_string()
            }
            BuildError::MissingControl => {
                "What happened: Control parameters were not set.\nLikely causes: The [control] section was not mapped into the loop.\nHow to fix: Provide target_temperature_c and cooling_efficiency under [control].".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PolarError>() {
        return match pe {
            PolarError::InvalidConfiguration(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML, or a wrong --config path.\nHow to fix: Edit the config file, then rerun."
            ),
            PolarError::InvalidCalibration(msg) => format!(
                "What happened: Calibration failed ({msg}).\nLikely causes: Reference mass not placed, non-positive --mass, or a stored factor of zero.\nHow to fix: Place the reference mass when prompted and rerun `polar calibrate --mass <grams>`. The previous factor was kept."
            ),
            PolarError::Timeout => {
                "What happened: Sensor read timed out.\nLikely causes: HX711 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify DT/SCK pins and power, and consider increasing hardware.sensor_read_timeout_ms in the config.".to_string()
            }
            PolarError::SensorUnavailable(msg) => format!(
                "What happened: A sensor is not responding ({msg}).\nLikely causes: Loose wiring, wrong I2C address or pins.\nHow to fix: Run `polar self-check` and check the [pins] and [hardware] sections."
            ),
            PolarError::Store(msg) => format!(
                "What happened: The calibration store could not be used ({msg}).\nLikely causes: Unwritable directory or a corrupted calibration file.\nHow to fix: Check calibration.store_path; remove the file to start from the default factor."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from driver init
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open hx711")
        || lower.contains("open mlx90614")
        || lower.contains("open cooler relay")
    {
        return "What happened: Failed to initialize hardware.\nLikely causes: Incorrect pin numbers, I2C disabled, or insufficient GPIO permissions.\nHow to fix: Fix the [pins]/[hardware] values in the config; ensure the process can access GPIO and I2C.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable short name for JSON output.
fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(_) => "InvalidConfiguration",
            _ => "Build",
        };
    }
    match err.downcast_ref::<PolarError>() {
        Some(PolarError::InvalidConfiguration(_)) => "InvalidConfiguration",
        Some(PolarError::InvalidCalibration(_)) => "InvalidCalibration",
        Some(PolarError::SensorUnavailable(_)) => "SensorUnavailable",
        Some(PolarError::Timeout) => "Timeout",
        Some(PolarError::Hardware(_)) => "Hardware",
        Some(PolarError::Store(_)) => "Store",
        Some(PolarError::State(_)) => "State",
        None => "Error",
    }
}

/// 3 invalid configuration, 4 invalid calibration, 5 sensor unavailable, 1 otherwise.
/// (clap exits with 2 on usage errors before we get here.)
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(BuildError::InvalidConfig(_)) = err.downcast_ref::<BuildError>() {
        return 3;
    }
    match err.downcast_ref::<PolarError>() {
        Some(PolarError::InvalidConfiguration(_)) => 3,
        Some(PolarError::InvalidCalibration(_)) => 4,
        Some(PolarError::SensorUnavailable(_) | PolarError::Timeout) => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PolarError::InvalidConfiguration("x".into()), 3)]
    #[case(PolarError::InvalidCalibration("x".into()), 4)]
    #[case(PolarError::SensorUnavailable("x".into()), 5)]
    #[case(PolarError::Timeout, 5)]
    #[case(PolarError::Store("x".into()), 1)]
    fn exit_codes(#[case] e: PolarError, #[case] code: i32) {
        assert_eq!(exit_code_for_error(&eyre::Report::new(e)), code);
    }

    #[test]
    fn wrapped_errors_keep_their_code() {
        let r = eyre::Report::new(PolarError::Timeout).wrap_err("boot tare");
        assert_eq!(exit_code_for_error(&r), 5);
        assert!(humanize(&r).contains("timed out"));
    }

    #[test]
    fn json_error_has_reason() {
        let r = eyre::Report::new(PolarError::InvalidCalibration("no load".into()));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&r)).unwrap();
        assert_eq!(v["reason"], "InvalidCalibration");
        assert!(v["message"].as_str().unwrap().contains("no load"));
    }
}
