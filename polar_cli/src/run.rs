//! Subcommand bodies: config mapping, driver assembly and execution.

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use eyre::WrapErr;
use polar_core::{
    CalibrationCfg, CalibrationOutcome, ControlCfg, ControlLoop, FileCalibrationStore, PolarError,
    RunSummary, ScaleCalibrator, SensingCfg, TelemetryChannel, VolumeSensor, conversion_from_store,
};
use polar_traits::MonotonicClock;
use serde_json::{Value, json};

use crate::backend::Backend;
use crate::output::CycleOutput;

fn store_for(cfg: &polar_config::Config) -> FileCalibrationStore {
    FileCalibrationStore::new(
        &cfg.calibration.store_path,
        cfg.calibration.default_scale_factor,
    )
}

pub fn run_loop(
    cfg: &polar_config::Config,
    json: bool,
    cycles: Option<u64>,
    period_override: Option<u64>,
    assume_yes: bool,
    shutdown: &AtomicBool,
) -> eyre::Result<RunSummary> {
    let Backend {
        thermometer,
        load_cell,
        cooler,
        scale,
    } = Backend::open(cfg)?;
    let mut store = store_for(cfg);
    let conversion = conversion_from_store(&mut store).map_err(eyre::Report::new)?;
    tracing::info!(
        scale_factor = conversion.scale_factor,
        store = %store.path().display(),
        "calibration loaded"
    );

    let sensing = SensingCfg::from(cfg);
    let mut control = ControlCfg::from(&cfg.control);
    if let Some(ms) = period_override {
        control.period_ms = ms;
    }

    let mut volume =
        VolumeSensor::new(load_cell, conversion, &sensing).map_err(eyre::Report::new)?;
    if cfg.calibration.tare_on_start {
        scale.prepare_tare(|| {
            if assume_yes {
                Ok(())
            } else {
                wait_for_enter("Empty the scale for the boot tare")
            }
        })?;
        volume
            .tare(cfg.calibration.tare_samples)
            .map_err(|e| eyre::Report::new(e).wrap_err("boot tare"))?;
        scale.refill();
    }

    let mut output = CycleOutput::open(json, cfg.telemetry.csv_file.as_deref().map(Path::new))?;
    let telemetry = TelemetryChannel::spawn(
        cfg.telemetry.queue,
        cfg.telemetry.min_interval_ms,
        move |state| output.publish(state),
    );

    let mut ctl = ControlLoop::builder()
        .with_thermometer(thermometer)
        .with_volume_sensor(volume)
        .with_cooler(cooler)
        .with_control(control)
        .with_telemetry(telemetry)
        .with_clock(MonotonicClock::new())
        .build()?;
    let summary = ctl.run(shutdown, cycles)?;
    // Dropping the loop drains and joins the telemetry publisher.
    drop(ctl);
    Ok(summary)
}

/// Block until the operator presses Enter. EOF cancels.
fn wait_for_enter(prompt: &str) -> eyre::Result<()> {
    eprint!("{prompt} and press Enter... ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    let n = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .wrap_err("read operator confirmation")?;
    if n == 0 {
        eyre::bail!("cancelled: no confirmation on stdin");
    }
    Ok(())
}

pub fn calibrate(
    cfg: &polar_config::Config,
    mass: Option<f32>,
    assume_yes: bool,
) -> eyre::Result<CalibrationOutcome> {
    let reference_mass = mass.unwrap_or(cfg.calibration.reference_mass);
    // Refuse before anything touches the scale.
    if !(reference_mass.is_finite() && reference_mass > 0.0) {
        return Err(eyre::Report::new(PolarError::InvalidCalibration(format!(
            "reference mass must be > 0, got {reference_mass}"
        ))));
    }

    let Backend {
        mut load_cell,
        scale,
        ..
    } = Backend::open(cfg)?;
    let mut store = store_for(cfg);
    let mut calibrator = ScaleCalibrator::new(CalibrationCfg::from(cfg));

    if !assume_yes {
        wait_for_enter("Empty the scale")?;
    }
    scale.empty_scale();
    let outcome = calibrator.calibrate(
        &mut load_cell,
        &MonotonicClock::new(),
        &mut store,
        reference_mass,
        |grams| {
            if assume_yes {
                scale.place_reference(grams);
                Ok(())
            } else {
                wait_for_enter(&format!("Place the {grams} g reference mass"))
            }
        },
    );
    scale.refill();
    let outcome = outcome?;
    tracing::info!(
        scale_factor = outcome.scale_factor,
        previous = ?outcome.record.previous,
        store = %store.path().display(),
        "calibration complete"
    );
    Ok(outcome)
}

pub fn calibration_report(outcome: &CalibrationOutcome, json: bool) -> String {
    if json {
        json!({
            "status": "ok",
            "scale_factor": outcome.scale_factor,
            "previous": outcome.record.previous,
            "tare_counts": outcome.tare_counts,
            "reference_counts": outcome.reference_counts,
            "reference_mass": outcome.reference_mass,
        })
        .to_string()
    } else {
        format!(
            "Calibration complete: scale factor {:.4} (previous {})",
            outcome.scale_factor,
            outcome
                .record
                .previous
                .map_or_else(|| "none".to_string(), |p| format!("{p:.4}")),
        )
    }
}

pub fn self_check(cfg: &polar_config::Config, json: bool) -> eyre::Result<String> {
    let Backend {
        mut thermometer,
        mut load_cell,
        mut cooler,
        scale,
    } = Backend::open(cfg)?;
    let timeout = Duration::from_millis(cfg.hardware.sensor_read_timeout_ms);

    let temperature = thermometer
        .read_celsius()
        .map_err(|e| eyre::Report::new(polar_core::hw_error::map_hw_error(&*e)))
        .wrap_err("read thermometer")?;
    let raw = load_cell
        .read(timeout)
        .map_err(|e| eyre::Report::new(polar_core::hw_error::map_hw_error(&*e)))
        .wrap_err("read load cell")?;
    cooler
        .set_cooling(false)
        .map_err(|e| eyre::Report::new(polar_core::hw_error::map_actuator_error(&*e)))
        .wrap_err("switch cooler off")?;

    let mut store = store_for(cfg);
    let calibration: Value = match store_for_check(&mut store) {
        Ok(factor) => json!(factor),
        Err(e) => {
            tracing::warn!(error = %e, "calibration store not usable");
            Value::Null
        }
    };
    let backend = if scale.is_simulated() { "sim" } else { "hardware" };

    Ok(if json {
        json!({
            "status": "ok",
            "backend": backend,
            "temperature_c": temperature,
            "raw_counts": raw,
            "scale_factor": calibration,
        })
        .to_string()
    } else {
        format!(
            "OK ({backend}): temperature {temperature:.2} °C, load cell {raw} counts, scale factor {calibration}"
        )
    })
}

fn store_for_check(store: &mut FileCalibrationStore) -> Result<f32, PolarError> {
    conversion_from_store(store).map(|c| c.scale_factor)
}
