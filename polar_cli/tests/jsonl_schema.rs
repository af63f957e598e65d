use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_config(dir: &tempfile::TempDir, extra: &str) -> PathBuf {
    let store = dir.path().join("cal.toml");
    let toml = format!(
        r#"
[control]
target_temperature_c = 25.0
cooling_efficiency = 0.5
period_ms = 10

[calibration]
settle_ms = 10
store_path = "{}"

{extra}
"#,
        store.display().to_string().replace('\\', "/")
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("bad JSON line {l:?}: {e}")))
        .collect()
}

fn calibrate(cfg: &PathBuf) -> serde_json::Value {
    let out = Command::cargo_bin("polar")
        .unwrap()
        .arg("--config")
        .arg(cfg)
        .args(["--json", "calibrate", "--mass", "100", "--yes"])
        .output()
        .unwrap();
    assert!(out.status.success(), "calibrate failed: {out:?}");
    json_lines(&out.stdout).pop().expect("calibration report")
}

#[rstest]
fn calibrate_reports_sim_scale_factor() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let report = calibrate(&cfg);

    assert_eq!(report["status"], "ok");
    let factor = report["scale_factor"].as_f64().unwrap();
    // Sim amplifier: 420 counts per gram, +/-40 counts of noise.
    assert!((415.0..425.0).contains(&factor), "factor {factor}");
    assert!((report["previous"].as_f64().unwrap() + 0.92).abs() < 1e-4);
}

#[rstest]
fn run_emits_one_json_object_per_cycle() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    calibrate(&cfg);

    let out = Command::cargo_bin("polar")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["--json", "run", "--cycles", "3"])
        .output()
        .unwrap();
    assert!(out.status.success(), "run failed: {out:?}");

    let lines = json_lines(&out.stdout);
    assert_eq!(lines.len(), 3);
    for (i, v) in lines.iter().enumerate() {
        for key in [
            "seq",
            "uptime_ms",
            "temperature_c",
            "volume_ml",
            "needs_cooling",
            "time_to_target",
        ] {
            assert!(v.get(key).is_some(), "missing {key} in {v}");
        }
        assert_eq!(v["seq"], i as u64);
        let volume = v["volume_ml"].as_f64().unwrap();
        // 350 g of water in the sim cup.
        assert!((340.0..360.0).contains(&volume), "volume {volume}");
    }
    // The sim starts at 30 °C against a 25 °C target.
    assert_eq!(lines[0]["needs_cooling"], true);
    assert!((lines[0]["time_to_target"].as_f64().unwrap() - 10.0).abs() < 1e-3);
}

#[rstest]
fn cold_liquid_does_not_cool() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let out = Command::cargo_bin("polar")
        .unwrap()
        .env("POLAR_SIM_INITIAL_C", "20")
        .arg("--config")
        .arg(&cfg)
        .args(["--json", "run", "--cycles", "2"])
        .output()
        .unwrap();
    assert!(out.status.success());
    for v in json_lines(&out.stdout) {
        assert_eq!(v["needs_cooling"], false);
    }
}

#[rstest]
fn uncalibrated_volume_is_clamped_to_minimum() {
    // The default factor is negative, so a loaded scale reads below zero.
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let out = Command::cargo_bin("polar")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["--json", "run", "--cycles", "1"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let lines = json_lines(&out.stdout);
    assert_eq!(lines[0]["volume_ml"], 10.0);
}

#[rstest]
fn csv_log_records_each_cycle() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("cycles.csv");
    let cfg = write_config(
        &dir,
        &format!(
            "[telemetry]\ncsv_file = \"{}\"\n",
            csv.display().to_string().replace('\\', "/")
        ),
    );

    Command::cargo_bin("polar")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--cycles", "4"])
        .assert()
        .success();

    let text = fs::read_to_string(&csv).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("seq,uptime_ms,temperature_c,volume_ml,needs_cooling,time_to_target")
    );
    assert_eq!(lines.count(), 4);
}

#[rstest]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let out = Command::cargo_bin("polar")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["--json", "calibrate", "--mass", "0", "--yes"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&out.stderr);
    let last = stderr
        .lines()
        .rev()
        .find(|l| l.contains("\"reason\""))
        .expect("json error line");
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["reason"], "InvalidCalibration");
}
