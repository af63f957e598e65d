use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal valid config for the sim backend; calibration state stays in `dir`.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let store = dir.path().join("cal.toml");
    let toml = format!(
        r#"
[control]
target_temperature_c = 25.0
cooling_efficiency = 0.5
period_ms = 10

[filter]
window = 5
outlier_threshold = 3.0
samples_per_read = 5

[calibration]
reference_mass = 100.0
settle_ms = 10
store_path = "{}"
"#,
        store.display().to_string().replace('\\', "/")
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["run", "--cycles", "2"], 0, "cycle 1:", "stdout")]
#[case(&["run", "--cycles", "1", "--yes"], 0, "cycle 0:", "stdout")]
#[case(&["self-check"], 0, "OK (sim)", "stdout")]
#[case(&["calibrate", "--yes"], 0, "Calibration complete", "stdout")]
#[case(&["calibrate", "--mass", "0", "--yes"], 4, "Calibration failed", "stderr")]
#[case(&["calibrate", "--mass", "-3", "--yes"], 4, "reference mass must be > 0", "stderr")]
#[case(&["run", "--cycles", "not-a-number"], 2, "invalid value", "stderr")]
#[case(&["bogus"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("polar").unwrap();
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn invalid_config_exits_with_3() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    fs::write(
        &path,
        "[control]\ntarget_temperature_c = 4.0\ncooling_efficiency = 0.0\n",
    )
    .unwrap();

    Command::cargo_bin("polar")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("cooling_efficiency must be > 0"));
}

#[rstest]
fn missing_config_exits_with_3() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("polar")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("run")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("read config"));
}

#[rstest]
fn failed_calibration_keeps_stored_factor() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let store = dir.path().join("cal.toml");

    Command::cargo_bin("polar")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["calibrate", "--yes"])
        .assert()
        .success();
    let before = fs::read_to_string(&store).unwrap();

    Command::cargo_bin("polar")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["calibrate", "--mass", "0", "--yes"])
        .assert()
        .code(4);
    assert_eq!(fs::read_to_string(&store).unwrap(), before);
}

#[rstest]
fn calibrate_without_confirmation_is_cancelled() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    // stdin closed: the operator never confirms.
    assert_cmd::Command::cargo_bin("polar")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["calibrate", "--mass", "100"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cancelled"));
}
