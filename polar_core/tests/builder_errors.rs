use polar_core::error::BuildError;
use polar_core::mocks::{RecordingCooler, ScriptedLoadCell, ScriptedThermometer};
use polar_core::{ControlCfg, ControlLoop, ScaleConversion, SensingCfg, VolumeSensor};
use rstest::rstest;

fn sensor() -> VolumeSensor<ScriptedLoadCell> {
    VolumeSensor::new(
        ScriptedLoadCell::constant(0),
        ScaleConversion::new(1.0).unwrap(),
        &SensingCfg::default(),
    )
    .unwrap()
}

fn build_error(err: &eyre::Report) -> &BuildError {
    err.downcast_ref::<BuildError>()
        .unwrap_or_else(|| panic!("expected BuildError, got: {err:?}"))
}

#[rstest]
fn missing_thermometer_yields_typed_build_error() {
    let err = ControlLoop::builder()
        .with_volume_sensor(sensor())
        .with_cooler(RecordingCooler::default())
        .with_control(ControlCfg::default())
        .try_build()
        .expect_err("should fail with MissingThermometer");
    assert!(matches!(build_error(&err), BuildError::MissingThermometer));
}

#[rstest]
fn missing_cooler_yields_typed_build_error() {
    let err = ControlLoop::builder()
        .with_thermometer(ScriptedThermometer::constant(20.0))
        .with_volume_sensor(sensor())
        .with_control(ControlCfg::default())
        .try_build()
        .expect_err("should fail with MissingCooler");
    assert!(matches!(build_error(&err), BuildError::MissingCooler));
}

#[rstest]
fn missing_control_yields_typed_build_error() {
    let err = ControlLoop::builder()
        .with_thermometer(ScriptedThermometer::constant(20.0))
        .with_volume_sensor(sensor())
        .with_cooler(RecordingCooler::default())
        .build()
        .expect_err("should fail with MissingControl");
    assert!(matches!(build_error(&err), BuildError::MissingControl));
}

#[rstest]
#[case(ControlCfg { cooling_efficiency: 0.0, ..ControlCfg::default() })]
#[case(ControlCfg { volume_min: 500.0, volume_max: 100.0, ..ControlCfg::default() })]
#[case(ControlCfg { deadband_c: -1.0, ..ControlCfg::default() })]
#[case(ControlCfg { target_temperature_c: f32::NAN, ..ControlCfg::default() })]
fn invalid_control_is_rejected(#[case] cfg: ControlCfg) {
    let err = ControlLoop::builder()
        .with_thermometer(ScriptedThermometer::constant(20.0))
        .with_volume_sensor(sensor())
        .with_cooler(RecordingCooler::default())
        .with_control(cfg)
        .build()
        .expect_err("invalid control config");
    assert!(matches!(build_error(&err), BuildError::InvalidConfig(_)));
}
