use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use polar_hardware::error::HwError;
use polar_hardware::util::{mlx_word_to_celsius, sign_extend_24, wait_until_low_with_timeout};
use rstest::rstest;

#[test]
fn wait_until_low_success_path() {
    let high = Arc::new(AtomicBool::new(true));
    let high_bg = high.clone();
    // Flip low after a short delay
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        high_bg.store(false, Ordering::Relaxed);
    });

    let res = wait_until_low_with_timeout(
        || high.load(Ordering::Relaxed),
        Duration::from_millis(200),
        Duration::from_micros(200),
    );
    assert!(res.is_ok(), "expected success, got {res:?}");
}

#[test]
fn wait_until_low_timeout_path() {
    let high = Arc::new(AtomicBool::new(true));

    let err = wait_until_low_with_timeout(
        || high.load(Ordering::Relaxed),
        Duration::from_millis(5),
        Duration::from_micros(200),
    )
    .expect_err("expected timeout error");

    match err {
        HwError::DataReadyTimeout => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

#[rstest]
#[case(0x00_0000, 0)]
#[case(0x00_0001, 1)]
#[case(0x7F_FFFF, 8_388_607)]
#[case(0x80_0000, -8_388_608)]
#[case(0xFF_FFFF, -1)]
fn hx711_frames_sign_extend(#[case] frame: u32, #[case] expected: i32) {
    assert_eq!(sign_extend_24(frame), expected);
}

#[test]
fn mlx_word_converts_kelvin_fiftieths() {
    // 0x3AF7 = 15095 -> 301.9 K -> 28.75 °C
    let c = mlx_word_to_celsius(0x3AF7).expect("valid word");
    assert!((c - 28.75).abs() < 0.01, "got {c}");
}

#[test]
fn mlx_error_flag_is_rejected() {
    let err = mlx_word_to_celsius(0x8000).expect_err("flag set");
    assert!(matches!(err, HwError::ProbeFlag(0x8000)));
}
