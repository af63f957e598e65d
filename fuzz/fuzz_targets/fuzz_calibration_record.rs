#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(record) = polar_config::load_calibration_toml(data) else {
        return;
    };
    // Whatever parsed must serialize back to something that parses again.
    if let Ok(text) = record.to_toml() {
        let again = polar_config::load_calibration_toml(&text);
        assert!(again.is_ok(), "re-parse failed for {text:?}");
    }
});
