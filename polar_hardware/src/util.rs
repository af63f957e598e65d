use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Wait until the provided `is_high` predicate becomes false (i.e., line goes low),
/// or a timeout expires. Sleeps in small intervals to avoid CPU spinning.
pub fn wait_until_low_with_timeout(
    mut is_high: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while is_high() {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Convert an MLX90614 temperature register word (0.02 K per LSB) to °C.
/// Bit 15 is the sensor's error flag.
pub fn mlx_word_to_celsius(word: u16) -> Result<f32> {
    if word & 0x8000 != 0 {
        return Err(HwError::ProbeFlag(word));
    }
    Ok(f32::from(word) * 0.02 - 273.15)
}

/// Sign-extend a 24-bit two's complement HX711 frame.
#[inline]
pub fn sign_extend_24(value: u32) -> i32 {
    ((value << 8) as i32) >> 8
}
