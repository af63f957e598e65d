//! Load-cell averaging helpers shared by sensing and calibration.

use crate::error::PolarError;
use crate::hw_error::map_hw_error;
use polar_traits::LoadCell;
use std::time::Duration;

/// Average `n` consecutive raw reads (n is clamped to at least 1).
///
/// Any failed read aborts the average; partial averages would bias a tare.
pub fn average_reads<L: LoadCell + ?Sized>(
    cell: &mut L,
    n: usize,
    timeout: Duration,
) -> Result<f64, PolarError> {
    let n = n.max(1);
    let mut sum = 0.0f64;
    for _ in 0..n {
        let raw = cell.read(timeout).map_err(|e| map_hw_error(&*e))?;
        sum += f64::from(raw);
    }
    Ok(sum / n as f64)
}
