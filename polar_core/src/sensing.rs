//! Load cell → filtered liquid volume.

use std::time::Duration;

use polar_traits::LoadCell;

use crate::calibration::ScaleConversion;
use crate::config::SensingCfg;
use crate::error::PolarError;
use crate::filter::AdaptiveMedianFilter;
use crate::util::average_reads;

/// Owns the load cell, its conversion and the smoothing filter.
///
/// Each reading averages `samples_per_read` raw counts, converts them to
/// mass, scales by the density factor and passes the result through the
/// filter.
#[derive(Debug)]
pub struct VolumeSensor<L> {
    cell: L,
    conversion: ScaleConversion,
    filter: AdaptiveMedianFilter,
    samples_per_read: usize,
    density_factor: f32,
    timeout: Duration,
}

impl<L: LoadCell> VolumeSensor<L> {
    pub fn new(
        cell: L,
        conversion: ScaleConversion,
        cfg: &SensingCfg,
    ) -> Result<Self, PolarError> {
        if !(cfg.density_factor.is_finite() && cfg.density_factor > 0.0) {
            return Err(PolarError::InvalidConfiguration(format!(
                "density factor must be > 0, got {}",
                cfg.density_factor
            )));
        }
        Ok(Self {
            cell,
            conversion,
            filter: AdaptiveMedianFilter::new(cfg.window, cfg.outlier_threshold)?,
            samples_per_read: cfg.samples_per_read.max(1),
            density_factor: cfg.density_factor,
            timeout: Duration::from_millis(cfg.read_timeout_ms.max(1)),
        })
    }

    pub fn conversion(&self) -> ScaleConversion {
        self.conversion
    }

    /// Zero the scale with whatever is on it now.
    pub fn tare(&mut self, samples: usize) -> Result<f64, PolarError> {
        let tare_counts = average_reads(&mut self.cell, samples, self.timeout)?;
        self.conversion = self.conversion.with_tare(tare_counts);
        self.filter.reset();
        tracing::info!(tare_counts, "load cell tared");
        Ok(tare_counts)
    }

    /// Unfiltered mass in calibrated units.
    pub fn read_mass(&mut self) -> Result<f32, PolarError> {
        let raw = average_reads(&mut self.cell, self.samples_per_read, self.timeout)?;
        Ok(self.conversion.to_units(raw))
    }

    /// Filtered volume (unclamped; clamping is a control decision).
    pub fn read_volume(&mut self) -> Result<f32, PolarError> {
        let mass = self.read_mass()?;
        let volume = self.filter.filter(mass * self.density_factor);
        tracing::trace!(mass, volume, "volume sample");
        Ok(volume)
    }

    pub fn filter(&self) -> &AdaptiveMedianFilter {
        &self.filter
    }
}

impl<L: LoadCell + 'static> VolumeSensor<L> {
    /// Erase the load cell type.
    pub fn boxed(self) -> VolumeSensor<Box<dyn LoadCell>> {
        VolumeSensor {
            cell: Box::new(self.cell),
            conversion: self.conversion,
            filter: self.filter,
            samples_per_read: self.samples_per_read,
            density_factor: self.density_factor,
            timeout: self.timeout,
        }
    }
}
