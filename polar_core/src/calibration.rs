//! Load-cell calibration: the raw→units conversion and the operator-driven
//! procedure that derives its scale factor.
//!
//! The procedure is an explicit state machine:
//!
//! ```text
//! Idle --tare()--> AwaitingReferenceMass --measure_reference()--> Averaging --> Persisted
//!                        ^                                            |
//!                        +------------------ failure -----------------+
//! ```
//!
//! Tare always precedes loading, and averaging always precedes the factor
//! computation. A failed measurement never touches the store.

use std::time::Duration;

use polar_traits::{Clock, LoadCell};

use crate::config::CalibrationCfg;
use crate::error::{PolarError, Result};
use crate::store::CalibrationStore;
use crate::util::average_reads;

/// Persisted calibration: the active factor plus the one it replaced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRecord {
    pub scale_factor: f32,
    pub previous: Option<f32>,
}

#[inline]
fn usable(factor: f32) -> bool {
    factor.is_finite() && factor != 0.0
}

impl CalibrationRecord {
    pub fn new(scale_factor: f32) -> Self {
        Self {
            scale_factor,
            previous: None,
        }
    }

    /// The factor to convert with: the current one when usable, otherwise
    /// the previous one. `None` when neither can divide raw counts.
    pub fn effective_factor(&self) -> Option<f32> {
        if usable(self.scale_factor) {
            Some(self.scale_factor)
        } else {
            self.previous.filter(|p| usable(*p))
        }
    }

    /// Record produced by overwriting this one with `scale_factor`.
    pub fn replaced_by(&self, scale_factor: f32) -> Self {
        Self {
            scale_factor,
            previous: self.effective_factor().or(self.previous),
        }
    }
}

/// Raw counts → physical units: `(raw - tare_counts) / scale_factor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleConversion {
    pub tare_counts: f64,
    pub scale_factor: f32,
}

impl ScaleConversion {
    pub fn new(scale_factor: f32) -> std::result::Result<Self, PolarError> {
        if !usable(scale_factor) {
            return Err(PolarError::InvalidCalibration(format!(
                "scale factor must be finite and non-zero, got {scale_factor}"
            )));
        }
        Ok(Self {
            tare_counts: 0.0,
            scale_factor,
        })
    }

    pub fn with_tare(mut self, tare_counts: f64) -> Self {
        self.tare_counts = tare_counts;
        self
    }

    #[inline]
    pub fn to_units(&self, raw: f64) -> f32 {
        ((raw - self.tare_counts) / f64::from(self.scale_factor)) as f32
    }
}

/// Where the procedure currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationPhase {
    Idle,
    /// Tare done; waiting for the operator to place the reference mass.
    AwaitingReferenceMass { tare_counts: f64 },
    /// Loaded readings are being acquired.
    Averaging { tare_counts: f64 },
    /// Factor computed and written to the store.
    Persisted(CalibrationOutcome),
}

/// Result of a successful calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationOutcome {
    pub scale_factor: f32,
    pub tare_counts: f64,
    /// Averaged loaded reading relative to the tare.
    pub reference_counts: f64,
    pub reference_mass: f32,
    pub record: CalibrationRecord,
}

impl CalibrationOutcome {
    /// Conversion ready for use right after calibrating (tare included).
    pub fn conversion(&self) -> ScaleConversion {
        ScaleConversion {
            tare_counts: self.tare_counts,
            scale_factor: self.scale_factor,
        }
    }
}

fn check_reference_mass(reference_mass: f32) -> std::result::Result<(), PolarError> {
    if reference_mass.is_finite() && reference_mass > 0.0 {
        Ok(())
    } else {
        Err(PolarError::InvalidCalibration(format!(
            "reference mass must be > 0, got {reference_mass}"
        )))
    }
}

/// Single-pass, operator-triggered calibration. Not re-entrant: it borrows
/// the load cell mutably for the whole procedure, so it cannot overlap with
/// normal sensing.
#[derive(Debug)]
pub struct ScaleCalibrator {
    cfg: CalibrationCfg,
    phase: CalibrationPhase,
}

impl ScaleCalibrator {
    pub fn new(cfg: CalibrationCfg) -> Self {
        Self {
            cfg,
            phase: CalibrationPhase::Idle,
        }
    }

    pub fn phase(&self) -> &CalibrationPhase {
        &self.phase
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.cfg.read_timeout_ms)
    }

    /// Discard any previous zero reference and tare with the scale unloaded.
    pub fn tare<L: LoadCell + ?Sized>(&mut self, cell: &mut L) -> Result<f64> {
        self.phase = CalibrationPhase::Idle;
        let n = self.cfg.tare_samples.max(10);
        let tare_counts = average_reads(cell, n, self.timeout())
            .map_err(|e| eyre::Report::new(e).wrap_err("tare"))?;
        tracing::info!(tare_counts, samples = n, "tare complete");
        self.phase = CalibrationPhase::AwaitingReferenceMass { tare_counts };
        Ok(tare_counts)
    }

    /// Reference mass is in place: settle, average, compute and persist.
    ///
    /// Requires a prior [`tare`](Self::tare). On failure the calibrator
    /// returns to `AwaitingReferenceMass` so the step can be retried.
    pub fn measure_reference<L, C, S>(
        &mut self,
        cell: &mut L,
        clock: &C,
        store: &mut S,
        reference_mass: f32,
    ) -> Result<CalibrationOutcome>
    where
        L: LoadCell + ?Sized,
        C: Clock + ?Sized,
        S: CalibrationStore + ?Sized,
    {
        let tare_counts = match self.phase {
            CalibrationPhase::AwaitingReferenceMass { tare_counts } => tare_counts,
            ref other => {
                return Err(eyre::Report::new(PolarError::State(format!(
                    "reference measurement requires a tare first (phase: {other:?})"
                ))));
            }
        };
        check_reference_mass(reference_mass).map_err(eyre::Report::new)?;

        self.phase = CalibrationPhase::Averaging { tare_counts };
        let outcome = self.average_and_persist(cell, clock, store, tare_counts, reference_mass);
        match outcome {
            Ok(o) => {
                self.phase = CalibrationPhase::Persisted(o);
                Ok(o)
            }
            Err(e) => {
                self.phase = CalibrationPhase::AwaitingReferenceMass { tare_counts };
                Err(e)
            }
        }
    }

    fn average_and_persist<L, C, S>(
        &self,
        cell: &mut L,
        clock: &C,
        store: &mut S,
        tare_counts: f64,
        reference_mass: f32,
    ) -> Result<CalibrationOutcome>
    where
        L: LoadCell + ?Sized,
        C: Clock + ?Sized,
        S: CalibrationStore + ?Sized,
    {
        clock.sleep(Duration::from_millis(self.cfg.settle_ms));
        let n = self.cfg.reference_samples.max(100);
        let loaded = average_reads(cell, n, self.timeout())
            .map_err(|e| eyre::Report::new(e).wrap_err("reference reading"))?;
        let reference_counts = loaded - tare_counts;
        if !reference_counts.is_finite() {
            return Err(eyre::Report::new(PolarError::InvalidCalibration(
                "reference reading is not finite".into(),
            )));
        }
        let scale_factor = (reference_counts / f64::from(reference_mass)) as f32;
        if !usable(scale_factor) {
            return Err(eyre::Report::new(PolarError::InvalidCalibration(format!(
                "no load detected (reading {reference_counts:.1} counts above tare)"
            ))));
        }
        tracing::info!(
            reference_counts,
            reference_mass,
            scale_factor,
            "calibration factor computed"
        );
        let record = store.save(scale_factor)?;
        Ok(CalibrationOutcome {
            scale_factor,
            tare_counts,
            reference_counts,
            reference_mass,
            record,
        })
    }

    /// Run the whole procedure. `await_placement` is the external trigger:
    /// it returns once the operator has placed the reference mass (or an
    /// error to abandon the calibration).
    pub fn calibrate<L, C, S, F>(
        &mut self,
        cell: &mut L,
        clock: &C,
        store: &mut S,
        reference_mass: f32,
        await_placement: F,
    ) -> Result<CalibrationOutcome>
    where
        L: LoadCell + ?Sized,
        C: Clock + ?Sized,
        S: CalibrationStore + ?Sized,
        F: FnOnce(f32) -> Result<()>,
    {
        check_reference_mass(reference_mass).map_err(eyre::Report::new)?;
        self.tare(cell)?;
        await_placement(reference_mass)?;
        self.measure_reference(cell, clock, store, reference_mass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_factor_falls_back_to_previous() {
        let rec = CalibrationRecord {
            scale_factor: f32::NAN,
            previous: Some(420.0),
        };
        assert_eq!(rec.effective_factor(), Some(420.0));
        let rec = CalibrationRecord {
            scale_factor: 0.0,
            previous: None,
        };
        assert_eq!(rec.effective_factor(), None);
    }

    #[test]
    fn replaced_by_keeps_old_factor_as_previous() {
        let rec = CalibrationRecord::new(-0.92).replaced_by(421.0);
        assert_eq!(rec.scale_factor, 421.0);
        assert_eq!(rec.previous, Some(-0.92));
    }

    #[test]
    fn conversion_subtracts_tare_and_divides() {
        let conv = ScaleConversion::new(420.0).unwrap().with_tare(8_400.0);
        let units = conv.to_units(8_400.0 + 420.0 * 250.0);
        assert!((units - 250.0).abs() < 1e-3);
    }

    #[test]
    fn zero_factor_is_not_a_conversion() {
        let err = ScaleConversion::new(0.0).unwrap_err();
        assert!(matches!(err, PolarError::InvalidCalibration(_)));
    }
}
