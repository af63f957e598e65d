//! Persistence of the calibration record.

use std::path::{Path, PathBuf};

use polar_config::{PersistedCalibration, load_calibration_toml};

use crate::atomic::write_atomic;
use crate::calibration::CalibrationRecord;
use crate::error::PolarError;

/// Where the scale factor lives between boots.
pub trait CalibrationStore {
    /// Current record. Stores create it with their default when absent.
    fn load(&mut self) -> Result<CalibrationRecord, PolarError>;
    /// Overwrite the factor; the replaced one becomes `previous`.
    fn save(&mut self, scale_factor: f32) -> Result<CalibrationRecord, PolarError>;
}

impl<S: CalibrationStore + ?Sized> CalibrationStore for &mut S {
    fn load(&mut self) -> Result<CalibrationRecord, PolarError> {
        (**self).load()
    }
    fn save(&mut self, scale_factor: f32) -> Result<CalibrationRecord, PolarError> {
        (**self).save(scale_factor)
    }
}

/// TOML file holding a [`PersistedCalibration`].
#[derive(Debug, Clone)]
pub struct FileCalibrationStore {
    path: PathBuf,
    default_factor: f32,
}

impl FileCalibrationStore {
    pub fn new(path: impl Into<PathBuf>, default_factor: f32) -> Self {
        Self {
            path: path.into(),
            default_factor,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, record: &CalibrationRecord) -> Result<(), PolarError> {
        let text = PersistedCalibration::from(record)
            .to_toml()
            .map_err(|e| PolarError::Store(format!("serialize calibration: {e}")))?;
        write_atomic(&self.path, text.as_bytes()).map_err(|e| {
            PolarError::Store(format!("write {}: {e}", self.path.display()))
        })
    }
}

impl CalibrationStore for FileCalibrationStore {
    fn load(&mut self) -> Result<CalibrationRecord, PolarError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let record = CalibrationRecord::new(self.default_factor);
                tracing::info!(
                    path = %self.path.display(),
                    scale_factor = self.default_factor,
                    "no calibration on disk, writing default"
                );
                self.write(&record)?;
                return Ok(record);
            }
            Err(e) => {
                return Err(PolarError::Store(format!(
                    "read {}: {e}",
                    self.path.display()
                )));
            }
        };
        let persisted = load_calibration_toml(&text).map_err(|e| {
            PolarError::Store(format!("parse {}: {e}", self.path.display()))
        })?;
        let record = CalibrationRecord::from(persisted);
        if record.effective_factor() != Some(record.scale_factor) {
            tracing::warn!(
                scale_factor = record.scale_factor,
                previous = ?record.previous,
                "stored scale factor unusable, falling back"
            );
        }
        Ok(record)
    }

    fn save(&mut self, scale_factor: f32) -> Result<CalibrationRecord, PolarError> {
        let current = self.load()?;
        let record = current.replaced_by(scale_factor);
        self.write(&record)?;
        tracing::info!(
            path = %self.path.display(),
            scale_factor,
            previous = ?record.previous,
            "calibration persisted"
        );
        Ok(record)
    }
}

/// Volatile store for tests and the simulator.
#[derive(Debug, Clone)]
pub struct MemoryCalibrationStore {
    record: CalibrationRecord,
    saves: usize,
}

impl MemoryCalibrationStore {
    pub fn new(default_factor: f32) -> Self {
        Self {
            record: CalibrationRecord::new(default_factor),
            saves: 0,
        }
    }

    pub fn record(&self) -> CalibrationRecord {
        self.record
    }

    /// Number of successful `save` calls.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl CalibrationStore for MemoryCalibrationStore {
    fn load(&mut self) -> Result<CalibrationRecord, PolarError> {
        Ok(self.record)
    }

    fn save(&mut self, scale_factor: f32) -> Result<CalibrationRecord, PolarError> {
        self.record = self.record.replaced_by(scale_factor);
        self.saves += 1;
        Ok(self.record)
    }
}
