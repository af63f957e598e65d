//! Type-state builder for `ControlLoop`.
//!
//! `build()` only exists once the thermometer, volume sensor and cooler are
//! set. `try_build()` is always available and reports the missing part.

use std::marker::PhantomData;
use std::sync::Arc;

use polar_traits::{Clock, Cooler, LoadCell, MonotonicClock, Thermometer};

use crate::config::ControlCfg;
use crate::control::{ControlLoop, LoopStats};
use crate::error::{BuildError, Result};
use crate::sensing::VolumeSensor;
use crate::telemetry::{NullTelemetry, TelemetrySink};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `ControlLoop`. Fields are validated on build.
pub struct ControlLoopBuilder<T, V, C> {
    thermometer: Option<Box<dyn Thermometer>>,
    volume: Option<VolumeSensor<Box<dyn LoadCell>>>,
    cooler: Option<Box<dyn Cooler>>,
    control: Option<ControlCfg>,
    telemetry: Option<Box<dyn TelemetrySink>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _t: PhantomData<T>,
    _v: PhantomData<V>,
    _c: PhantomData<C>,
}

impl Default for ControlLoopBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            thermometer: None,
            volume: None,
            cooler: None,
            control: None,
            telemetry: None,
            clock: None,
            _t: PhantomData,
            _v: PhantomData,
            _c: PhantomData,
        }
    }
}

impl ControlLoop {
    /// Start building a control loop.
    pub fn builder() -> ControlLoopBuilder<Missing, Missing, Missing> {
        ControlLoopBuilder::default()
    }
}

fn validate_control(cfg: &ControlCfg) -> std::result::Result<(), BuildError> {
    if !cfg.target_temperature_c.is_finite() {
        return Err(BuildError::InvalidConfig("target temperature must be finite"));
    }
    if !cfg.cooling_efficiency.is_finite() || cfg.cooling_efficiency <= 0.0 {
        return Err(BuildError::InvalidConfig("cooling efficiency must be > 0"));
    }
    if !(cfg.volume_min.is_finite() && cfg.volume_max.is_finite())
        || cfg.volume_min > cfg.volume_max
    {
        return Err(BuildError::InvalidConfig("volume bounds must satisfy min <= max"));
    }
    if !cfg.deadband_c.is_finite() || cfg.deadband_c < 0.0 {
        return Err(BuildError::InvalidConfig("deadband must be >= 0"));
    }
    Ok(())
}

impl<T, V, C> ControlLoopBuilder<T, V, C> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<ControlLoop> {
        let thermometer = self
            .thermometer
            .ok_or_else(|| eyre::Report::new(BuildError::MissingThermometer))?;
        let volume = self
            .volume
            .ok_or_else(|| eyre::Report::new(BuildError::MissingVolumeSensor))?;
        let cooler = self
            .cooler
            .ok_or_else(|| eyre::Report::new(BuildError::MissingCooler))?;
        let cfg = self
            .control
            .ok_or_else(|| eyre::Report::new(BuildError::MissingControl))?;
        validate_control(&cfg).map_err(eyre::Report::new)?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()) as Arc<dyn Clock + Send + Sync>);
        let epoch = clock.now();
        Ok(ControlLoop {
            thermometer,
            volume,
            cooler,
            telemetry: self
                .telemetry
                .unwrap_or_else(|| Box::new(NullTelemetry) as Box<dyn TelemetrySink>),
            clock,
            cfg,
            epoch,
            seq: 0,
            cooling: false,
            engaged: None,
            last_temperature: None,
            last_volume: None,
            stats: LoopStats::default(),
        })
    }

    /// Cycle parameters; required.
    pub fn with_control(mut self, control: ControlCfg) -> Self {
        self.control = Some(control);
        self
    }

    /// Defaults to [`NullTelemetry`].
    pub fn with_telemetry(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.telemetry = Some(Box::new(sink));
        self
    }

    /// Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }
}

impl ControlLoopBuilder<Set, Set, Set> {
    pub fn build(self) -> Result<ControlLoop> {
        self.try_build()
    }
}

// Setters that advance type-state
impl<V, C> ControlLoopBuilder<Missing, V, C> {
    pub fn with_thermometer(
        self,
        thermometer: impl Thermometer + 'static,
    ) -> ControlLoopBuilder<Set, V, C> {
        ControlLoopBuilder {
            thermometer: Some(Box::new(thermometer)),
            volume: self.volume,
            cooler: self.cooler,
            control: self.control,
            telemetry: self.telemetry,
            clock: self.clock,
            _t: PhantomData,
            _v: PhantomData,
            _c: PhantomData,
        }
    }
}

impl<T, C> ControlLoopBuilder<T, Missing, C> {
    pub fn with_volume_sensor<L: LoadCell + 'static>(
        self,
        volume: VolumeSensor<L>,
    ) -> ControlLoopBuilder<T, Set, C> {
        ControlLoopBuilder {
            thermometer: self.thermometer,
            volume: Some(volume.boxed()),
            cooler: self.cooler,
            control: self.control,
            telemetry: self.telemetry,
            clock: self.clock,
            _t: PhantomData,
            _v: PhantomData,
            _c: PhantomData,
        }
    }
}

impl<T, V> ControlLoopBuilder<T, V, Missing> {
    pub fn with_cooler(self, cooler: impl Cooler + 'static) -> ControlLoopBuilder<T, V, Set> {
        ControlLoopBuilder {
            thermometer: self.thermometer,
            volume: self.volume,
            cooler: Some(Box::new(cooler)),
            control: self.control,
            telemetry: self.telemetry,
            clock: self.clock,
            _t: PhantomData,
            _v: PhantomData,
            _c: PhantomData,
        }
    }
}
