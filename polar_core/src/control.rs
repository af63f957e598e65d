//! The per-cycle control logic: clamp, decide, estimate, actuate, publish.

use std::sync::Arc;
use std::time::Instant;

use polar_traits::{Clock, Cooler, LoadCell, Thermometer};

use crate::config::ControlCfg;
use crate::error::PolarError;
use crate::hw_error::{map_actuator_error, map_hw_error};
use crate::sensing::VolumeSensor;
use crate::status::CycleStatus;
use crate::telemetry::TelemetrySink;

/// Snapshot of one control cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleState {
    /// Monotonic cycle counter, starting at 0.
    pub seq: u64,
    /// Milliseconds since the loop was built.
    pub uptime_ms: u64,
    pub temperature_c: f32,
    /// Filtered volume after clamping.
    pub volume: f32,
    pub needs_cooling: bool,
    /// `(temperature - target) / efficiency`; `+inf` when efficiency is 0,
    /// negative when already below target.
    pub time_to_target: f32,
}

/// Clamp a volume into `[min, max]`. NaN maps to `min`.
#[inline]
pub fn clamp_volume(volume: f32, min: f32, max: f32) -> f32 {
    if volume.is_nan() {
        return min;
    }
    volume.clamp(min, max)
}

/// Binary cooling decision.
///
/// With `deadband_c == 0` this is `temperature > target`. With a positive
/// deadband the cooler switches on above `target + deadband`, off below
/// `target - deadband`, and keeps `previous` in between.
#[inline]
pub fn cooling_decision(temperature: f32, target: f32, deadband_c: f32, previous: bool) -> bool {
    if deadband_c <= 0.0 {
        return temperature > target;
    }
    if temperature > target + deadband_c {
        true
    } else if temperature < target - deadband_c {
        false
    } else {
        previous
    }
}

/// Estimated time to reach the target at the configured cooling rate.
#[inline]
pub fn time_to_target(temperature: f32, target: f32, efficiency: f32) -> f32 {
    if efficiency == 0.0 {
        return f32::INFINITY;
    }
    (temperature - target) / efficiency
}

/// Running totals over the life of a loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub skipped: u64,
    pub temperature_failures: u64,
    pub volume_failures: u64,
    pub actuator_failures: u64,
    pub telemetry_failures: u64,
}

/// Single-threaded control loop over boxed collaborators.
///
/// Built with [`ControlLoop::builder`]. Not re-entrant; each `step`/`tick`
/// runs to completion.
pub struct ControlLoop {
    pub(crate) thermometer: Box<dyn Thermometer>,
    pub(crate) volume: VolumeSensor<Box<dyn LoadCell>>,
    pub(crate) cooler: Box<dyn Cooler>,
    pub(crate) telemetry: Box<dyn TelemetrySink>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) cfg: ControlCfg,
    pub(crate) epoch: Instant,
    pub(crate) seq: u64,
    pub(crate) cooling: bool,
    pub(crate) engaged: Option<bool>,
    pub(crate) last_temperature: Option<f32>,
    pub(crate) last_volume: Option<f32>,
    pub(crate) stats: LoopStats,
}

impl core::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("cfg", &self.cfg)
            .field("seq", &self.seq)
            .field("cooling", &self.cooling)
            .field("last_temperature", &self.last_temperature)
            .field("last_volume", &self.last_volume)
            .finish()
    }
}

impl ControlLoop {
    pub fn cfg(&self) -> &ControlCfg {
        &self.cfg
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Last cooling decision.
    pub fn is_cooling(&self) -> bool {
        self.cooling
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    /// Derive, actuate and publish from already-acquired readings.
    pub fn tick(&mut self, temperature_c: f32, filtered_volume: f32) -> CycleState {
        let cfg = &self.cfg;
        let volume = clamp_volume(filtered_volume, cfg.volume_min, cfg.volume_max);
        let needs_cooling = cooling_decision(
            temperature_c,
            cfg.target_temperature_c,
            cfg.deadband_c,
            self.cooling,
        );
        let ttt = time_to_target(
            temperature_c,
            cfg.target_temperature_c,
            cfg.cooling_efficiency,
        );

        let state = CycleState {
            seq: self.seq,
            uptime_ms: self.clock.ms_since(self.epoch),
            temperature_c,
            volume,
            needs_cooling,
            time_to_target: ttt,
        };
        self.seq = self.seq.wrapping_add(1);
        self.cooling = needs_cooling;
        self.stats.cycles += 1;

        self.actuate(needs_cooling);
        if let Err(e) = self.telemetry.publish(&state) {
            self.stats.telemetry_failures += 1;
            tracing::warn!(seq = state.seq, error = %e, "telemetry publish failed");
        }

        tracing::debug!(
            seq = state.seq,
            temperature_c,
            volume,
            needs_cooling,
            time_to_target = ttt,
            "cycle"
        );
        state
    }

    fn actuate(&mut self, on: bool) {
        match self.cooler.set_cooling(on) {
            Ok(()) => {
                if self.engaged != Some(on) {
                    tracing::info!(cooling = on, "cooler switched");
                }
                self.engaged = Some(on);
            }
            Err(e) => {
                self.stats.actuator_failures += 1;
                let err = map_actuator_error(&*e);
                tracing::error!(error = %err, cooling = on, "cooler command failed");
            }
        }
    }

    /// One full cycle including sensor reads.
    ///
    /// Failed reads fall back to the last good value; with no history the
    /// cycle is skipped and nothing is actuated.
    pub fn step(&mut self) -> CycleStatus {
        let temperature = match self.thermometer.read_celsius() {
            Ok(t) if t.is_finite() => {
                self.last_temperature = Some(t);
                Some(t)
            }
            Ok(t) => {
                self.stats.temperature_failures += 1;
                tracing::warn!(reading = t, "non-finite temperature, reusing last");
                self.last_temperature
            }
            Err(e) => {
                self.stats.temperature_failures += 1;
                let err = map_hw_error(&*e);
                tracing::warn!(error = %err, "temperature read failed, reusing last");
                self.last_temperature
            }
        };

        let volume = match self.volume.read_volume() {
            Ok(v) if v.is_finite() => {
                self.last_volume = Some(v);
                Some(v)
            }
            Ok(v) => {
                self.stats.volume_failures += 1;
                tracing::warn!(reading = v, "non-finite volume, reusing last");
                self.last_volume
            }
            Err(err) => {
                self.stats.volume_failures += 1;
                tracing::warn!(error = %err, "volume read failed, reusing last");
                self.last_volume
            }
        };

        match (temperature, volume) {
            (Some(t), Some(v)) => CycleStatus::Updated(self.tick(t, v)),
            (None, _) => self.skip(PolarError::SensorUnavailable(
                "no temperature reading yet".into(),
            )),
            (_, None) => self.skip(PolarError::SensorUnavailable(
                "no volume reading yet".into(),
            )),
        }
    }

    fn skip(&mut self, reason: PolarError) -> CycleStatus {
        self.stats.skipped += 1;
        tracing::warn!(error = %reason, "cycle skipped");
        CycleStatus::Skipped(reason)
    }

    /// Turn the cooler off regardless of the last decision.
    pub fn disengage(&mut self) -> Result<(), PolarError> {
        self.cooling = false;
        self.cooler.set_cooling(false).map_err(|e| {
            self.stats.actuator_failures += 1;
            map_actuator_error(&*e)
        })?;
        self.engaged = Some(false);
        tracing::info!("cooler disengaged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(-50.0, 10.0)]
    #[case(5000.0, 1000.0)]
    #[case(500.0, 500.0)]
    #[case(10.0, 10.0)]
    #[case(1000.0, 1000.0)]
    fn clamps_into_bounds(#[case] input: f32, #[case] expected: f32) {
        assert_eq!(clamp_volume(input, 10.0, 1000.0), expected);
    }

    #[test]
    fn nan_volume_clamps_to_min() {
        assert_eq!(clamp_volume(f32::NAN, 10.0, 1000.0), 10.0);
    }

    #[rstest]
    #[case(30.0, 25.0, true)]
    #[case(25.0, 25.0, false)]
    #[case(20.0, 25.0, false)]
    fn strict_decision(#[case] t: f32, #[case] target: f32, #[case] expected: bool) {
        assert_eq!(cooling_decision(t, target, 0.0, !expected), expected);
    }

    #[test]
    fn deadband_holds_previous_inside_band() {
        assert!(cooling_decision(25.3, 25.0, 0.5, true));
        assert!(!cooling_decision(25.3, 25.0, 0.5, false));
        assert!(cooling_decision(25.6, 25.0, 0.5, false));
        assert!(!cooling_decision(24.4, 25.0, 0.5, true));
    }

    #[test]
    fn time_to_target_examples() {
        assert_eq!(time_to_target(30.0, 25.0, 0.5), 10.0);
        assert_eq!(time_to_target(20.0, 25.0, 0.5), -10.0);
        assert_eq!(time_to_target(30.0, 25.0, 0.0), f32::INFINITY);
    }
}
