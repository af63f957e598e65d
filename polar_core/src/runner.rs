//! Cooperative cycle driver: `step`, sleep one period, repeat.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::control::{ControlLoop, CycleState, LoopStats};
use crate::error::Result;
use crate::status::CycleStatus;

/// Sleeps are sliced so a shutdown request is honoured within this bound.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// What a finished run looked like.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub cycles: u64,
    pub skipped: u64,
    pub last: Option<CycleState>,
    pub stats: LoopStats,
    /// True when the run ended on the shutdown flag rather than the cycle cap.
    pub interrupted: bool,
}

impl ControlLoop {
    /// Loop until `shutdown` is set or `max_cycles` attempts have run, then
    /// switch the cooler off.
    ///
    /// Skipped cycles count towards `max_cycles`. Sensor and actuator
    /// failures never end the run; only a failure to disengage the cooler at
    /// the end is reported.
    pub fn run(&mut self, shutdown: &AtomicBool, max_cycles: Option<u64>) -> Result<RunSummary> {
        let period = Duration::from_millis(self.cfg().period_ms);
        let mut attempts = 0u64;
        let mut updated = 0u64;
        let mut skipped = 0u64;
        let mut last = None;
        tracing::info!(period_ms = self.cfg().period_ms, ?max_cycles, "control loop start");

        let interrupted = loop {
            if shutdown.load(Ordering::Relaxed) {
                break true;
            }
            match self.step() {
                CycleStatus::Updated(state) => {
                    updated += 1;
                    last = Some(state);
                }
                CycleStatus::Skipped(_) => skipped += 1,
            }
            attempts += 1;
            if max_cycles.is_some_and(|max| attempts >= max) {
                break false;
            }
            if self.sleep_interruptible(period, shutdown) {
                break true;
            }
        };

        self.disengage()
            .map_err(|e| eyre::Report::new(e).wrap_err("disengage cooler on shutdown"))?;
        tracing::info!(cycles = updated, skipped, interrupted, "control loop stopped");
        Ok(RunSummary {
            cycles: updated,
            skipped,
            last,
            stats: self.stats(),
            interrupted,
        })
    }

    /// Returns true if shutdown was requested while sleeping.
    fn sleep_interruptible(&self, period: Duration, shutdown: &AtomicBool) -> bool {
        let mut remaining = period;
        while !remaining.is_zero() {
            if shutdown.load(Ordering::Relaxed) {
                return true;
            }
            let slice = remaining.min(SHUTDOWN_POLL);
            self.clock().sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
        shutdown.load(Ordering::Relaxed)
    }
}
