//! Scripted collaborators for tests and dry runs.
//!
//! Each mock shares its recorded state through `Rc<RefCell<..>>` handles so a
//! test can keep observing after the mock has been boxed into a loop.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use polar_traits::{BoxError, Cooler, LoadCell, Thermometer};

use crate::control::CycleState;
use crate::telemetry::TelemetrySink;

/// Replays a script of readings; `Err` entries become read failures. Once the
/// script is exhausted the last entry repeats.
#[derive(Debug, Clone)]
pub struct ScriptedThermometer {
    script: VecDeque<Result<f32, String>>,
    last: Option<Result<f32, String>>,
}

impl ScriptedThermometer {
    pub fn new(script: impl IntoIterator<Item = Result<f32, String>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            last: None,
        }
    }

    pub fn constant(celsius: f32) -> Self {
        Self::new([Ok(celsius)])
    }
}

impl Thermometer for ScriptedThermometer {
    fn read_celsius(&mut self) -> Result<f32, BoxError> {
        if let Some(next) = self.script.pop_front() {
            self.last = Some(next);
        }
        match &self.last {
            Some(Ok(t)) => Ok(*t),
            Some(Err(e)) => Err(e.clone().into()),
            None => Err("thermometer script empty".into()),
        }
    }
}

/// Load cell fed from a shared queue of raw counts.
///
/// When the queue is empty it returns `idle` (or fails with a timeout when
/// `idle` is `None`).
#[derive(Debug, Clone, Default)]
pub struct ScriptedLoadCell {
    queue: Rc<RefCell<VecDeque<Result<i32, String>>>>,
    idle: Rc<RefCell<Option<i32>>>,
    reads: Rc<RefCell<usize>>,
}

impl ScriptedLoadCell {
    pub fn constant(raw: i32) -> Self {
        let cell = Self::default();
        cell.set_idle(Some(raw));
        cell
    }

    pub fn push(&self, reading: Result<i32, String>) {
        self.queue.borrow_mut().push_back(reading);
    }

    pub fn push_many(&self, raw: i32, n: usize) {
        let mut q = self.queue.borrow_mut();
        for _ in 0..n {
            q.push_back(Ok(raw));
        }
    }

    pub fn set_idle(&self, raw: Option<i32>) {
        *self.idle.borrow_mut() = raw;
    }

    pub fn reads(&self) -> usize {
        *self.reads.borrow()
    }
}

impl LoadCell for ScriptedLoadCell {
    fn read(&mut self, _timeout: Duration) -> Result<i32, BoxError> {
        *self.reads.borrow_mut() += 1;
        match self.queue.borrow_mut().pop_front() {
            Some(Ok(raw)) => Ok(raw),
            Some(Err(e)) => Err(e.into()),
            None => (*self.idle.borrow()).ok_or_else(|| "load cell timeout".into()),
        }
    }
}

/// Records every command; can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingCooler {
    commands: Rc<RefCell<Vec<bool>>>,
    fail: Rc<RefCell<bool>>,
}

impl RecordingCooler {
    pub fn commands(&self) -> Vec<bool> {
        self.commands.borrow().clone()
    }

    pub fn last(&self) -> Option<bool> {
        self.commands.borrow().last().copied()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.borrow_mut() = fail;
    }
}

impl Cooler for RecordingCooler {
    fn set_cooling(&mut self, on: bool) -> Result<(), BoxError> {
        if *self.fail.borrow() {
            return Err("relay not responding".into());
        }
        self.commands.borrow_mut().push(on);
        Ok(())
    }
}

/// Collects published snapshots.
#[derive(Debug, Clone, Default)]
pub struct RecordingTelemetry {
    states: Rc<RefCell<Vec<CycleState>>>,
}

impl RecordingTelemetry {
    pub fn states(&self) -> Vec<CycleState> {
        self.states.borrow().clone()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn publish(&mut self, state: &CycleState) -> Result<(), BoxError> {
        self.states.borrow_mut().push(state.clone());
        Ok(())
    }
}
