//! Outcome of a single `ControlLoop::step`.

use crate::control::CycleState;
use crate::error::PolarError;

#[derive(Debug, Clone, PartialEq)]
pub enum CycleStatus {
    /// Decision taken, cooler driven and snapshot published.
    Updated(CycleState),
    /// No usable reading yet; nothing was actuated.
    Skipped(PolarError),
}

impl CycleStatus {
    pub fn state(&self) -> Option<&CycleState> {
        match self {
            Self::Updated(s) => Some(s),
            Self::Skipped(_) => None,
        }
    }
}
