use serde::{Deserialize, Serialize};

use crate::error::{CleaningError, Result};

/// Lifecycle of one cleaning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum EngineState {
    Idle,
    Profiling,
    Executing,
    Validating,
    Reporting,
    Done,
    /// Run stopped before plan step `step` (zero-based).
    Failed { step: usize },
}

impl EngineState {
    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(&self, next: &EngineState) -> bool {
        use EngineState::*;
        matches!(
            (self, next),
            (Idle, Profiling)
                | (Profiling, Executing)
                | (Executing, Executing)
                | (Executing, Validating)
                | (Executing, Failed { .. })
                | (Validating, Reporting)
                | (Reporting, Done)
        )
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn transition(&mut self, next: EngineState) -> Result<()> {
        if !self.can_transition_to(&next) {
            return Err(CleaningError::Internal(format!(
                "illegal engine state transition {:?} -> {:?}",
                self, next
            )));
        }
        *self = next;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Done | EngineState::Failed { .. })
    }
}
