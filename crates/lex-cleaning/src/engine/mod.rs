//! Execution engine.
//!
//! This module provides the [`CleaningEngine`], which drives one run:
//! profile, plan, execute, validate, report. It also holds the run's
//! supporting pieces: the [`EngineState`] machine, the bounded
//! [`AgentMemory`], and progress/cancellation plumbing.

mod builder;
mod memory;
pub mod progress;
mod state;

pub use builder::{CleaningEngine, CleaningEngineBuilder};
pub use memory::AgentMemory;
pub use progress::{
    CancellationToken, CleaningStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
pub use state::EngineState;

use polars::prelude::DataFrame;
use serde::Serialize;

use crate::types::{MemoryEntry, Plan, Report};

/// Everything a completed run produces.
#[derive(Debug, Clone, Serialize)]
pub struct CleaningOutcome {
    #[serde(skip)]
    pub dataset: DataFrame,
    pub report: Report,
    /// Most recent entries, oldest first; at most `memory_size` long.
    pub memory: Vec<MemoryEntry>,
    /// The plan as chosen, including steps that were skipped.
    pub plan: Plan,
    /// Plan steps attempted, not counting the initial inspection.
    pub iterations: usize,
    pub state: EngineState,
}
