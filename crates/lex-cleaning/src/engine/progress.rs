//! Progress reporting and cooperative cancellation for cleaning runs.
//!
//! Progress is reported at stage boundaries and once per plan step. The
//! [`CancellationToken`] is polled between plan steps only.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_cleaning::{CancellationToken, CleaningEngine, CleaningStage};
//!
//! // Stop after the second plan step has started.
//! let token = CancellationToken::new();
//! let stopper = token.clone();
//!
//! let result = CleaningEngine::builder()
//!     .cancellation_token(token)
//!     .on_progress(move |update| {
//!         if update.stage == CleaningStage::Executing && update.items_processed == Some(1) {
//!             stopper.cancel();
//!         }
//!     })
//!     .build()?
//!     .run(df);
//! assert!(result.unwrap_err().is_cancelled());
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stages of a cleaning run, as seen by progress listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStage {
    /// Run is starting
    Initializing,
    /// Computing the quality profile
    Profiling,
    /// Building the plan (rule-based or advisory)
    Planning,
    /// Executing plan steps
    Executing,
    /// Scoring the result
    Validating,
    /// Assembling the report
    Reporting,
    /// Run completed successfully
    Complete,
    /// Run was cancelled by the caller
    Cancelled,
    /// Run failed with an error
    Failed,
}

impl CleaningStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Profiling => "Profiling Dataset",
            Self::Planning => "Planning",
            Self::Executing => "Executing Plan",
            Self::Validating => "Validating",
            Self::Reporting => "Generating Report",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall run attributed to this stage (0.0 - 1.0).
    ///
    /// Weights of the working stages sum to 1.0; terminal stages weigh nothing.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.02,
            Self::Profiling | Self::Planning | Self::Validating => 0.10,
            Self::Executing => 0.60,
            Self::Reporting => 0.08,
            Self::Complete | Self::Cancelled | Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage: the summed weight of
    /// every working stage before it. `Cancelled` and `Failed` report 0.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Cancelled | Self::Failed => 0.0,
            Self::Complete => 1.0,
            stage => WORKING_STAGES
                .iter()
                .take_while(|s| *s != stage)
                .map(CleaningStage::weight)
                .sum(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled | Self::Failed)
    }
}

/// Working stages in run order.
const WORKING_STAGES: [CleaningStage; 6] = [
    CleaningStage::Initializing,
    CleaningStage::Profiling,
    CleaningStage::Planning,
    CleaningStage::Executing,
    CleaningStage::Validating,
    CleaningStage::Reporting,
];

/// Progress update emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: CleaningStage,

    /// Current plan step, e.g. "Step: remove_duplicates"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    /// Plan steps started so far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    /// Plan length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: CleaningStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let stage_progress = stage_progress.clamp(0.0, 1.0);
        Self {
            stage,
            sub_stage: None,
            progress: (stage.base_progress() + stage.weight() * stage_progress).clamp(0.0, 1.0),
            stage_progress,
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Update for one plan step; stage progress is `current / total`.
    pub fn with_items(
        stage: CleaningStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            sub_stage: Some(sub_stage.into()),
            items_processed: Some(current),
            items_total: Some(total),
            ..Self::new(stage, stage_progress, message)
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(CleaningStage::Complete, 1.0, message)
    }

    pub fn cancelled() -> Self {
        Self::new(CleaningStage::Cancelled, 0.0, "Cleaning run cancelled by user")
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(CleaningStage::Failed, 0.0, message)
    }
}

/// Trait for receiving progress updates during a run.
///
/// Implementations must be `Send + Sync` so that a run on a background
/// thread can report to listeners owned elsewhere.
pub trait ProgressReporter: Send + Sync {
    /// Called once per stage boundary and once per plan step.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Token for cancelling a run.
///
/// Clones share one flag. The engine checks it before every plan step and
/// returns [`CleaningError::Cancelled`](crate::error::CleaningError::Cancelled)
/// once it is set; an operation already in progress is never interrupted.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Safe to call from any thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Clear the flag so the token can be reused for another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_token_clones_share_one_flag() {
        let engine_side = CancellationToken::default();
        let caller_side = engine_side.clone();

        caller_side.cancel();
        assert!(engine_side.is_cancelled());

        engine_side.reset();
        assert!(!caller_side.is_cancelled());
    }

    #[test]
    fn test_progress_update_with_items() {
        let update = ProgressUpdate::with_items(
            CleaningStage::Executing,
            "Step: remove_duplicates",
            3,
            6,
            "Removing duplicates",
        );
        assert_eq!(update.stage_progress, 0.5);
        assert!((update.progress - 0.52).abs() < 1e-6);
        assert_eq!(update.items_total, Some(6));
    }

    #[test]
    fn test_stage_weights_sum_to_one() {
        let stages = WORKING_STAGES;
        let total: f32 = stages.iter().map(|s| s.weight()).sum();
        assert!((total - 1.0).abs() < 0.01);

        // Each stage starts where the previous one ends.
        for pair in stages.windows(2) {
            let end = pair[0].base_progress() + pair[0].weight();
            assert!((end - pair[1].base_progress()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_terminal_updates() {
        let done = ProgressUpdate::complete("Done");
        assert_eq!(done.progress, 1.0);
        assert!(done.stage.is_terminal());

        let failed = ProgressUpdate::failed("boom");
        assert_eq!(failed.progress, 0.0);
        assert_eq!(failed.message, "boom");
        assert!(!CleaningStage::Executing.is_terminal());
    }

    #[test]
    fn test_closure_progress_reporter() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        let reporter = ClosureProgressReporter::new(move |update: ProgressUpdate| {
            if update.stage == CleaningStage::Profiling {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });
        reporter.report(ProgressUpdate::new(CleaningStage::Profiling, 0.5, "Profiling dataset..."));
        reporter.report(ProgressUpdate::complete("Cleaning run completed"));

        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_stage_json_values() {
        assert_eq!(serde_json::to_string(&CleaningStage::Executing).unwrap(), "\"executing\"");
        assert_eq!(serde_json::to_string(&CleaningStage::Cancelled).unwrap(), "\"cancelled\"");
    }

    #[test]
    fn test_cancel_from_worker_thread() {
        let token = CancellationToken::new();
        let worker = {
            let token = token.clone();
            std::thread::spawn(move || token.cancel())
        };
        worker.join().unwrap();
        assert!(token.is_cancelled());
    }
}
