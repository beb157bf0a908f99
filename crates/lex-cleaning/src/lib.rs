//! Data Cleaning Engine Library
//!
//! A rule-driven data cleaning planner and executor built with Rust and Polars,
//! with optional advisory planning through an LLM.
//!
//! # Overview
//!
//! A run goes through five stages:
//!
//! - **Profiling**: shape, missingness, duplicate rows, column classes and numeric statistics
//! - **Planning**: an ordered list of cleaning steps, from rules or from an advisory service
//! - **Execution**: steps dispatched through the operation registry under an iteration budget
//! - **Validation**: a 1-10 quality score with feedback and suggestions
//! - **Reporting**: a serializable report of everything that happened
//!
//! Operations never abort a run. A failing step leaves the dataset unchanged
//! and is recorded; only invalid configuration and cancellation are errors.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_cleaning::{CleaningEngine, EngineConfig, CancellationToken};
//! use lex_cleaning::ai::OpenRouterProvider;
//! use polars::prelude::*;
//! use std::sync::Arc;
//!
//! let df = CsvReadOptions::default()
//!     .try_into_reader_with_file_path(Some("data.csv".into()))?
//!     .finish()?;
//!
//! // Option 1: Advisory planning with progress reporting
//! let provider = Arc::new(OpenRouterProvider::new(api_key)?);
//! let outcome = CleaningEngine::builder()
//!     .ai_provider(provider)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(df)?;
//!
//! // Option 2: Rule-based only
//! let config = EngineConfig::builder()
//!     .missing_value_threshold(0.6)
//!     .max_iterations(8)
//!     .build()?;
//! let outcome = CleaningEngine::builder().config(config).build()?.run(df)?;
//!
//! println!("Quality score: {}/10", outcome.report.quality_score);
//! for action in &outcome.report.actions_taken {
//!     println!("- {}", action);
//! }
//! ```
//!
//! # Operations
//!
//! | Name | Effect |
//! |------|--------|
//! | `inspect_data` | Profile only |
//! | `standardize_column_names` | snake_case names, collisions suffixed |
//! | `remove_duplicates` | Drop repeated rows (`subset`, `keep`) |
//! | `handle_missing_values` | Drop sparse columns, KNN for numeric, mode for categorical |
//! | `detect_outliers` | Isolation forest; flag in `_is_outlier` or remove |
//! | `coerce_types` | Convert columns to integer, float, string or datetime |
//!
//! Custom implementations of [`operations::CleaningOperation`] can be
//! registered with [`CleaningEngineBuilder::operation`].

pub mod ai;
pub mod config;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod imputers;
pub mod operations;
pub mod planner;
pub mod profiler;
pub mod reporting;
pub mod types;
pub mod utils;
pub mod validation;

// Re-exports for convenient access
pub use config::{ConfigValidationError, EngineConfig, EngineConfigBuilder};
pub use detectors::{AnomalyDetector, IsolationForest};
pub use engine::{
    AgentMemory, CancellationToken, CleaningEngine, CleaningEngineBuilder, CleaningOutcome,
    CleaningStage, ClosureProgressReporter, EngineState, ProgressReporter, ProgressUpdate,
};
pub use error::{AdvisoryParseError, CleaningError, Result, ResultExt};
pub use imputers::KNNImputer;
pub use operations::{CleaningOperation, OperationRegistry, OperationSchema};
pub use planner::{AdvisoryPlanner, Planner, RuleBasedPlanner};
pub use profiler::QualityProfiler;
pub use reporting::{ReportGenerator, ReportParams};
pub use types::{
    ColumnClass, ColumnQuality, MemoryEntry, NumericSummary, OperationId, OperationMetadata,
    OperationParams, OperationResult, Plan, PlanOrigin, PlanStep, QualityProfile, Report,
    ReportMode, ReportSummary, ValidationResult,
};
pub use validation::{AdvisoryValidator, RuleBasedValidator, Validator};
