//! Cleaning operations and their registry.
//!
//! Every operation implements [`CleaningOperation`] and returns an
//! [`OperationResult`]. Operations never propagate errors: an internal
//! failure becomes `success: false` with the untouched input dataset, so
//! the engine can treat all of them uniformly.
//!
//! The engine dispatches by [`OperationId`] through an [`OperationRegistry`].

mod coercion;
mod duplicates;
mod inspect;
mod missing;
mod outliers;
mod standardize;

pub use coercion::{CoerceTypes, TargetType};
pub use duplicates::RemoveDuplicates;
pub use inspect::InspectData;
pub(crate) use inspect::summarize_profile;
pub use missing::{HandleMissingValues, MissingStrategy};
pub use outliers::{DetectOutliers, OUTLIER_FLAG_COLUMN};
pub use standardize::{StandardizeColumnNames, standardize_name};

use std::collections::HashMap;
use std::sync::Arc;

use polars::prelude::DataFrame;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::config::EngineConfig;
use crate::detectors::{AnomalyDetector, IsolationForest};
use crate::error::{CleaningError, Result};
use crate::types::{OperationId, OperationParams, OperationResult};

/// Capability contract shared by every cleaning operation.
pub trait CleaningOperation: Send + Sync {
    fn id(&self) -> OperationId;

    /// One-line description for the advisory catalog.
    fn description(&self) -> &'static str;

    /// JSON schema of the accepted parameters.
    fn parameters_schema(&self) -> Value;

    /// Apply the operation. Never panics on bad input and never returns an
    /// error; failures are reported through the result.
    fn execute(&self, df: &DataFrame, params: &OperationParams) -> OperationResult;
}

/// Catalog entry describing an operation to the advisory service.
#[derive(Debug, Clone, Serialize)]
pub struct OperationSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Run a fallible operation body and convert any error into a failed result
/// carrying the untouched input.
pub(crate) fn run_guarded<F>(id: OperationId, df: &DataFrame, body: F) -> OperationResult
where
    F: FnOnce() -> Result<OperationResult>,
{
    match body() {
        Ok(result) => result,
        Err(e) => {
            let message = format!("{} failed: {}", id.display_name(), e);
            error!("{}", message);
            OperationResult::failure(df.clone(), message)
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Maps operation identifiers to implementations.
#[derive(Clone)]
pub struct OperationRegistry {
    operations: HashMap<OperationId, Arc<dyn CleaningOperation>>,
}

impl OperationRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    /// Registry holding every built-in operation, configured from `config`.
    pub fn with_defaults(config: &EngineConfig, detector: Arc<dyn AnomalyDetector>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(InspectData));
        registry.register(Arc::new(StandardizeColumnNames));
        registry.register(Arc::new(HandleMissingValues::new(
            config.missing_value_threshold,
            config.knn_neighbors,
        )));
        registry.register(Arc::new(RemoveDuplicates));
        registry.register(Arc::new(DetectOutliers::new(detector, config.outlier_contamination)));
        registry.register(Arc::new(CoerceTypes));
        registry
    }

    /// Register (or replace) an operation under its own id.
    pub fn register(&mut self, operation: Arc<dyn CleaningOperation>) {
        self.operations.insert(operation.id(), operation);
    }

    pub fn get(&self, id: OperationId) -> Option<&Arc<dyn CleaningOperation>> {
        self.operations.get(&id)
    }

    /// Resolve a wire name; `None` for names outside the known set or not registered.
    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn CleaningOperation>> {
        name.parse::<OperationId>().ok().and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Catalog of registered operations in a stable order.
    pub fn catalog(&self) -> Vec<OperationSchema> {
        OperationId::ALL
            .iter()
            .filter_map(|id| self.operations.get(id))
            .map(|op| OperationSchema {
                name: op.id().as_str(),
                description: op.description(),
                parameters: op.parameters_schema(),
            })
            .collect()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::with_defaults(&EngineConfig::default(), Arc::new(IsolationForest::default()))
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.operations.keys().collect();
        ids.sort();
        f.debug_struct("OperationRegistry").field("operations", &ids).finish()
    }
}

// ============================================================================
// Parameter helpers
// ============================================================================

pub(crate) fn param_f64(
    op: OperationId,
    params: &OperationParams,
    key: &str,
    default: f64,
) -> Result<f64> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_f64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| CleaningError::invalid_parameter(op.as_str(), key, format!("expected a number, got {v}"))),
    }
}

pub(crate) fn param_bool(
    op: OperationId,
    params: &OperationParams,
    key: &str,
    default: bool,
) -> Result<bool> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
        Some(v) => Err(CleaningError::invalid_parameter(
            op.as_str(),
            key,
            format!("expected a boolean, got {v}"),
        )),
    }
}

/// String parameter; JSON `false` is rendered as `"false"` so that
/// `keep: false` is accepted alongside `keep: "false"`.
pub(crate) fn param_str(
    op: OperationId,
    params: &OperationParams,
    key: &str,
    default: &str,
) -> Result<String> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default.to_string()),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(v) => Err(CleaningError::invalid_parameter(
            op.as_str(),
            key,
            format!("expected a string, got {v}"),
        )),
    }
}

pub(crate) fn param_string_list(
    op: OperationId,
    params: &OperationParams,
    key: &str,
) -> Result<Option<Vec<String>>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    CleaningError::invalid_parameter(op.as_str(), key, "expected an array of strings")
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        Some(v) => Err(CleaningError::invalid_parameter(
            op.as_str(),
            key,
            format!("expected an array of strings, got {v}"),
        )),
    }
}
