use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AdvisoryParseError;

/// Operation-specific parameter mapping carried by a plan step.
pub type OperationParams = Map<String, Value>;

/// Operation-specific metadata returned with every result.
pub type OperationMetadata = Map<String, Value>;

// ============================================================================
// Quality profile
// ============================================================================

/// Type class of a column. A column belongs to exactly one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnClass {
    Numeric,
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnQuality {
    pub name: String,
    pub dtype: String,
    pub class: ColumnClass,
    pub missing_count: usize,
    /// Missing values as a percentage of rows, in `[0, 100]`.
    pub missing_percentage: f64,
}

/// Summary statistics of a numeric column, computed over non-missing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Read-only snapshot of a dataset's shape and defects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    /// `(rows, columns)`
    pub shape: (usize, usize),
    pub columns: Vec<ColumnQuality>,
    pub duplicate_rows: usize,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub numeric_stats: BTreeMap<String, NumericSummary>,
    pub memory_usage_mb: f64,
}

impl QualityProfile {
    pub fn row_count(&self) -> usize {
        self.shape.0
    }

    pub fn column_count(&self) -> usize {
        self.shape.1
    }

    /// Sum of missing values over all columns.
    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.missing_count).sum()
    }

    /// Missing values as a percentage of all cells (0 for an empty dataset).
    pub fn total_missing_percentage(&self) -> f64 {
        let cells = self.row_count() * self.column_count();
        if cells == 0 {
            0.0
        } else {
            self.total_missing() as f64 / cells as f64 * 100.0
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnQuality> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Missing percentage of a named column, if it exists.
    pub fn missing_percentage_of(&self, name: &str) -> Option<f64> {
        self.column(name).map(|c| c.missing_percentage)
    }

    /// Columns that contain at least one missing value.
    pub fn columns_with_missing(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.missing_count > 0)
            .map(|c| c.name.as_str())
            .collect()
    }
}

// ============================================================================
// Operations and plans
// ============================================================================

/// The fixed set of cleaning operations the engine can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationId {
    InspectData,
    StandardizeColumnNames,
    HandleMissingValues,
    RemoveDuplicates,
    DetectOutliers,
    CoerceTypes,
}

impl OperationId {
    pub const ALL: [OperationId; 6] = [
        OperationId::InspectData,
        OperationId::StandardizeColumnNames,
        OperationId::HandleMissingValues,
        OperationId::RemoveDuplicates,
        OperationId::DetectOutliers,
        OperationId::CoerceTypes,
    ];

    /// Wire name used in plans and memory entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InspectData => "inspect_data",
            Self::StandardizeColumnNames => "standardize_column_names",
            Self::HandleMissingValues => "handle_missing_values",
            Self::RemoveDuplicates => "remove_duplicates",
            Self::DetectOutliers => "detect_outliers",
            Self::CoerceTypes => "coerce_types",
        }
    }

    /// Human-readable name used in failure messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::InspectData => "Inspection",
            Self::StandardizeColumnNames => "Column standardization",
            Self::HandleMissingValues => "Missing value handling",
            Self::RemoveDuplicates => "Duplicate removal",
            Self::DetectOutliers => "Outlier detection",
            Self::CoerceTypes => "Type coercion",
        }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationId {
    type Err = AdvisoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationId::ALL
            .into_iter()
            .find(|op| op.as_str() == s.trim())
            .ok_or_else(|| AdvisoryParseError::UnknownOperation(s.to_string()))
    }
}

/// A single invocation in a plan.
///
/// `operation` stays a plain string so that identifiers outside the known
/// set can still reach the engine and be recorded as failed steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(alias = "tool")]
    pub operation: String,
    #[serde(default)]
    pub parameters: OperationParams,
    #[serde(default)]
    pub reason: String,
}

impl PlanStep {
    pub fn new(operation: OperationId, parameters: OperationParams, reason: impl Into<String>) -> Self {
        Self {
            operation: operation.as_str().to_string(),
            parameters,
            reason: reason.into(),
        }
    }

    /// Resolve the operation identifier against the known set.
    pub fn operation_id(&self) -> Option<OperationId> {
        self.operation.parse().ok()
    }
}

/// Where a plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOrigin {
    RuleBased,
    Advisory,
    /// Advisory planning failed and the rule-based plan was substituted.
    Fallback,
    /// Supplied by the caller.
    Explicit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    pub origin: PlanOrigin,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>, origin: PlanOrigin) -> Self {
        Self { steps, origin }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Operation names in execution order.
    pub fn operation_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.operation.as_str()).collect()
    }
}

/// Uniform result of every cleaning operation.
///
/// When `success` is false, `dataset` is the untouched input.
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub dataset: DataFrame,
    pub success: bool,
    pub message: String,
    pub metadata: OperationMetadata,
}

impl OperationResult {
    pub fn success(dataset: DataFrame, message: impl Into<String>, metadata: OperationMetadata) -> Self {
        Self {
            dataset,
            success: true,
            message: message.into(),
            metadata,
        }
    }

    pub fn failure(dataset: DataFrame, message: impl Into<String>) -> Self {
        Self {
            dataset,
            success: false,
            message: message.into(),
            metadata: OperationMetadata::new(),
        }
    }
}

// ============================================================================
// Run history and results
// ============================================================================

/// One recorded operation invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub iteration: usize,
    pub operation: String,
    pub success: bool,
    pub message: String,
    pub metadata: OperationMetadata,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Quality score in `1..=10`.
    pub score: u8,
    pub feedback: String,
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    /// Neutral result used when advisory validation is unavailable.
    pub fn unavailable() -> Self {
        Self {
            score: 5,
            feedback: "validation unavailable".to_string(),
            suggestions: Vec::new(),
        }
    }
}

/// How the run was driven, as shown in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    RuleBased,
    Advisory,
    AdvisoryFallback,
    ExplicitPlan,
}

impl From<PlanOrigin> for ReportMode {
    fn from(origin: PlanOrigin) -> Self {
        match origin {
            PlanOrigin::RuleBased => ReportMode::RuleBased,
            PlanOrigin::Advisory => ReportMode::Advisory,
            PlanOrigin::Fallback => ReportMode::AdvisoryFallback,
            PlanOrigin::Explicit => ReportMode::ExplicitPlan,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub original_shape: (usize, usize),
    pub cleaned_shape: (usize, usize),
    pub rows_removed: usize,
    pub columns_removed: usize,
    pub iterations: usize,
    pub skipped_steps: usize,
}

/// Terminal artifact of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub summary: ReportSummary,
    pub quality_score: u8,
    pub feedback: String,
    pub suggestions: Vec<String>,
    pub actions_taken: Vec<String>,
    pub notes: Vec<String>,
    pub mode: ReportMode,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_id_round_trip() {
        for op in OperationId::ALL {
            assert_eq!(op.as_str().parse::<OperationId>().unwrap(), op);
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.as_str()));
        }
    }

    #[test]
    fn test_unknown_operation_id() {
        let err = "drop_everything".parse::<OperationId>().unwrap_err();
        assert_eq!(err, AdvisoryParseError::UnknownOperation("drop_everything".to_string()));
    }

    #[test]
    fn test_plan_step_accepts_tool_alias() {
        let step: PlanStep = serde_json::from_str(
            r#"{"tool": "remove_duplicates", "parameters": {"keep": "last"}, "reason": "dups"}"#,
        )
        .unwrap();
        assert_eq!(step.operation_id(), Some(OperationId::RemoveDuplicates));
        assert_eq!(step.parameters["keep"], "last");
    }

    #[test]
    fn test_total_missing_percentage_empty() {
        let profile = QualityProfile {
            shape: (0, 3),
            columns: Vec::new(),
            duplicate_rows: 0,
            numeric_columns: Vec::new(),
            categorical_columns: Vec::new(),
            numeric_stats: BTreeMap::new(),
            memory_usage_mb: 0.0,
        };
        assert_eq!(profile.total_missing_percentage(), 0.0);
        assert_eq!(profile.total_missing(), 0);
    }

    #[test]
    fn test_report_mode_from_origin() {
        assert_eq!(ReportMode::from(PlanOrigin::Fallback), ReportMode::AdvisoryFallback);
        assert_eq!(ReportMode::from(PlanOrigin::RuleBased), ReportMode::RuleBased);
    }
}
