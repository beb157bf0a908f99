use std::fmt;
use std::str::FromStr;

use polars::prelude::*;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{CleaningOperation, param_f64, param_str, run_guarded};
use crate::error::{CleaningError, Result};
use crate::imputers::KNNImputer;
use crate::types::{OperationId, OperationMetadata, OperationParams, OperationResult};
use crate::utils::{is_numeric_dtype, mode_row_index, numeric_column_names, total_null_count};

/// Sentinel written into categorical columns that have no observed value.
pub const UNKNOWN_SENTINEL: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingStrategy {
    /// Drop sparse columns, then impute what remains.
    Auto,
    /// Drop sparse columns, then drop rows that still contain a missing value.
    Drop,
    /// Impute everything; no columns are dropped.
    Fill,
}

impl fmt::Display for MissingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Drop => "drop",
            Self::Fill => "fill",
        })
    }
}

impl FromStr for MissingStrategy {
    type Err = CleaningError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "drop" => Ok(Self::Drop),
            "fill" => Ok(Self::Fill),
            other => Err(CleaningError::invalid_parameter(
                OperationId::HandleMissingValues.as_str(),
                "strategy",
                format!("expected 'auto', 'drop' or 'fill', got '{other}'"),
            )),
        }
    }
}

/// Drops sparse columns, KNN-imputes numeric gaps and mode-fills categorical gaps.
pub struct HandleMissingValues {
    default_threshold: f64,
    imputer: KNNImputer,
}

impl HandleMissingValues {
    pub fn new(default_threshold: f64, knn_neighbors: usize) -> Self {
        Self {
            default_threshold,
            imputer: KNNImputer::new(knn_neighbors),
        }
    }

    fn run(&self, df: &DataFrame, params: &OperationParams) -> Result<OperationResult> {
        let op = self.id();
        let threshold = param_f64(op, params, "threshold", self.default_threshold)?;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(CleaningError::invalid_parameter(
                op.as_str(),
                "threshold",
                format!("must be in (0, 1], got {threshold}"),
            ));
        }
        let strategy: MissingStrategy = param_str(op, params, "strategy", "auto")?.parse()?;

        let initial_missing = total_null_count(df);
        let mut result_df = df.clone();
        let mut changes = Vec::new();
        let mut dropped_columns = Vec::new();

        // Drop columns whose missing fraction is strictly above the threshold.
        if strategy != MissingStrategy::Fill && df.height() > 0 {
            let rows = df.height() as f64;
            dropped_columns = df
                .get_columns()
                .iter()
                .filter(|c| c.null_count() as f64 / rows > threshold)
                .map(|c| c.name().to_string())
                .collect();

            if !dropped_columns.is_empty() {
                result_df = result_df.drop_many(dropped_columns.iter().map(String::as_str));
                changes.push(format!(
                    "Dropped {} columns with >{}% missing: {:?}",
                    dropped_columns.len(),
                    threshold * 100.0,
                    dropped_columns
                ));
            }
        }

        match strategy {
            MissingStrategy::Drop => {
                let before = result_df.height();
                result_df = drop_incomplete_rows(&result_df)?;
                let removed = before - result_df.height();
                if removed > 0 {
                    changes.push(format!("Dropped {removed} rows with missing values"));
                }
            }
            MissingStrategy::Auto | MissingStrategy::Fill => {
                self.impute_numeric(&mut result_df, &mut changes)?;
                fill_categorical(&mut result_df, &mut changes)?;
            }
        }

        let final_missing = total_null_count(&result_df);
        let message = format!("Handled missing values: {initial_missing} → {final_missing} missing values");
        info!("{}", message);

        let mut metadata = OperationMetadata::new();
        metadata.insert("initial_missing".to_string(), json!(initial_missing));
        metadata.insert("final_missing".to_string(), json!(final_missing));
        metadata.insert("changes".to_string(), json!(changes));
        metadata.insert("dropped_columns".to_string(), json!(dropped_columns));
        metadata.insert("strategy".to_string(), json!(strategy.to_string()));
        metadata.insert("threshold".to_string(), json!(threshold));

        Ok(OperationResult::success(result_df, message, metadata))
    }

    fn impute_numeric(&self, df: &mut DataFrame, changes: &mut Vec<String>) -> Result<()> {
        let numeric_cols = numeric_column_names(df);
        let gappy = numeric_cols
            .iter()
            .filter(|name| df.column(name).map(|c| c.null_count() > 0).unwrap_or(false))
            .count();
        if gappy == 0 {
            return Ok(());
        }

        *df = self
            .imputer
            .fit_transform(df, &numeric_cols)
            .map_err(|e| CleaningError::OperationFailed(format!("KNN imputation: {e}")))?;
        changes.push(format!("KNN imputed {gappy} numeric columns"));
        Ok(())
    }
}

/// Fill each non-numeric column's gaps with its most frequent value.
fn fill_categorical(df: &mut DataFrame, changes: &mut Vec<String>) -> Result<()> {
    let targets: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| !is_numeric_dtype(c.dtype()) && c.null_count() > 0)
        .map(|c| c.name().to_string())
        .collect();

    for name in targets {
        let series = df.column(&name)?.as_materialized_series().clone();
        let (filled, fill_label) = match mode_row_index(&series)? {
            Some(idx) => {
                let fill = series.new_from_index(idx, series.len());
                let label = series.get(idx)?.str_value().to_string();
                (series.zip_with(&series.is_not_null(), &fill)?, label)
            }
            None => {
                let fill = vec![UNKNOWN_SENTINEL; series.len()];
                (Series::new(series.name().clone(), fill), UNKNOWN_SENTINEL.to_string())
            }
        };
        df.replace(&name, filled)?;
        debug!("Mode imputed column '{}'", name);
        changes.push(format!("Mode imputed column '{name}' with '{fill_label}'"));
    }

    Ok(())
}

/// Keep only rows without any missing value.
fn drop_incomplete_rows(df: &DataFrame) -> Result<DataFrame> {
    let mut mask = vec![true; df.height()];
    for column in df.get_columns() {
        if column.null_count() == 0 {
            continue;
        }
        let nulls = column.as_materialized_series().is_null();
        for (keep, is_null) in mask.iter_mut().zip(&nulls) {
            if is_null.unwrap_or(false) {
                *keep = false;
            }
        }
    }
    Ok(df.filter(&BooleanChunked::from_slice("mask".into(), &mask))?)
}

impl CleaningOperation for HandleMissingValues {
    fn id(&self) -> OperationId {
        OperationId::HandleMissingValues
    }

    fn description(&self) -> &'static str {
        "Handle missing values: drop sparse columns, KNN-impute numeric columns, mode-fill categorical columns"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "strategy": {
                    "type": "string",
                    "enum": ["auto", "drop", "fill"],
                    "default": "auto",
                    "description": "auto: drop sparse columns then impute; drop: also drop incomplete rows; fill: impute only"
                },
                "threshold": {
                    "type": "number",
                    "minimum": 0.0,
                    "maximum": 1.0,
                    "default": self.default_threshold,
                    "description": "Columns with a missing fraction above this are dropped"
                }
            }
        })
    }

    fn execute(&self, df: &DataFrame, params: &OperationParams) -> OperationResult {
        run_guarded(self.id(), df, || self.run(df, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params(value: Value) -> OperationParams {
        value.as_object().cloned().unwrap()
    }

    fn op() -> HandleMissingValues {
        HandleMissingValues::new(0.5, 5)
    }

    fn names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_threshold_is_strict() {
        // "half" is exactly 50% missing, "most" is 75% missing.
        let df = df! {
            "half" => &[Some(1.0), None, Some(3.0), None],
            "most" => &[Some(1.0), None, None, None],
            "full" => &[1.0, 2.0, 3.0, 4.0],
        }
        .unwrap();

        let result = op().execute(&df, &OperationParams::new());
        assert!(result.success);
        assert_eq!(names(&result.dataset), vec!["half", "full"]);
        assert_eq!(result.metadata["dropped_columns"], json!(["most"]));
        assert_eq!(result.metadata["final_missing"], 0);
    }

    #[test]
    fn test_fifty_one_percent_is_dropped() {
        let values: Vec<Option<f64>> = (0..100).map(|i| if i < 51 { None } else { Some(i as f64) }).collect();
        let kept: Vec<Option<f64>> = (0..100).map(|i| if i < 50 { None } else { Some(i as f64) }).collect();
        let df = df! {
            "sparse" => values,
            "borderline" => kept,
        }
        .unwrap();

        let result = op().execute(&df, &params(json!({"threshold": 0.5})));
        assert_eq!(names(&result.dataset), vec!["borderline"]);
    }

    #[test]
    fn test_categorical_mode_fill_and_unknown() {
        let df = df! {
            "city" => &[Some("LA"), None, Some("NYC"), Some("LA"), Some("NYC")],
            "note" => &[None::<&str>, None, None, None, Some("x")],
            "empty" => &[None::<&str>, None, None, None, None],
        }
        .unwrap();

        let result = op().execute(&df, &params(json!({"strategy": "fill"})));
        assert!(result.success);

        let city: Vec<Option<&str>> = result.dataset.column("city").unwrap().str().unwrap().into_iter().collect();
        // LA and NYC tie at two each; LA was seen first.
        assert_eq!(city[1], Some("LA"));

        let empty = result.dataset.column("empty").unwrap();
        assert_eq!(empty.null_count(), 0);
        assert_eq!(empty.get(0).unwrap().str_value(), UNKNOWN_SENTINEL);

        let changes = result.metadata["changes"].as_array().unwrap();
        assert!(changes.iter().any(|c| c == "Mode imputed column 'city' with 'LA'"));
    }

    #[test]
    fn test_numeric_knn_imputation() {
        let df = df! {
            "a" => &[Some(1.0), Some(2.0), None, Some(4.0), Some(5.0), Some(6.0)],
            "b" => &[10.0, 20.0, 30.0, 40.0, 50.0, 60.0],
        }
        .unwrap();

        let result = HandleMissingValues::new(0.5, 2).execute(&df, &OperationParams::new());
        let a = result.dataset.column("a").unwrap();
        assert_eq!(a.null_count(), 0);
        assert_eq!(a.get(2).unwrap().try_extract::<f64>().unwrap(), 3.0);
        assert!(result.metadata["changes"][0].as_str().unwrap().starts_with("KNN imputed 1"));
    }

    #[test]
    fn test_drop_strategy_removes_incomplete_rows() {
        let df = df! {
            "a" => &[Some(1), None, Some(3), Some(4)],
            "b" => &[Some("x"), Some("y"), None, Some("z")],
        }
        .unwrap();

        let result = op().execute(&df, &params(json!({"strategy": "drop", "threshold": 0.9})));
        assert!(result.success);
        assert_eq!(result.dataset.height(), 2);
        assert_eq!(result.metadata["final_missing"], 0);
    }

    #[test]
    fn test_invalid_parameters_fail_cleanly() {
        let df = df! { "a" => &[Some(1.0), None] }.unwrap();
        for bad in [json!({"threshold": 0.0}), json!({"threshold": 1.5}), json!({"strategy": "magic"})] {
            let result = op().execute(&df, &params(bad));
            assert!(!result.success);
            assert!(result.message.starts_with("Missing value handling failed:"));
            assert_eq!(result.dataset.column("a").unwrap().null_count(), 1);
        }
    }

    #[test]
    fn test_zero_rows() {
        let df = df! { "a" => Vec::<f64>::new() }.unwrap();
        let result = op().execute(&df, &OperationParams::new());
        assert!(result.success);
        assert_eq!(result.message, "Handled missing values: 0 → 0 missing values");
    }
}
