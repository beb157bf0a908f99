use std::sync::Arc;

use polars::prelude::*;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{CleaningOperation, param_bool, param_f64, run_guarded};
use crate::detectors::AnomalyDetector;
use crate::error::{CleaningError, Result};
use crate::types::{OperationId, OperationMetadata, OperationParams, OperationResult};
use crate::utils::{numeric_column_names, series_to_f64};

/// Name of the boolean column added in flag-only mode.
pub const OUTLIER_FLAG_COLUMN: &str = "_is_outlier";

/// Flags (or removes) anomalous rows using the injected detector over numeric columns.
pub struct DetectOutliers {
    detector: Arc<dyn AnomalyDetector>,
    default_contamination: f64,
}

impl DetectOutliers {
    pub fn new(detector: Arc<dyn AnomalyDetector>, default_contamination: f64) -> Self {
        Self {
            detector,
            default_contamination,
        }
    }

    fn run(&self, df: &DataFrame, params: &OperationParams) -> Result<OperationResult> {
        let op = self.id();
        let contamination = param_f64(op, params, "contamination", self.default_contamination)?;
        if !(contamination > 0.0 && contamination <= 0.5) {
            return Err(CleaningError::invalid_parameter(
                op.as_str(),
                "contamination",
                format!("must be in (0, 0.5], got {contamination}"),
            ));
        }
        let remove = param_bool(op, params, "remove", false)?;

        let numeric_cols = numeric_column_names(df);
        if numeric_cols.is_empty() {
            let mut metadata = OperationMetadata::new();
            metadata.insert("outlier_count".to_string(), json!(0));
            metadata.insert("outlier_percentage".to_string(), json!(0.0));
            metadata.insert("numeric_columns_analyzed".to_string(), json!(0));
            metadata.insert("removed".to_string(), json!(false));
            return Ok(OperationResult::success(
                df.clone(),
                "No numeric columns found for outlier detection",
                metadata,
            ));
        }

        let matrix = scoring_matrix(df, &numeric_cols)?;
        let flags = self
            .detector
            .flag_outliers(&matrix, contamination)
            .map_err(|e| CleaningError::OperationFailed(format!("{}: {e}", self.detector.name())))?;
        if flags.len() != df.height() {
            return Err(CleaningError::Internal(format!(
                "detector returned {} flags for {} rows",
                flags.len(),
                df.height()
            )));
        }

        let outlier_count = flags.iter().filter(|f| **f).count();
        let outlier_percentage = if flags.is_empty() {
            0.0
        } else {
            outlier_count as f64 / flags.len() as f64 * 100.0
        };

        let (result_df, message) = if remove {
            let keep: Vec<bool> = flags.iter().map(|f| !f).collect();
            let mut filtered = df.filter(&BooleanChunked::from_slice("mask".into(), &keep))?;
            if filtered.get_column_index(OUTLIER_FLAG_COLUMN).is_some() {
                filtered = filtered.drop(OUTLIER_FLAG_COLUMN)?;
            }
            (
                filtered,
                format!("Detected and removed {outlier_count} outliers ({outlier_percentage:.1}%)"),
            )
        } else {
            let mut flagged = df.clone();
            flagged.with_column(Series::new(OUTLIER_FLAG_COLUMN.into(), flags))?;
            (
                flagged,
                format!(
                    "Detected {outlier_count} outliers ({outlier_percentage:.1}%), marked in '{OUTLIER_FLAG_COLUMN}' column"
                ),
            )
        };
        info!("{}", message);

        let mut metadata = OperationMetadata::new();
        metadata.insert("outlier_count".to_string(), json!(outlier_count));
        metadata.insert("outlier_percentage".to_string(), json!(outlier_percentage));
        metadata.insert("numeric_columns_analyzed".to_string(), json!(numeric_cols.len()));
        metadata.insert("removed".to_string(), json!(remove));
        metadata.insert("detector".to_string(), json!(self.detector.name()));
        metadata.insert("contamination".to_string(), json!(contamination));

        Ok(OperationResult::success(result_df, message, metadata))
    }
}

/// Dense row-major matrix of the numeric columns, each scaled to [0, 1].
///
/// Non-finite values count as missing. Missing values take the column mean
/// (0.0 for an all-missing column) for scoring only.
fn scoring_matrix(df: &DataFrame, columns: &[String]) -> Result<Vec<Vec<f64>>> {
    let mut matrix = vec![Vec::with_capacity(columns.len()); df.height()];
    for name in columns {
        let values: Vec<Option<f64>> = series_to_f64(df.column(name)?.as_materialized_series())?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        let (min, max) = values
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        // Halved so the span stays finite between -f64::MAX and f64::MAX.
        let half_span = max / 2.0 - min / 2.0;
        let scaled: Vec<Option<f64>> = values
            .iter()
            .map(|v| {
                v.map(|x| if half_span > 0.0 { (x / 2.0 - min / 2.0) / half_span } else { 0.0 })
            })
            .collect();
        let (sum, count) = scaled.iter().flatten().fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
        let mean = if count > 0 { sum / count as f64 } else { 0.0 };
        debug!("Outlier scoring column '{}' (scaled mean fill {:.3})", name, mean);
        for (row, value) in matrix.iter_mut().zip(scaled) {
            row.push(value.unwrap_or(mean));
        }
    }
    Ok(matrix)
}

impl CleaningOperation for DetectOutliers {
    fn id(&self) -> OperationId {
        OperationId::DetectOutliers
    }

    fn description(&self) -> &'static str {
        "Detect outliers across numeric columns with an isolation forest; flag them or remove them"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "contamination": {
                    "type": "number",
                    "minimum": 0.0,
                    "maximum": 0.5,
                    "default": self.default_contamination,
                    "description": "Expected share of outliers"
                },
                "remove": {
                    "type": "boolean",
                    "default": false,
                    "description": "Remove flagged rows instead of adding an '_is_outlier' column"
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
    use crate::detectors::IsolationForest;

    fn params(value: Value) -> OperationParams {
        value.as_object().cloned().unwrap()
    }

    fn op() -> DetectOutliers {
        DetectOutliers::new(Arc::new(IsolationForest::default()), 0.05)
    }

    fn sample() -> DataFrame {
        let mut values: Vec<Option<f64>> = (0..95).map(|i| Some((i % 10) as f64)).collect();
        values[3] = None;
        values.extend([Some(500.0), Some(-400.0), Some(900.0), Some(-800.0), Some(1200.0)]);
        let labels: Vec<String> = (0..100).map(|i| format!("row{i}")).collect();
        df! {
            "value" => values,
            "label" => labels,
        }
        .unwrap()
    }

    #[test]
    fn test_flag_mode_adds_column() {
        let result = op().execute(&sample(), &OperationParams::new());
        assert!(result.success, "{}", result.message);
        assert_eq!(result.dataset.height(), 100);

        let flags = result.dataset.column(OUTLIER_FLAG_COLUMN).unwrap().bool().unwrap().clone();
        let flagged = flags.into_iter().filter(|f| *f == Some(true)).count();
        assert_eq!(result.metadata["outlier_count"], flagged);
        assert!((2..=7).contains(&flagged));
        assert!(result.message.contains("marked in '_is_outlier' column"));
    }

    #[test]
    fn test_remove_mode_drops_rows_and_flag() {
        let result = op().execute(&sample(), &params(json!({"remove": true})));
        assert!(result.success);
        let removed = result.metadata["outlier_count"].as_u64().unwrap() as usize;
        assert_eq!(result.dataset.height(), 100 - removed);
        assert!(result.dataset.column(OUTLIER_FLAG_COLUMN).is_err());
        assert!(result.message.starts_with("Detected and removed"));
    }

    #[test]
    fn test_no_numeric_columns_is_not_an_error() {
        let df = df! { "name" => &["a", "b", "c"] }.unwrap();
        let result = op().execute(&df, &OperationParams::new());
        assert!(result.success);
        assert_eq!(result.metadata["outlier_count"], 0);
        assert_eq!(result.message, "No numeric columns found for outlier detection");
        assert!(result.dataset.column(OUTLIER_FLAG_COLUMN).is_err());
    }

    #[test]
    fn test_invalid_contamination_fails() {
        let df = sample();
        let result = op().execute(&df, &params(json!({"contamination": 0.9})));
        assert!(!result.success);
        assert_eq!(result.dataset.width(), df.width());
    }

    #[test]
    fn test_extreme_values_are_scored() {
        let mut values: Vec<f64> = (0..50).map(|i| i as f64).collect();
        values.extend([f64::MAX, -f64::MAX]);
        let df = df! { "value" => values }.unwrap();
        let result = op().execute(&df, &OperationParams::new());
        assert!(result.success, "{}", result.message);
        assert_eq!(result.dataset.height(), 52);
        assert!(result.metadata["outlier_count"].as_u64().unwrap() >= 1);
    }

    #[test]
    fn test_infinite_and_nan_values_count_as_missing() {
        let mut values: Vec<f64> = (0..50).map(|i| (i % 10) as f64).collect();
        values.extend([f64::INFINITY, f64::NEG_INFINITY, f64::NAN, 1000.0]);
        let df = df! { "value" => values }.unwrap();
        let result = op().execute(&df, &OperationParams::new());
        assert!(result.success, "{}", result.message);
        let flags: Vec<Option<bool>> = result
            .dataset
            .column(OUTLIER_FLAG_COLUMN)
            .unwrap()
            .bool()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(flags.len(), 54);
        assert_eq!(flags[53], Some(true));
    }

    #[test]
    fn test_scoring_matrix_scales_to_unit_range() {
        let df = df! {
            "a" => &[Some(-f64::MAX), None, Some(f64::MAX)],
            "b" => &[Some(5.0), Some(5.0), Some(f64::INFINITY)],
        }
        .unwrap();
        let matrix = scoring_matrix(&df, &["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(matrix, vec![vec![0.0, 0.0], vec![0.5, 0.0], vec![1.0, 0.0]]);
    }

    #[test]
    fn test_rerun_replaces_existing_flag() {
        let once = op().execute(&sample(), &OperationParams::new()).dataset;
        let twice = op().execute(&once, &OperationParams::new()).dataset;
        assert_eq!(twice.width(), once.width());
    }
}
