//! Data quality profiling.
//!
//! This module computes the [`QualityProfile`] the planner and validator
//! work from:
//! - Shape and per-column missingness
//! - Duplicate-row count (missing equals missing, see [`crate::utils::count_duplicate_rows`])
//! - Numeric / categorical classification
//! - Summary statistics for numeric columns
//!
//! Profiling never fails. A column whose statistics cannot be computed is
//! reported without them and a warning is logged.

mod statistics;

use std::collections::BTreeMap;

use polars::prelude::*;
use tracing::{debug, warn};

use crate::types::{ColumnClass, ColumnQuality, QualityProfile};
use crate::utils::{count_duplicate_rows, is_numeric_dtype};

pub(crate) use statistics::quantile_sorted;

/// Data profiler for computing quality snapshots.
pub struct QualityProfiler;

impl QualityProfiler {
    /// Profile a dataset. The input is not modified.
    pub fn profile(df: &DataFrame) -> QualityProfile {
        let rows = df.height();
        let mut columns = Vec::with_capacity(df.width());
        let mut numeric_columns = Vec::new();
        let mut categorical_columns = Vec::new();
        let mut numeric_stats = BTreeMap::new();

        for column in df.get_columns() {
            let name = column.name().to_string();
            let missing_count = column.null_count();
            let missing_percentage = if rows == 0 {
                0.0
            } else {
                missing_count as f64 / rows as f64 * 100.0
            };

            let class = if is_numeric_dtype(column.dtype()) {
                ColumnClass::Numeric
            } else {
                ColumnClass::Categorical
            };

            match class {
                ColumnClass::Numeric => {
                    match statistics::numeric_summary(column.as_materialized_series()) {
                        Ok(Some(summary)) => {
                            numeric_stats.insert(name.clone(), summary);
                        }
                        Ok(None) => {}
                        Err(e) => warn!("Skipping statistics for column '{}': {}", name, e),
                    }
                    numeric_columns.push(name.clone());
                }
                ColumnClass::Categorical => categorical_columns.push(name.clone()),
            }

            columns.push(ColumnQuality {
                name,
                dtype: format!("{}", column.dtype()),
                class,
                missing_count,
                missing_percentage,
            });
        }

        let duplicate_rows = count_duplicate_rows(df).unwrap_or_else(|e| {
            warn!("Duplicate detection failed, reporting 0: {}", e);
            0
        });

        let memory_usage_mb = df.estimated_size() as f64 / (1024.0 * 1024.0);

        debug!(
            "Profiled {} rows x {} columns: {} duplicates, {} numeric columns",
            rows,
            df.width(),
            duplicate_rows,
            numeric_columns.len()
        );

        QualityProfile {
            shape: (rows, df.width()),
            columns,
            duplicate_rows,
            numeric_columns,
            categorical_columns,
            numeric_stats,
            memory_usage_mb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_basic() {
        let df = df! {
            "age" => &[Some(25i64), None, Some(40), Some(25)],
            "city" => &[Some("NYC"), Some("LA"), None, Some("NYC")],
        }
        .unwrap();

        let profile = QualityProfiler::profile(&df);
        assert_eq!(profile.shape, (4, 2));
        assert_eq!(profile.numeric_columns, vec!["age"]);
        assert_eq!(profile.categorical_columns, vec!["city"]);
        assert_eq!(profile.total_missing(), 2);
        assert_eq!(profile.missing_percentage_of("age"), Some(25.0));
        assert_eq!(profile.duplicate_rows, 1);
        assert!(profile.numeric_stats.contains_key("age"));
        assert_eq!(profile.numeric_stats["age"].count, 3);
    }

    #[test]
    fn test_profile_zero_rows() {
        let df = df! {
            "a" => Vec::<f64>::new(),
            "b" => Vec::<String>::new(),
        }
        .unwrap();

        let profile = QualityProfiler::profile(&df);
        assert_eq!(profile.shape, (0, 2));
        assert_eq!(profile.duplicate_rows, 0);
        assert!(profile.columns.iter().all(|c| c.missing_percentage == 0.0));
        assert!(profile.numeric_stats.is_empty());
    }

    #[test]
    fn test_profile_zero_columns() {
        let profile = QualityProfiler::profile(&DataFrame::empty());
        assert_eq!(profile.shape, (0, 0));
        assert!(profile.columns.is_empty());
        assert_eq!(profile.total_missing_percentage(), 0.0);
    }

    #[test]
    fn test_percentages_bounded_and_duplicates_bounded() {
        let df = df! {
            "x" => &[None::<i32>, None, None],
            "y" => &[None::<&str>, None, None],
        }
        .unwrap();

        let profile = QualityProfiler::profile(&df);
        assert!(profile.duplicate_rows <= profile.row_count());
        assert_eq!(profile.duplicate_rows, 2);
        for column in &profile.columns {
            assert!((0.0..=100.0).contains(&column.missing_percentage));
        }
        assert_eq!(profile.missing_percentage_of("x"), Some(100.0));
    }

    #[test]
    fn test_profile_does_not_mutate_input() {
        let df = df! { "a" => &[1, 2, 2] }.unwrap();
        let before = df.clone();
        let _ = QualityProfiler::profile(&df);
        assert!(df.equals(&before));
    }
}
