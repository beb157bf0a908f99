//! Shared utilities for the cleaning engine.
//!
//! This module contains the helpers used by more than one component:
//! dtype classification, numeric string parsing, and duplicate row
//! counting shared by the profiler and the validator.

use std::collections::HashMap;

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a date or datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _) | DataType::Date)
}

/// Names of the numeric columns of a frame, in column order.
pub fn numeric_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| is_numeric_dtype(c.dtype()))
        .map(|c| c.name().to_string())
        .collect()
}

/// Total number of nulls across all columns.
pub fn total_null_count(df: &DataFrame) -> usize {
    df.get_columns().iter().map(|c| c.null_count()).sum()
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Currency, percent and grouping characters ignored when reading numbers
/// out of text columns.
const NUMERIC_NOISE: [char; 6] = [',', '$', '%', '€', '£', ' '];

/// Parse a loosely formatted number such as `"$1,234.56"` or `" 42% "`.
///
/// Returns `None` for empty, non-numeric or non-finite input.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let digits: String = s.trim().chars().filter(|c| !NUMERIC_NOISE.contains(c)).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// =============================================================================
// Series Utilities
// =============================================================================

/// Values of a numeric series as `f64`, nulls and NaN kept as `None`.
pub fn series_to_f64(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let casted = series.cast(&DataType::Float64)?;
    Ok(casted
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// String rendering of every value, with nulls kept as `None`.
pub fn series_to_keys(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let casted = series.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Row index of the first occurrence of the most frequent non-null value.
///
/// Ties go to the value encountered first in column order.
pub fn mode_row_index(series: &Series) -> PolarsResult<Option<usize>> {
    let keys = series_to_keys(series)?;
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (idx, key) in keys.iter().enumerate() {
        if let Some(key) = key {
            counts.entry(key.as_str()).or_insert((0, idx)).0 += 1;
        }
    }

    Ok(counts
        .into_values()
        .max_by(|(count_a, first_a), (count_b, first_b)| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(_, first)| first))
}

// =============================================================================
// Row Equality
// =============================================================================

/// Number of rows that repeat an earlier row over all columns.
///
/// Missing values compare equal to each other.
pub fn count_duplicate_rows(df: &DataFrame) -> PolarsResult<usize> {
    if df.width() == 0 || df.height() == 0 {
        return Ok(0);
    }
    let unique = df.unique_stable(None, UniqueKeepStrategy::First, None)?;
    Ok(df.height() - unique.height())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_parse_numeric_string() {
        assert_eq!(parse_numeric_string("42"), Some(42.0));
        assert_eq!(parse_numeric_string("$1,234.56"), Some(1234.56));
        assert_eq!(parse_numeric_string("-100"), Some(-100.0));
        assert_eq!(parse_numeric_string("  42%  "), Some(42.0));
        assert_eq!(parse_numeric_string("£ 9"), Some(9.0));
        assert_eq!(parse_numeric_string("$"), None);
        assert_eq!(parse_numeric_string(""), None);
        assert_eq!(parse_numeric_string("hello"), None);
        assert_eq!(parse_numeric_string("inf"), None);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(3.14159, 2), 3.14);
        assert_eq!(round_to(2.005, 0), 2.0);
    }

    #[test]
    fn test_mode_row_index_tie_goes_to_first() {
        let s = Series::new("c".into(), &[Some("b"), Some("a"), None, Some("a"), Some("b")]);
        assert_eq!(mode_row_index(&s).unwrap(), Some(0));

        let s = Series::new("c".into(), &[Some("x"), Some("y"), Some("y")]);
        assert_eq!(mode_row_index(&s).unwrap(), Some(1));
    }

    #[test]
    fn test_mode_row_index_all_null() {
        let s = Series::new("c".into(), &[None::<&str>, None]);
        assert_eq!(mode_row_index(&s).unwrap(), None);
    }

    #[test]
    fn test_missing_equals_missing_for_duplicates() {
        let df = df! {
            "a" => &[Some(1), None, None, Some(1)],
            "b" => &[Some("x"), None, None, Some("y")],
        }
        .unwrap();
        assert_eq!(count_duplicate_rows(&df).unwrap(), 1);
    }

    #[test]
    fn test_count_duplicates_counts_every_repeat() {
        let df = df! {
            "a" => &[1, 2, 1, 1, 2, 3],
            "b" => &["x", "y", "x", "x", "y", "z"],
        }
        .unwrap();
        assert_eq!(count_duplicate_rows(&df).unwrap(), 3);
    }

    #[test]
    fn test_count_duplicates_empty_frame() {
        let df = DataFrame::empty();
        assert_eq!(count_duplicate_rows(&df).unwrap(), 0);
    }
}
