//! Summary statistics for numeric columns.

use polars::prelude::*;

use crate::types::NumericSummary;
use crate::utils::series_to_f64;

/// Summarize the non-missing values of a numeric series.
///
/// Returns `None` when the column has no usable values.
pub(crate) fn numeric_summary(series: &Series) -> PolarsResult<Option<NumericSummary>> {
    let mut values: Vec<f64> = series_to_f64(series)?.into_iter().flatten().collect();
    if values.is_empty() {
        return Ok(None);
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;

    Ok(Some(NumericSummary {
        count,
        mean,
        std: sample_std(&values, mean),
        min: values[0],
        q1: quantile_sorted(&values, 0.25),
        median: quantile_sorted(&values, 0.5),
        q3: quantile_sorted(&values, 0.75),
        max: values[count - 1],
    }))
}

/// Sample standard deviation (ddof = 1). Undefined for fewer than two values.
pub(crate) fn sample_std(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Quantile of sorted values using linear interpolation between closest ranks.
pub(crate) fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = pos.floor() as usize;
            let upper = pos.ceil() as usize;
            let frac = pos - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_summary_basic() {
        let series = Series::new("val".into(), &[Some(4.0f64), Some(1.0), None, Some(3.0), Some(2.0), Some(5.0)]);
        let summary = numeric_summary(&series).unwrap().unwrap();
        assert_eq!(summary.count, 5);
        assert_eq!(summary.mean, 3.0);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 5.0);
        assert_eq!(summary.q1, 2.0);
        assert_eq!(summary.median, 3.0);
        assert_eq!(summary.q3, 4.0);
        // Variance = 10 / 4 = 2.5
        assert!((summary.std.unwrap() - 2.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_numeric_summary_all_null() {
        let series = Series::new("val".into(), &[None::<f64>, None]);
        assert!(numeric_summary(&series).unwrap().is_none());
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&sorted, 0.5), 2.5);
        assert_eq!(quantile_sorted(&sorted, 0.25), 1.75);
        assert_eq!(quantile_sorted(&sorted, 1.0), 4.0);
    }

    #[test]
    fn test_single_value_std_is_undefined() {
        assert_eq!(sample_std(&[5.0], 5.0), None);
        assert_eq!(sample_std(&[5.0, 5.0, 5.0], 5.0), Some(0.0));
    }
}
