use anyhow::Result;
use polars::prelude::*;
use tracing::debug;

use crate::utils::{is_numeric_dtype, series_to_f64};

/// Nearest-neighbor imputer over numeric columns.
///
/// Distances use the NaN-aware euclidean metric: squared differences are
/// summed over the coordinates present in both rows, then scaled by
/// `total / present` before the square root. Donors are rows that have a
/// value in the column being imputed; the imputed value is the unweighted
/// mean of the `k` closest donors.
pub struct KNNImputer {
    n_neighbors: usize,
}

impl KNNImputer {
    /// Create a new KNN imputer with specified number of neighbors
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
        }
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// Impute the nulls of every numeric column in `columns`.
    ///
    /// Distances are computed over all of `columns`. Only columns that had
    /// nulls are replaced, as `Float64`; the rest keep their dtype.
    pub fn fit_transform(&self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        let mut result_df = df.clone();

        let numeric_cols: Vec<String> = columns
            .iter()
            .filter(|col| {
                df.column(col)
                    .map(|c| is_numeric_dtype(c.dtype()))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        let data_matrix = self.create_data_matrix(df, &numeric_cols)?;
        let n_rows = df.height();

        let to_impute: Vec<usize> = (0..numeric_cols.len())
            .filter(|&c| data_matrix.iter().any(|row| row[c].is_none()))
            .collect();

        if to_impute.is_empty() {
            return Ok(result_df);
        }

        debug!("KNN imputing {} columns with k={}", to_impute.len(), self.n_neighbors);

        for &col_idx in &to_impute {
            let column_mean = column_mean(&data_matrix, col_idx);
            let donors: Vec<usize> = (0..n_rows)
                .filter(|&row| data_matrix[row][col_idx].is_some())
                .collect();

            let imputed: Vec<Option<f64>> = (0..n_rows)
                .map(|row| match data_matrix[row][col_idx] {
                    Some(value) => Some(value),
                    None => Some(self.impute_value(&data_matrix, row, col_idx, &donors, column_mean)),
                })
                .collect();

            let name = numeric_cols[col_idx].as_str();
            result_df.replace(name, Series::new(name.into(), imputed))?;
        }

        Ok(result_df)
    }

    /// Create a data matrix from the dataframe for distance calculations
    fn create_data_matrix(&self, df: &DataFrame, columns: &[String]) -> Result<Vec<Vec<Option<f64>>>> {
        let n_rows = df.height();
        let mut matrix = vec![vec![None; columns.len()]; n_rows];

        for (col_idx, col_name) in columns.iter().enumerate() {
            let values = series_to_f64(df.column(col_name)?.as_materialized_series())?;
            for (row, value) in matrix.iter_mut().zip(values) {
                row[col_idx] = value;
            }
        }

        Ok(matrix)
    }

    fn impute_value(
        &self,
        data_matrix: &[Vec<Option<f64>>],
        target_row: usize,
        target_col: usize,
        donors: &[usize],
        fallback: f64,
    ) -> f64 {
        let mut distances: Vec<(usize, f64)> = donors
            .iter()
            .filter_map(|&donor| {
                nan_euclidean(&data_matrix[target_row], &data_matrix[donor]).map(|d| (donor, d))
            })
            .collect();

        if distances.is_empty() {
            return fallback;
        }

        // Stable sort keeps row order among equidistant donors.
        distances.sort_by(|a, b| a.1.total_cmp(&b.1));

        let k = self.n_neighbors.min(distances.len());
        let sum: f64 = distances
            .iter()
            .take(k)
            .filter_map(|(row, _)| data_matrix[*row][target_col])
            .sum();
        sum / k as f64
    }
}

/// NaN-aware euclidean distance; `None` when the rows share no coordinate.
fn nan_euclidean(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let total = a.len();
    let mut present = 0usize;
    let mut sum_sq = 0.0;

    for (x, y) in a.iter().zip(b) {
        if let (Some(x), Some(y)) = (x, y) {
            sum_sq += (x - y).powi(2);
            present += 1;
        }
    }

    if present == 0 {
        None
    } else {
        Some((sum_sq * total as f64 / present as f64).sqrt())
    }
}

/// Mean of the present values; 0.0 when the column is entirely missing.
fn column_mean(data_matrix: &[Vec<Option<f64>>], col: usize) -> f64 {
    let (sum, count) = data_matrix
        .iter()
        .filter_map(|row| row[col])
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count > 0 { sum / count as f64 } else { 0.0 }
}
