//! Anomaly detectors used by the outlier operation.
//!
//! Detectors are constructed by the hosting layer and injected into the
//! engine. Implementations must be read-only or stateless per call so a
//! single instance can be shared across concurrent runs.

mod isolation_forest;

pub use isolation_forest::IsolationForest;

/// Unsupervised row-level anomaly flagging.
pub trait AnomalyDetector: Send + Sync {
    /// Detector name for logs and metadata.
    fn name(&self) -> &str;

    /// Flag the rows of a dense numeric matrix (rows x features).
    ///
    /// `contamination` is the expected share of anomalous rows.
    fn flag_outliers(&self, matrix: &[Vec<f64>], contamination: f64) -> anyhow::Result<Vec<bool>>;
}

static_assertions::assert_impl_all!(IsolationForest: Send, Sync);
