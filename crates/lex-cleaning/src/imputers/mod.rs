//! Imputation of missing numeric values.
//!
//! Categorical gaps are filled by the missing-value operation itself
//! (mode fill); this module only holds the distance-based estimator.

mod knn;

pub use knn::KNNImputer;
