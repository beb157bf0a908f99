//! Post-run quality validation.
//!
//! A [`Validator`] compares the original and cleaned datasets and returns
//! a [`ValidationResult`] with a score in `1..=10`. Validation never fails:
//! the advisory validator degrades to [`ValidationResult::unavailable`].

mod advisory;
mod rule_based;

pub use advisory::AdvisoryValidator;
pub use rule_based::RuleBasedValidator;

use polars::prelude::DataFrame;
use tracing::warn;

use crate::types::ValidationResult;
use crate::utils::{count_duplicate_rows, total_null_count};

pub trait Validator: Send + Sync {
    /// Score the transformation from `original` to `cleaned`. `actions` are
    /// the messages of the executed steps, in order.
    fn validate(&self, original: &DataFrame, cleaned: &DataFrame, actions: &[String]) -> ValidationResult;

    fn name(&self) -> &'static str;
}

/// Defect counts of one dataset, as compared by the validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DatasetSnapshot {
    pub rows: usize,
    pub columns: usize,
    pub missing: usize,
    pub duplicates: usize,
}

impl DatasetSnapshot {
    pub fn of(df: &DataFrame) -> Self {
        let duplicates = count_duplicate_rows(df).unwrap_or_else(|e| {
            warn!("Could not count duplicate rows: {}", e);
            0
        });
        Self {
            rows: df.height(),
            columns: df.width(),
            missing: total_null_count(df),
            duplicates,
        }
    }
}
