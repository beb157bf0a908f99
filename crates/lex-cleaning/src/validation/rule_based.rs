use polars::prelude::DataFrame;
use tracing::info;

use super::{DatasetSnapshot, Validator};
use crate::types::ValidationResult;

const BASE_SCORE: u8 = 5;
const MAX_SCORE: u8 = 10;

/// Scores a run from the change in missing values and duplicate rows.
///
/// Starts at 5; each defect class adds 2 when fully eliminated, or 1 when
/// reduced. Capped at 10.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedValidator;

/// Points earned for one defect class.
fn improvement_points(before: usize, after: usize) -> u8 {
    if before > 0 && after == 0 {
        2
    } else if after < before {
        1
    } else {
        0
    }
}

impl Validator for RuleBasedValidator {
    fn validate(&self, original: &DataFrame, cleaned: &DataFrame, _actions: &[String]) -> ValidationResult {
        let before = DatasetSnapshot::of(original);
        let after = DatasetSnapshot::of(cleaned);

        let score = (BASE_SCORE
            + improvement_points(before.missing, after.missing)
            + improvement_points(before.duplicates, after.duplicates))
        .min(MAX_SCORE);

        let mut improvements = Vec::new();
        if before.missing > after.missing {
            improvements.push(format!(
                "Reduced missing values: {} → {}",
                before.missing, after.missing
            ));
        }
        if before.duplicates > after.duplicates {
            improvements.push(format!(
                "Removed duplicates: {} → {}",
                before.duplicates, after.duplicates
            ));
        }
        if after.rows < before.rows {
            improvements.push(format!("Removed {} problematic rows", before.rows - after.rows));
        }

        let feedback = if improvements.is_empty() {
            "Dataset was already clean.".to_string()
        } else {
            format!("Automated cleaning completed. {}", improvements.join(" | "))
        };

        let mut suggestions = Vec::new();
        if after.missing > 0 {
            suggestions.push(format!(
                "Manual review recommended: {} missing values remain",
                after.missing
            ));
        }
        if after.duplicates > 0 {
            suggestions.push(format!(
                "Check for partial duplicates: {} duplicates remain",
                after.duplicates
            ));
        }
        if after.columns < before.columns {
            suggestions.push("Some columns were dropped - verify this is intended".to_string());
        }

        info!("Rule-based validation score: {}/10", score);
        ValidationResult {
            score,
            feedback,
            suggestions,
        }
    }

    fn name(&self) -> &'static str {
        "rule-based"
    }
}
