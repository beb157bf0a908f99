use std::sync::Arc;

use polars::prelude::DataFrame;
use tracing::{info, warn};

use super::{DatasetSnapshot, Validator};
use crate::ai::AIProvider;
use crate::error::{CleaningError, Result};
use crate::planner::parse::parse_validation;
use crate::types::ValidationResult;

/// Asks an advisory service to rate the run.
///
/// Returns [`ValidationResult::unavailable`] when the service fails or its
/// answer cannot be decoded.
pub struct AdvisoryValidator {
    provider: Arc<dyn AIProvider>,
}

impl AdvisoryValidator {
    pub fn new(provider: Arc<dyn AIProvider>) -> Self {
        Self { provider }
    }

    /// Request and decode a validation without the neutral fallback.
    pub fn try_validate(
        &self,
        original: &DataFrame,
        cleaned: &DataFrame,
        actions: &[String],
    ) -> Result<ValidationResult> {
        let prompt = build_prompt(&DatasetSnapshot::of(original), &DatasetSnapshot::of(cleaned), actions)?;
        let response = self
            .provider
            .generate(&prompt)
            .map_err(|e| CleaningError::AdvisoryService(format!("{}: {e}", self.provider.name())))?;
        Ok(parse_validation(&response)?)
    }
}

fn build_prompt(before: &DatasetSnapshot, after: &DatasetSnapshot, actions: &[String]) -> Result<String> {
    let actions = serde_json::to_string_pretty(actions)?;
    Ok(format!(
        "You are a data quality expert. Evaluate this data cleaning job.\n\n\
        BEFORE CLEANING:\n\
        - Shape: ({}, {})\n\
        - Missing values: {}\n\
        - Duplicates: {}\n\n\
        AFTER CLEANING:\n\
        - Shape: ({}, {})\n\
        - Missing values: {}\n\
        - Duplicates: {}\n\n\
        ACTIONS TAKEN:\n{}\n\n\
        Rate the cleaning quality from 1-10 and provide brief feedback.\n\
        Return JSON: {{\"score\": 8, \"feedback\": \"Good cleaning, but...\", \"suggestions\": [\"Add X\", \"Consider Y\"]}}\n",
        before.rows,
        before.columns,
        before.missing,
        before.duplicates,
        after.rows,
        after.columns,
        after.missing,
        after.duplicates,
        actions,
    ))
}

impl Validator for AdvisoryValidator {
    fn validate(&self, original: &DataFrame, cleaned: &DataFrame, actions: &[String]) -> ValidationResult {
        match self.try_validate(original, cleaned, actions) {
            Ok(result) => {
                info!("Advisory validation score: {}/10", result.score);
                result
            }
            Err(e) => {
                warn!("Advisory validation failed: {}", e);
                ValidationResult::unavailable()
            }
        }
    }

    fn name(&self) -> &'static str {
        "advisory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    struct FixedProvider(&'static str);

    impl AIProvider for FixedProvider {
        fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn frames() -> (DataFrame, DataFrame) {
        let original = df! { "a" => &[Some(1), None, Some(1)] }.unwrap();
        let cleaned = df! { "a" => &[1, 2] }.unwrap();
        (original, cleaned)
    }

    #[test]
    fn test_decoded_result_is_returned() {
        let (original, cleaned) = frames();
        let validator = AdvisoryValidator::new(Arc::new(FixedProvider(
            r#"{"score": 9, "feedback": "Nice", "suggestions": []}"#,
        )));
        let result = validator.validate(&original, &cleaned, &["Removed 1 duplicate rows".to_string()]);
        assert_eq!(result.score, 9);
        assert_eq!(result.feedback, "Nice");
    }

    #[test]
    fn test_garbage_yields_neutral_result() {
        let (original, cleaned) = frames();
        let validator = AdvisoryValidator::new(Arc::new(FixedProvider("ten out of ten")));
        assert_eq!(validator.validate(&original, &cleaned, &[]), ValidationResult::unavailable());
    }

    #[test]
    fn test_out_of_range_score_is_clamped() {
        let (original, cleaned) = frames();
        let validator = AdvisoryValidator::new(Arc::new(FixedProvider(r#"{"score": 15}"#)));
        assert_eq!(validator.validate(&original, &cleaned, &[]).score, 10);
    }

    #[test]
    fn test_prompt_lists_counts_and_actions() {
        let (original, cleaned) = frames();
        let prompt = build_prompt(
            &DatasetSnapshot::of(&original),
            &DatasetSnapshot::of(&cleaned),
            &["Removed 1 duplicate rows".to_string()],
        )
        .unwrap();
        assert!(prompt.contains("- Shape: (3, 1)"));
        assert!(prompt.contains("- Missing values: 1"));
        assert!(prompt.contains("Removed 1 duplicate rows"));
    }
}
