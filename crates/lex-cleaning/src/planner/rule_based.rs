use serde_json::json;
use tracing::debug;

use super::Planner;
use crate::config::EngineConfig;
use crate::types::{OperationId, OperationParams, Plan, PlanOrigin, PlanStep, QualityProfile};

/// Row count above which outlier flagging is considered statistically meaningful.
const SMALL_DATASET_ROWS: usize = 100;

/// Deterministic planner driven by the profile's defect counts.
///
/// Steps are emitted in a fixed order: standardize names, remove duplicates,
/// handle missing values, flag outliers. Outliers are only ever flagged,
/// never removed, by this planner.
#[derive(Debug, Clone)]
pub struct RuleBasedPlanner {
    config: EngineConfig,
}

impl RuleBasedPlanner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Plan steps without an origin, shared with the advisory fallback.
    pub(crate) fn steps(&self, profile: &QualityProfile) -> Vec<PlanStep> {
        let mut steps = vec![PlanStep::new(
            OperationId::StandardizeColumnNames,
            OperationParams::new(),
            "Ensure consistent column naming convention",
        )];

        if profile.duplicate_rows > 0 {
            steps.push(PlanStep::new(
                OperationId::RemoveDuplicates,
                params(json!({ "keep": "first" })),
                format!("Remove {} duplicate rows", profile.duplicate_rows),
            ));
        }

        let total_missing = profile.total_missing();
        if total_missing > 0 {
            steps.push(PlanStep::new(
                OperationId::HandleMissingValues,
                params(json!({
                    "threshold": self.config.missing_value_threshold,
                    "strategy": "auto",
                })),
                format!(
                    "Handle {} missing values ({:.1}% of data)",
                    total_missing,
                    profile.total_missing_percentage()
                ),
            ));
        }

        if !profile.numeric_columns.is_empty() {
            let reason = if profile.row_count() > SMALL_DATASET_ROWS {
                format!(
                    "Flag potential outliers in {} numeric columns",
                    profile.numeric_columns.len()
                )
            } else {
                "Dataset small, flagging outliers for manual review".to_string()
            };
            steps.push(PlanStep::new(
                OperationId::DetectOutliers,
                params(json!({
                    "contamination": self.config.outlier_contamination,
                    "remove": false,
                })),
                reason,
            ));
        }

        steps
    }
}

fn params(value: serde_json::Value) -> OperationParams {
    match value {
        serde_json::Value::Object(map) => map,
        _ => OperationParams::new(),
    }
}

impl Planner for RuleBasedPlanner {
    fn plan(&self, profile: &QualityProfile) -> Plan {
        let steps = self.steps(profile);
        debug!("Rule-based plan has {} steps", steps.len());
        Plan::new(steps, PlanOrigin::RuleBased)
    }

    fn name(&self) -> &'static str {
        "rule-based"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::QualityProfiler;
    use polars::prelude::*;

    fn planner() -> RuleBasedPlanner {
        RuleBasedPlanner::new(EngineConfig::default())
    }

    #[test]
    fn test_clean_categorical_dataset_only_standardizes() {
        let df = df! { "name" => &["a", "b", "c"] }.unwrap();
        let plan = planner().plan(&QualityProfiler::profile(&df));
        assert_eq!(plan.operation_names(), vec!["standardize_column_names"]);
        assert_eq!(plan.origin, PlanOrigin::RuleBased);
        assert_eq!(plan.steps[0].reason, "Ensure consistent column naming convention");
    }

    #[test]
    fn test_full_plan_order_and_reasons() {
        let df = df! {
            "Age" => &[Some(30), Some(30), None, Some(41)],
            "City" => &[Some("x"), Some("x"), Some("y"), None],
        }
        .unwrap();
        let plan = planner().plan(&QualityProfiler::profile(&df));

        assert_eq!(
            plan.operation_names(),
            vec![
                "standardize_column_names",
                "remove_duplicates",
                "handle_missing_values",
                "detect_outliers"
            ]
        );
        assert_eq!(plan.steps[1].reason, "Remove 1 duplicate rows");
        assert_eq!(plan.steps[1].parameters["keep"], "first");
        assert_eq!(plan.steps[2].reason, "Handle 2 missing values (25.0% of data)");
        assert_eq!(plan.steps[2].parameters["strategy"], "auto");
        assert_eq!(plan.steps[2].parameters["threshold"], 0.5);
        assert_eq!(plan.steps[3].reason, "Dataset small, flagging outliers for manual review");
        assert_eq!(plan.steps[3].parameters["remove"], false);
    }

    #[test]
    fn test_large_dataset_outlier_reason() {
        let values: Vec<f64> = (0..150).map(|i| i as f64).collect();
        let df = df! { "a" => &values, "b" => &values }.unwrap();
        let plan = planner().plan(&QualityProfiler::profile(&df));
        let last = plan.steps.last().unwrap();
        assert_eq!(last.operation_id(), Some(OperationId::DetectOutliers));
        assert_eq!(last.reason, "Flag potential outliers in 2 numeric columns");
    }

    #[test]
    fn test_configured_knobs_flow_into_parameters() {
        let config = EngineConfig::builder()
            .missing_value_threshold(0.3)
            .outlier_contamination(0.1)
            .build()
            .unwrap();
        let df = df! { "a" => &[Some(1.0), None, Some(3.0)] }.unwrap();
        let plan = RuleBasedPlanner::new(config).plan(&QualityProfiler::profile(&df));
        assert_eq!(plan.steps[1].parameters["threshold"], 0.3);
        assert_eq!(plan.steps[2].parameters["contamination"], 0.1);
    }
}
