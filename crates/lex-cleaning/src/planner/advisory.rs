use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{info, warn};

use super::parse::parse_plan;
use super::{Planner, RuleBasedPlanner};
use crate::ai::AIProvider;
use crate::config::EngineConfig;
use crate::error::{CleaningError, Result};
use crate::operations::OperationSchema;
use crate::types::{Plan, PlanOrigin, QualityProfile};

/// Planner that asks an advisory service for the plan.
///
/// Any failure (transport, unparseable response, unknown operation, empty
/// plan) is logged and replaced by the rule-based plan, tagged
/// [`PlanOrigin::Fallback`].
///
/// # Example
///
/// ```rust,ignore
/// use lex_cleaning::ai::OpenRouterProvider;
/// use lex_cleaning::planner::{AdvisoryPlanner, Planner};
///
/// let provider = Arc::new(OpenRouterProvider::new("api-key")?);
/// let planner = AdvisoryPlanner::new(provider, EngineConfig::default(), registry.catalog());
/// let plan = planner.plan(&profile);
/// ```
pub struct AdvisoryPlanner {
    provider: Arc<dyn AIProvider>,
    fallback: RuleBasedPlanner,
    catalog: Vec<OperationSchema>,
}

impl AdvisoryPlanner {
    pub fn new(provider: Arc<dyn AIProvider>, config: EngineConfig, catalog: Vec<OperationSchema>) -> Self {
        Self {
            provider,
            fallback: RuleBasedPlanner::new(config),
            catalog,
        }
    }

    /// Request and decode a plan without falling back.
    pub fn try_plan(&self, profile: &QualityProfile) -> Result<Plan> {
        let prompt = self.build_prompt(profile);
        let response = self
            .provider
            .generate(&prompt)
            .map_err(|e| CleaningError::AdvisoryService(format!("{}: {e}", self.provider.name())))?;
        let steps = parse_plan(&response)?;
        info!("{} proposed a {}-step plan", self.provider.name(), steps.len());
        Ok(Plan::new(steps, PlanOrigin::Advisory))
    }

    fn build_prompt(&self, profile: &QualityProfile) -> String {
        let missing: Vec<String> = profile
            .columns
            .iter()
            .map(|c| format!("{}: {}", c.name, c.missing_count))
            .collect();
        let columns: Vec<&str> = profile.columns.iter().map(|c| c.name.as_str()).collect();

        let mut prompt = format!(
            "You are a data cleaning expert. Analyze this dataset and create a cleaning plan.\n\n\
            Dataset Profile:\n\
            - Shape: ({}, {})\n\
            - Columns: {:?}\n\
            - Missing Values: {{{}}}\n\
            - Duplicate Rows: {}\n\
            - Numeric Columns: {:?}\n\
            - Categorical Columns: {:?}\n\n\
            Available Tools:\n",
            profile.row_count(),
            profile.column_count(),
            columns,
            missing.join(", "),
            profile.duplicate_rows,
            profile.numeric_columns,
            profile.categorical_columns,
        );

        for (i, tool) in self.catalog.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {} - {}", i + 1, tool.name, tool.description);
            let _ = writeln!(prompt, "   parameters: {}", tool.parameters);
        }

        prompt.push_str(
            "\nCreate a step-by-step cleaning plan. Return ONLY a JSON array of steps.\n\
            Each step should have: {\"tool\": \"tool_name\", \"parameters\": {}, \"reason\": \"why this step\"}\n\n\
            Example:\n\
            [\n  \
            {\"tool\": \"standardize_column_names\", \"parameters\": {}, \"reason\": \"Column names have spaces and inconsistent casing\"},\n  \
            {\"tool\": \"remove_duplicates\", \"parameters\": {}, \"reason\": \"Dataset has 5 duplicate rows\"},\n  \
            {\"tool\": \"handle_missing_values\", \"parameters\": {\"threshold\": 0.5}, \"reason\": \"Several columns have missing values\"},\n  \
            {\"tool\": \"detect_outliers\", \"parameters\": {\"contamination\": 0.05, \"remove\": false}, \"reason\": \"Flag outliers for review\"}\n\
            ]\n\n\
            Return ONLY the JSON array, no other text.\n",
        );

        prompt
    }
}

impl Planner for AdvisoryPlanner {
    fn plan(&self, profile: &QualityProfile) -> Plan {
        match self.try_plan(profile) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Advisory planning failed, using rule-based plan: {}", e);
                Plan::new(self.fallback.steps(profile), PlanOrigin::Fallback)
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
    use crate::operations::OperationRegistry;
    use crate::profiler::QualityProfiler;
    use polars::prelude::*;
    use std::sync::Mutex;

    struct ScriptedProvider {
        reply: anyhow::Result<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(anyhow::anyhow!("connection refused")),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl AIProvider for ScriptedProvider {
        fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn profile() -> QualityProfile {
        let df = df! {
            "Age" => &[Some(30), Some(30), None],
            "City" => &[Some("x"), Some("x"), Some("y")],
        }
        .unwrap();
        QualityProfiler::profile(&df)
    }

    fn planner(provider: Arc<ScriptedProvider>) -> AdvisoryPlanner {
        AdvisoryPlanner::new(provider, EngineConfig::default(), OperationRegistry::default().catalog())
    }

    #[test]
    fn test_advisory_plan_is_used() {
        let provider = Arc::new(ScriptedProvider::ok(
            "```json\n[{\"tool\": \"remove_duplicates\", \"parameters\": {\"keep\": \"last\"}, \"reason\": \"dups\"}]\n```",
        ));
        let plan = planner(provider.clone()).plan(&profile());
        assert_eq!(plan.origin, PlanOrigin::Advisory);
        assert_eq!(plan.operation_names(), vec!["remove_duplicates"]);

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Duplicate Rows: 1"));
        assert!(prompts[0].contains("detect_outliers"));
        assert!(prompts[0].contains("Return ONLY the JSON array"));
    }

    #[test]
    fn test_garbage_falls_back_to_rule_plan() {
        let profile = profile();
        let plan = planner(Arc::new(ScriptedProvider::ok("I think you should clean it."))).plan(&profile);
        let expected = RuleBasedPlanner::new(EngineConfig::default()).plan(&profile);
        assert_eq!(plan.origin, PlanOrigin::Fallback);
        assert_eq!(plan.steps, expected.steps);
    }

    #[test]
    fn test_transport_error_falls_back() {
        let planner = planner(Arc::new(ScriptedProvider::failing()));
        let err = planner.try_plan(&profile()).unwrap_err();
        assert!(matches!(err, CleaningError::AdvisoryService(_)));
        assert_eq!(planner.plan(&profile()).origin, PlanOrigin::Fallback);
    }

    #[test]
    fn test_unknown_tool_is_a_parse_error() {
        let planner = planner(Arc::new(ScriptedProvider::ok(r#"[{"tool": "format_disk"}]"#)));
        assert!(matches!(
            planner.try_plan(&profile()).unwrap_err(),
            CleaningError::AdvisoryParse(_)
        ));
    }
}
