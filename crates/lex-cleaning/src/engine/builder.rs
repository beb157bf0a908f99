//! The cleaning engine and its builder.

use std::sync::Arc;

use polars::prelude::*;
use tracing::{debug, error, info, warn};

use super::progress::{
    CancellationToken, CleaningStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
use super::{AgentMemory, CleaningOutcome, EngineState};
use crate::ai::AIProvider;
use crate::config::EngineConfig;
use crate::detectors::{AnomalyDetector, IsolationForest};
use crate::error::{CleaningError, Result};
use crate::operations::{CleaningOperation, OperationRegistry, summarize_profile};
use crate::planner::{AdvisoryPlanner, Planner, RuleBasedPlanner};
use crate::profiler::QualityProfiler;
use crate::reporting::{ReportGenerator, ReportParams};
use crate::types::{
    OperationId, OperationMetadata, OperationParams, Plan, PlanOrigin, QualityProfile, ReportMode,
};
use crate::validation::{AdvisoryValidator, RuleBasedValidator, Validator};

/// Orchestrates one cleaning run: profile, plan, execute, validate, report.
///
/// Use [`CleaningEngine::builder()`] to create an engine.
///
/// # Example
///
/// ```rust,ignore
/// use lex_cleaning::{CleaningEngine, EngineConfig, CancellationToken};
/// use lex_cleaning::ai::OpenRouterProvider;
/// use std::sync::Arc;
///
/// // With an advisory provider and progress reporting
/// let provider = Arc::new(OpenRouterProvider::new(api_key)?);
/// let token = CancellationToken::new();
///
/// let outcome = CleaningEngine::builder()
///     .ai_provider(provider)
///     .cancellation_token(token.clone())
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run(dataframe)?;
///
/// // Rule-based only
/// let outcome = CleaningEngine::builder()
///     .config(EngineConfig::builder().use_advisory_planning(false).build()?)
///     .build()?
///     .run(dataframe)?;
/// ```
pub struct CleaningEngine {
    config: EngineConfig,
    registry: OperationRegistry,
    ai_provider: Option<Arc<dyn AIProvider>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
    reporter: ReportGenerator,
}

static_assertions::assert_impl_all!(CleaningEngine: Send, Sync);

impl std::fmt::Debug for CleaningEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleaningEngine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("ai_provider", &self.ai_provider.as_ref().map(|p| p.name()))
            .field("progress_reporter", &self.progress_reporter.is_some())
            .field("cancelled", &self.cancellation_token.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Mutable bookkeeping of a single run.
struct RunState {
    state: EngineState,
    memory: AgentMemory,
    actions: Vec<String>,
    notes: Vec<String>,
    iterations: usize,
    skipped_steps: usize,
}

impl CleaningEngine {
    pub fn builder() -> CleaningEngineBuilder {
        CleaningEngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Profile and plan without executing anything.
    pub fn plan(&self, df: &DataFrame) -> Plan {
        let profile = QualityProfiler::profile(df);
        self.planner().plan(&profile)
    }

    /// Run the full workflow with a plan chosen by the configured planner.
    ///
    /// # Errors
    ///
    /// Returns `Err(CleaningError::Cancelled)` if the cancellation token was
    /// set before a plan step. Operation failures never surface here; they
    /// are recorded in memory and the report.
    pub fn run(&self, df: DataFrame) -> Result<CleaningOutcome> {
        self.finish(self.run_internal(df, None))
    }

    /// Run the workflow with a caller-supplied plan. Planning is skipped.
    pub fn run_plan(&self, df: DataFrame, plan: Plan) -> Result<CleaningOutcome> {
        self.finish(self.run_internal(df, Some(plan)))
    }

    fn finish(&self, result: Result<CleaningOutcome>) -> Result<CleaningOutcome> {
        match result {
            Ok(outcome) => {
                self.report_progress(ProgressUpdate::complete("Cleaning run completed successfully"));
                Ok(outcome)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("Cleaning run error: {}", e);
                Err(e)
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(CleaningError::Cancelled);
        }
        Ok(())
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn advisory_provider(&self, enabled: bool) -> Option<&Arc<dyn AIProvider>> {
        if enabled { self.ai_provider.as_ref() } else { None }
    }

    fn planner(&self) -> Box<dyn Planner> {
        match self.advisory_provider(self.config.use_advisory_planning) {
            Some(provider) => Box::new(AdvisoryPlanner::new(
                provider.clone(),
                self.config.clone(),
                self.registry.catalog(),
            )),
            None => Box::new(RuleBasedPlanner::new(self.config.clone())),
        }
    }

    fn validator(&self) -> Box<dyn Validator> {
        match self.advisory_provider(self.config.use_advisory_validation) {
            Some(provider) => Box::new(AdvisoryValidator::new(provider.clone())),
            None => Box::new(RuleBasedValidator),
        }
    }

    fn run_internal(&self, df: DataFrame, explicit_plan: Option<Plan>) -> Result<CleaningOutcome> {
        info!("Starting cleaning run...");
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Initializing,
            0.0,
            "Starting cleaning run...",
        ));

        let mut run = RunState {
            state: EngineState::Idle,
            memory: AgentMemory::new(self.config.memory_size),
            actions: Vec::new(),
            notes: Vec::new(),
            iterations: 0,
            skipped_steps: 0,
        };
        let original = df.clone();

        // Step 1: Profile and record the inspection (iteration 0, outside the budget)
        run.state.transition(EngineState::Profiling)?;
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Profiling,
            0.0,
            "Profiling dataset...",
        ));
        let profile = QualityProfiler::profile(&df);
        self.record_inspection(&mut run, &profile);
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Profiling,
            1.0,
            "Profiling complete",
        ));

        // Step 2: Plan
        self.report_progress(ProgressUpdate::new(CleaningStage::Planning, 0.0, "Planning..."));
        let plan = match explicit_plan {
            Some(mut plan) => {
                plan.origin = PlanOrigin::Explicit;
                info!("Using explicit {}-step plan", plan.len());
                plan
            }
            None => {
                let planner = self.planner();
                info!("Using {} planner...", planner.name());
                planner.plan(&profile)
            }
        };
        if plan.origin == PlanOrigin::Fallback {
            run.notes
                .push("Advisory planning failed; the rule-based plan was used".to_string());
        }
        debug!("Plan: {:?}", plan.operation_names());
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Planning,
            1.0,
            format!("Plan has {} steps", plan.len()),
        ));

        // Step 3: Execute
        run.state.transition(EngineState::Executing)?;
        let df = self.execute_plan(df, &plan, &mut run)?;

        // Step 4: Validate
        run.state.transition(EngineState::Validating)?;
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Validating,
            0.0,
            "Validating result...",
        ));
        let validation = self.validator().validate(&original, &df, &run.actions);
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Validating,
            1.0,
            format!("Quality score: {}/10", validation.score),
        ));

        // Step 5: Report
        run.state.transition(EngineState::Reporting)?;
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Reporting,
            0.0,
            "Generating report...",
        ));
        let report = self.reporter.generate_report(ReportParams {
            original: &original,
            cleaned: &df,
            iterations: run.iterations,
            skipped_steps: run.skipped_steps,
            validation,
            actions_taken: run.actions,
            notes: run.notes,
            mode: ReportMode::from(plan.origin),
        });

        run.state.transition(EngineState::Done)?;
        info!(
            "Cleaning run complete: {:?} -> {:?}, score {}/10",
            report.summary.original_shape, report.summary.cleaned_shape, report.quality_score
        );

        Ok(CleaningOutcome {
            dataset: df,
            report,
            memory: run.memory.into_vec(),
            plan,
            iterations: run.iterations,
            state: run.state,
        })
    }

    fn record_inspection(&self, run: &mut RunState, profile: &QualityProfile) {
        let op = OperationId::InspectData.as_str();
        let (message, metadata) = match summarize_profile(profile) {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Could not summarize profile: {}", e);
                (
                    format!(
                        "Inspected dataset: {} rows, {} columns",
                        profile.row_count(),
                        profile.column_count()
                    ),
                    OperationMetadata::new(),
                )
            }
        };
        info!("{}", message);
        run.actions.push(message.clone());
        run.memory.record(0, op, true, message, metadata);
    }

    fn execute_plan(&self, mut df: DataFrame, plan: &Plan, run: &mut RunState) -> Result<DataFrame> {
        let total = plan.len();

        for (index, step) in plan.steps.iter().enumerate() {
            if self.check_cancelled().is_err() {
                warn!("Cancellation requested before step {}", index + 1);
                run.state.transition(EngineState::Failed { step: index })?;
                return Err(CleaningError::Cancelled);
            }

            if run.iterations >= self.config.max_iterations {
                let skipped: Vec<&str> = plan.steps[index..].iter().map(|s| s.operation.as_str()).collect();
                run.skipped_steps = skipped.len();
                warn!(
                    "Iteration budget of {} reached, skipping {} steps: {:?}",
                    self.config.max_iterations,
                    skipped.len(),
                    skipped
                );
                run.notes.push(format!(
                    "Iteration budget of {} reached; skipped {} remaining steps: {}",
                    self.config.max_iterations,
                    skipped.len(),
                    skipped.join(", ")
                ));
                break;
            }

            run.state.transition(EngineState::Executing)?;
            run.iterations += 1;
            self.report_progress(ProgressUpdate::with_items(
                CleaningStage::Executing,
                format!("Step: {}", step.operation),
                index,
                total,
                format!("Running {} ({}/{})", step.operation, index + 1, total),
            ));

            let Some(operation) = self.registry.resolve(&step.operation) else {
                let message = format!("Unknown operation '{}'", step.operation);
                warn!("{}", message);
                run.notes
                    .push(format!("Step {} skipped: unknown operation '{}'", index + 1, step.operation));
                run.actions.push(message.clone());
                run.memory.record(
                    run.iterations,
                    step.operation.clone(),
                    false,
                    message,
                    OperationMetadata::new(),
                );
                continue;
            };

            info!(
                "Step {}/{}: {} ({})",
                index + 1,
                total,
                step.operation,
                if step.reason.is_empty() { "no reason given" } else { &step.reason }
            );
            df = self.apply_step(operation.as_ref(), df, &step.parameters, run);
        }

        self.report_progress(ProgressUpdate::new(
            CleaningStage::Executing,
            1.0,
            format!("Executed {} steps", run.iterations),
        ));
        Ok(df)
    }

    /// Execute one operation and adopt its dataset only on success.
    fn apply_step(
        &self,
        operation: &dyn CleaningOperation,
        df: DataFrame,
        params: &OperationParams,
        run: &mut RunState,
    ) -> DataFrame {
        let name = operation.id().as_str();
        let result = operation.execute(&df, params);

        let (success, message) = if result.success && result.dataset.height() > df.height() {
            let message = format!(
                "{} failed: produced more rows than its input ({} > {})",
                operation.id().display_name(),
                result.dataset.height(),
                df.height()
            );
            error!("{}", message);
            (false, message)
        } else {
            (result.success, result.message)
        };

        if !success {
            warn!("Step {} failed, dataset unchanged: {}", name, message);
        }
        run.actions.push(message.clone());
        run.memory
            .record(run.iterations, name, success, message, result.metadata);

        if success { result.dataset } else { df }
    }
}

/// Builder for creating a [`CleaningEngine`] instance.
///
/// Use [`CleaningEngine::builder()`] to get started.
#[derive(Default)]
pub struct CleaningEngineBuilder {
    config: Option<EngineConfig>,
    ai_provider: Option<Arc<dyn AIProvider>>,
    anomaly_detector: Option<Arc<dyn AnomalyDetector>>,
    operations: Vec<Arc<dyn CleaningOperation>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(CleaningEngineBuilder: Send);

impl CleaningEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the advisory provider used for planning and validation.
    ///
    /// Without a provider the engine plans and validates with rules, whatever
    /// the `use_advisory_*` flags say.
    pub fn ai_provider(mut self, provider: Arc<dyn AIProvider>) -> Self {
        self.ai_provider = Some(provider);
        self
    }

    /// Replace the default isolation forest used by `detect_outliers`.
    pub fn anomaly_detector(mut self, detector: Arc<dyn AnomalyDetector>) -> Self {
        self.anomaly_detector = Some(detector);
        self
    }

    /// Register an operation, replacing the built-in one with the same id.
    pub fn operation(mut self, operation: Arc<dyn CleaningOperation>) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// ```rust,ignore
    /// let engine = CleaningEngine::builder()
    ///     .on_progress(|update| {
    ///         println!("[{:.0}%] {:?}: {}", update.progress * 100.0, update.stage, update.message);
    ///     })
    ///     .build()?;
    /// ```
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the engine.
    ///
    /// Returns `CleaningError::Config` if the configuration is out of range.
    pub fn build(self) -> Result<CleaningEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let detector = self
            .anomaly_detector
            .unwrap_or_else(|| Arc::new(IsolationForest::default()));
        let mut registry = OperationRegistry::with_defaults(&config, detector);
        for operation in self.operations {
            registry.register(operation);
        }

        Ok(CleaningEngine {
            config,
            registry,
            ai_provider: self.ai_provider,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
            reporter: ReportGenerator::default(),
        })
    }
}
