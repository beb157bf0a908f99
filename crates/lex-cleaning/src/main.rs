//! CLI entry point for the data cleaning engine.

use anyhow::{Result, anyhow};
use clap::Parser;
use dotenv::dotenv;
use lex_cleaning::{
    CleaningEngine, CleaningEngineBuilder, CleaningOutcome, EngineConfig, Plan, PlanOrigin, PlanStep,
    QualityProfile, QualityProfiler, ReportGenerator,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[cfg(feature = "ai")]
use lex_cleaning::ai::{OpenRouterConfig, OpenRouterProvider};
#[cfg(feature = "ai")]
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Rule-driven data cleaning with optional LLM-advised planning",
    long_about = "Profiles a CSV dataset, plans a sequence of cleaning steps, executes them \
                  under an iteration budget and reports a quality score.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  OPENROUTER_API_KEY    API key for OpenRouter (enables advisory planning)\n  \
                  LLM_MODEL             Model used for advisory planning\n\n\
                  EXAMPLES:\n  \
                  # Clean with the default plan\n  \
                  lex-cleaning -i customers.csv\n\n  \
                  # Preview the plan without executing it\n  \
                  lex-cleaning -i customers.csv --dry-run\n\n  \
                  # Execute a hand-written plan\n  \
                  lex-cleaning -i customers.csv --plan plan.json --emit-report\n\n  \
                  # Rule-based mode (no advisory service)\n  \
                  lex-cleaning -i customers.csv --no-ai"
)]
struct Args {
    /// Path to the CSV file to clean
    #[arg(short, long)]
    input: String,

    /// Output directory for results
    #[arg(short, long, default_value = "./outputs")]
    output: String,

    /// Base name for output files (default: the input file stem)
    #[arg(long)]
    output_name: Option<String>,

    /// JSON file with an explicit plan to execute instead of planning
    ///
    /// Either an array of {"tool", "parameters", "reason"} steps or an
    /// object with a "steps" array.
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Show the profile and the plan without executing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the outcome as JSON to stdout; disables logging
    #[arg(long)]
    json: bool,

    /// Write the report to <output>/<name>_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,

    /// Disable the advisory service (rule-based planning and validation)
    #[arg(long)]
    no_ai: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Columns with a missing fraction above this are dropped (0.0 - 1.0)
    #[arg(long, env = "MISSING_VALUE_THRESHOLD", default_value_t = lex_cleaning::config::DEFAULT_MISSING_VALUE_THRESHOLD)]
    missing_threshold: f64,

    /// Expected share of outliers (0.0 - 0.5)
    #[arg(long, env = "OUTLIER_CONTAMINATION", default_value_t = lex_cleaning::config::DEFAULT_OUTLIER_CONTAMINATION)]
    contamination: f64,

    /// Number of neighbors for KNN imputation
    #[arg(long, env = "KNN_NEIGHBORS", default_value_t = lex_cleaning::config::DEFAULT_KNN_NEIGHBORS)]
    knn_neighbors: usize,

    /// Maximum number of plan steps executed
    #[arg(long, env = "MAX_AGENT_ITERATIONS", default_value_t = lex_cleaning::config::DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Number of memory entries retained
    #[arg(long, env = "AGENT_MEMORY_SIZE", default_value_t = lex_cleaning::config::DEFAULT_MEMORY_SIZE)]
    memory_size: usize,

    /// API key for the advisory service
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model used by the advisory service
    #[arg(long, env = "LLM_MODEL")]
    model: Option<String>,
}

/// Plan file layouts accepted by `--plan`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PlanFile {
    Steps(Vec<PlanStep>),
    Wrapped { steps: Vec<PlanStep> },
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so that stdout only
/// carries the JSON document.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    // Load .env before parsing so env-backed arguments see it
    dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    let config = EngineConfig::builder()
        .missing_value_threshold(args.missing_threshold)
        .outlier_contamination(args.contamination)
        .knn_neighbors(args.knn_neighbors)
        .max_iterations(args.max_iterations)
        .memory_size(args.memory_size)
        .use_advisory_planning(!args.no_ai)
        .use_advisory_validation(!args.no_ai)
        .build()?;

    info!("Loading dataset from: {}", args.input);
    let data = load_csv_with_fallbacks(&args.input)?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    let explicit_plan = match &args.plan {
        Some(path) => Some(load_plan(path)?),
        None => None,
    };

    let engine = build_engine(&args, config)?;

    if args.dry_run {
        return run_dry_run(&args, &engine, &data, explicit_plan);
    }

    run_engine(&engine, &args, data, explicit_plan)
}

/// Read an explicit plan. Unknown operation names are kept; the engine
/// records them as failed steps.
fn load_plan(path: &Path) -> Result<Plan> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Could not read plan file {}: {}", path.display(), e))?;
    let steps = match serde_json::from_str::<PlanFile>(&content)
        .map_err(|e| anyhow!("Invalid plan file {}: {}", path.display(), e))?
    {
        PlanFile::Steps(steps) | PlanFile::Wrapped { steps } => steps,
    };
    info!("Loaded {}-step plan from {}", steps.len(), path.display());
    Ok(Plan::new(steps, PlanOrigin::Explicit))
}

fn with_progress_logging(builder: CleaningEngineBuilder, args: &Args) -> CleaningEngineBuilder {
    if args.quiet || args.json {
        return builder;
    }
    builder.on_progress(|update| {
        info!(
            "[{:.0}%] {}: {}",
            update.progress * 100.0,
            update.stage.display_name(),
            update.message
        );
    })
}

/// Build the engine with optional advisory support
#[cfg(feature = "ai")]
fn build_engine(args: &Args, config: EngineConfig) -> Result<CleaningEngine> {
    let mut builder = CleaningEngine::builder().config(config);

    if args.no_ai {
        info!("Running in rule-based mode (advisory service disabled)");
    } else {
        match args.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(api_key) => {
                let mut provider_config = OpenRouterConfig::builder();
                if let Some(model) = &args.model {
                    provider_config = provider_config.model(model);
                }
                let provider = OpenRouterProvider::with_config(api_key, provider_config.build())?;
                info!(
                    "Running with advisory planning (OpenRouter, {})",
                    provider.config().model
                );
                builder = builder.ai_provider(Arc::new(provider));
            }
            None => {
                warn!("OPENROUTER_API_KEY not set. Falling back to rule-based planning.");
            }
        }
    }

    Ok(with_progress_logging(builder, args).build()?)
}

/// Build the engine without advisory support (the "ai" feature is disabled)
#[cfg(not(feature = "ai"))]
fn build_engine(args: &Args, config: EngineConfig) -> Result<CleaningEngine> {
    if !args.no_ai {
        warn!("Advisory support not compiled in. Using rule-based mode.");
        warn!("Compile with --features ai to enable it.");
    }
    let builder = CleaningEngine::builder().config(config);
    Ok(with_progress_logging(builder, args).build()?)
}

/// Show the profile and the plan without executing anything.
///
/// Uses `println!` on purpose: this output is the point of `--dry-run` and
/// must not depend on the log level.
fn run_dry_run(args: &Args, engine: &CleaningEngine, data: &DataFrame, explicit_plan: Option<Plan>) -> Result<()> {
    let profile = QualityProfiler::profile(data);
    let plan = explicit_plan.unwrap_or_else(|| engine.plan(data));

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "profile": profile, "plan": plan }))?
        );
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Preview of cleaning plan");
    println!("{}\n", "=".repeat(80));

    print_profile(args, &profile);

    println!("PLAN ({:?})", plan.origin);
    println!("{}", "-".repeat(40));
    let budget = engine.config().max_iterations;
    for (i, step) in plan.steps.iter().enumerate() {
        let marker = if i < budget { " " } else { "x" };
        println!("  {}{}. {} {}", marker, i + 1, step.operation, serde_json::Value::Object(step.parameters.clone()));
        if !step.reason.is_empty() {
            println!("       {}", step.reason);
        }
    }
    if plan.len() > budget {
        println!(
            "  (x = beyond the iteration budget of {}; will be skipped)",
            budget
        );
    }
    println!();

    let base_name = output_base_name(args);
    println!("OUTPUT FILES (will be created)");
    println!("{}", "-".repeat(40));
    println!("  - {}/{}_cleaned.csv", args.output, base_name);
    if args.emit_report {
        println!("  - {}/{}_report.json", args.output, base_name);
    }
    println!();
    println!("{}", "=".repeat(80));
    println!("To execute this plan, run without --dry-run");
    println!("{}", "=".repeat(80));

    Ok(())
}

fn print_profile(args: &Args, profile: &QualityProfile) {
    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", args.input);
    println!("  Rows: {}", profile.row_count());
    println!("  Columns: {}", profile.column_count());
    println!("  Duplicate rows: {}", profile.duplicate_rows);
    println!(
        "  Missing values: {} ({:.1}% of cells)",
        profile.total_missing(),
        profile.total_missing_percentage()
    );
    println!();

    println!("COLUMNS");
    println!("{}", "-".repeat(40));
    println!("{:<24} {:<14} {:<12} {:<10}", "Column", "Type", "Class", "Missing %");
    println!("{}", "-".repeat(64));
    for col in &profile.columns {
        println!(
            "{:<24} {:<14} {:<12} {:<10.1}",
            truncate_str(&col.name, 23),
            truncate_str(&col.dtype, 13),
            format!("{:?}", col.class).to_lowercase(),
            col.missing_percentage
        );
    }
    println!();
}

/// Truncate a string to max length (in characters) with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn run_engine(engine: &CleaningEngine, args: &Args, data: DataFrame, explicit_plan: Option<Plan>) -> Result<()> {
    info!("{}", "=".repeat(80));
    info!("Starting cleaning run...");
    info!("{}", "=".repeat(80));

    let result = match explicit_plan {
        Some(plan) => engine.run_plan(data, plan),
        None => engine.run(data),
    };

    match result {
        Ok(outcome) => handle_outcome(outcome, args),
        Err(e) => {
            error!("Cleaning run failed: {}", e);
            Err(anyhow!("Cleaning run failed: {}", e))
        }
    }
}

/// Handle the run outcome based on CLI flags.
///
/// - Default: write the cleaned CSV and print a human-readable summary
/// - `--json`: print the outcome as JSON to stdout only
/// - `--emit-report`: also write the report JSON
fn handle_outcome(mut outcome: CleaningOutcome, args: &Args) -> Result<()> {
    let base_name = output_base_name(args);
    let generator = ReportGenerator::new(PathBuf::from(&args.output));

    let dataset_path = generator.write_dataset_csv(&mut outcome.dataset, &base_name)?;
    debug!("Cleaned dataset written to {}", dataset_path.display());

    let report_path = if args.emit_report {
        Some(generator.write_report_to_file(&outcome.report, &base_name)?)
    } else {
        None
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "input_file": args.input,
                "output_file": dataset_path,
                "report_file": report_path,
                "outcome": outcome,
            }))?
        );
        return Ok(());
    }

    print_human_readable_summary(&outcome, args, &dataset_path, report_path.as_deref());
    Ok(())
}

/// Base name for output files: `--output-name` or the input file stem.
fn output_base_name(args: &Args) -> String {
    args.output_name.clone().unwrap_or_else(|| {
        Path::new(&args.input)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output")
            .to_string()
    })
}

fn print_human_readable_summary(
    outcome: &CleaningOutcome,
    args: &Args,
    dataset_path: &Path,
    report_path: Option<&Path>,
) {
    let report = &outcome.report;
    let summary = &report.summary;

    println!();
    println!("{}", "=".repeat(80));
    println!("CLEANING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input:  {} ({} rows x {} columns)",
        args.input, summary.original_shape.0, summary.original_shape.1
    );
    println!(
        "Output: {} ({} rows x {} columns)",
        dataset_path.display(),
        summary.cleaned_shape.0,
        summary.cleaned_shape.1
    );
    if let Some(path) = report_path {
        println!("Report: {}", path.display());
    }
    println!();

    println!("Quality Score: {}/10 ({:?})", report.quality_score, report.mode);
    println!("  {}", report.feedback);
    println!();

    println!("Summary:");
    println!(
        "  Rows: {} -> {} ({} removed)",
        summary.original_shape.0, summary.cleaned_shape.0, summary.rows_removed
    );
    println!(
        "  Columns: {} -> {} ({} removed)",
        summary.original_shape.1, summary.cleaned_shape.1, summary.columns_removed
    );
    println!("  Steps executed: {}", summary.iterations);
    if summary.skipped_steps > 0 {
        println!("  Steps skipped: {}", summary.skipped_steps);
    }
    println!();

    if !report.actions_taken.is_empty() {
        println!("Actions Taken:");
        for action in &report.actions_taken {
            println!("  - {}", action);
        }
        println!();
    }

    if !report.suggestions.is_empty() {
        println!("Suggestions:");
        for suggestion in &report.suggestions {
            println!("  * {}", suggestion);
        }
        println!();
    }

    if !report.notes.is_empty() {
        println!("Notes:");
        for note in &report.notes {
            println!("  ! {}", note);
        }
        println!();
    }

    println!("Use --json for machine-readable output");
    println!("Use --emit-report to save the JSON report");
    println!("{}", "=".repeat(80));
}

/// Load CSV with multiple fallback strategies
fn load_csv_with_fallbacks(path: &str) -> Result<DataFrame> {
    // Strategy 1: Standard loading with quote handling
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => {
            debug!("Standard loading failed: {}", e);
        }
    }

    // Strategy 2: Pre-clean content
    let content = std::fs::read_to_string(path).map_err(|e| {
        error!("Could not read file: {}", e);
        anyhow!("Could not read {}: {}", path, e)
    })?;
    let cursor = std::io::Cursor::new(clean_csv_content(&content));

    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .into_reader_with_file_handle(cursor)
        .finish()
        .map_err(|e| anyhow!("Failed to parse {}: {}", path, e))
}

/// Collapse doubled quotes and drop blank lines
fn clean_csv_content(content: &str) -> String {
    content
        .replace("\"\"\"", "\"")
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
