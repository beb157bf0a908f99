use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use polars::prelude::*;
use tracing::info;

use crate::error::{CleaningError, Result};
use crate::types::{Report, ReportMode, ReportSummary, ValidationResult};

/// Structured inputs for [`ReportGenerator::generate_report`].
pub struct ReportParams<'a> {
    pub original: &'a DataFrame,
    pub cleaned: &'a DataFrame,
    pub iterations: usize,
    pub skipped_steps: usize,
    pub validation: ValidationResult,
    pub actions_taken: Vec<String>,
    pub notes: Vec<String>,
    pub mode: ReportMode,
}

/// Builds reports and writes run artifacts under an output directory.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./outputs"),
        }
    }
}

impl ReportGenerator {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Assemble the report. Never fails.
    pub fn generate_report(&self, params: ReportParams<'_>) -> Report {
        let ReportParams {
            original,
            cleaned,
            iterations,
            skipped_steps,
            validation,
            actions_taken,
            notes,
            mode,
        } = params;

        let summary = ReportSummary {
            original_shape: (original.height(), original.width()),
            cleaned_shape: (cleaned.height(), cleaned.width()),
            rows_removed: original.height().saturating_sub(cleaned.height()),
            columns_removed: original.width().saturating_sub(cleaned.width()),
            iterations,
            skipped_steps,
        };

        Report {
            summary,
            quality_score: validation.score,
            feedback: validation.feedback,
            suggestions: validation.suggestions,
            actions_taken,
            notes,
            mode,
            timestamp: Local::now().to_rfc3339(),
        }
    }

    /// Write the report as pretty JSON to `{output_dir}/{base}_report.json`.
    pub fn write_report_to_file(&self, report: &Report, base_name: &str) -> Result<PathBuf> {
        let report_path = self.output_dir.join(format!("{}_report.json", base_name));
        let write = || -> Result<()> {
            fs::create_dir_all(&self.output_dir)?;
            let mut file = File::create(&report_path)?;
            file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;
            Ok(())
        };
        write().map_err(|e| CleaningError::ReportWriteFailed(format!("{}: {e}", report_path.display())))?;

        info!("Report saved: {}", report_path.display());
        Ok(report_path)
    }

    /// Write the dataset to `{output_dir}/{base}_cleaned.csv`.
    pub fn write_dataset_csv(&self, df: &mut DataFrame, base_name: &str) -> Result<PathBuf> {
        let output_path = self.output_dir.join(format!("{}_cleaned.csv", base_name));
        let write = |df: &mut DataFrame| -> Result<()> {
            fs::create_dir_all(&self.output_dir)?;
            let mut file = File::create(&output_path)?;
            CsvWriter::new(&mut file)
                .include_header(true)
                .with_separator(b',')
                .with_quote_char(b'"')
                .finish(df)?;
            Ok(())
        };
        write(df).map_err(|e| CleaningError::ReportWriteFailed(format!("{}: {e}", output_path.display())))?;

        info!("Dataset saved: {}", output_path.display());
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lex_cleaning_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn sample_report() -> Report {
        let original = df! { "a" => &[Some(1), None, Some(1)], "b" => &[1, 2, 1] }.unwrap();
        let cleaned = df! { "a" => &[1, 2] }.unwrap();
        ReportGenerator::default().generate_report(ReportParams {
            original: &original,
            cleaned: &cleaned,
            iterations: 3,
            skipped_steps: 1,
            validation: ValidationResult::unavailable(),
            actions_taken: vec!["Removed 1 duplicate rows".to_string()],
            notes: vec!["Skipped 1 step".to_string()],
            mode: ReportMode::RuleBased,
        })
    }

    #[test]
    fn test_generate_report_shape_deltas() {
        let report = sample_report();
        assert_eq!(report.summary.original_shape, (3, 2));
        assert_eq!(report.summary.cleaned_shape, (2, 1));
        assert_eq!(report.summary.rows_removed, 1);
        assert_eq!(report.summary.columns_removed, 1);
        assert_eq!(report.summary.iterations, 3);
        assert_eq!(report.summary.skipped_steps, 1);
        assert_eq!(report.quality_score, 5);
        assert_eq!(report.feedback, "validation unavailable");
        assert!(!report.timestamp.is_empty());
    }

    #[test]
    fn test_write_report_to_file() {
        let dir = temp_dir("report");
        let generator = ReportGenerator::new(dir.clone());
        let path = generator.write_report_to_file(&sample_report(), "customers").unwrap();

        assert_eq!(path, dir.join("customers_report.json"));
        let content = fs::read_to_string(&path).unwrap();
        let parsed: Report = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.summary.rows_removed, 1);
        assert_eq!(parsed.mode, ReportMode::RuleBased);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_write_dataset_csv() {
        let dir = temp_dir("csv");
        let generator = ReportGenerator::new(dir.clone());
        let mut df = df! { "name" => &["a", "b"], "value" => &[1.5, 2.0] }.unwrap();
        let path = generator.write_dataset_csv(&mut df, "customers").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("name,value"));
        assert_eq!(content.lines().count(), 3);

        let _ = fs::remove_dir_all(dir);
    }
}
