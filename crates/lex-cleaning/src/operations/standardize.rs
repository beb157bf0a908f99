use std::collections::HashSet;

use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use serde_json::{Value, json};
use tracing::info;

use super::{CleaningOperation, run_guarded};
use crate::error::Result;
use crate::types::{OperationId, OperationMetadata, OperationParams, OperationResult};

/// Runs of whitespace and hyphens become one `_`.
static SEPARATOR_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-]+").expect("Invalid regex: separator run"));

static UNDERSCORE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_{2,}").expect("Invalid regex: underscore run"));

/// Normalize a single column name to snake_case.
///
/// Trims whitespace and hyphens from both ends, lower-cases, replaces inner
/// whitespace and hyphens with `_` and collapses repeated underscores.
/// Underscores already at the edges of the name are kept, so `_is_outlier`
/// maps to itself.
pub fn standardize_name(name: &str) -> String {
    let lowered = name
        .trim_matches(|c: char| c.is_whitespace() || c == '-')
        .to_lowercase();
    let separated = SEPARATOR_RUN.replace_all(&lowered, "_");
    UNDERSCORE_RUN.replace_all(&separated, "_").into_owned()
}

/// Normalizes every column name; collisions get a numeric suffix.
pub struct StandardizeColumnNames;

impl StandardizeColumnNames {
    fn run(&self, df: &DataFrame) -> Result<OperationResult> {
        let original: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        let new_names = standardized_names(&original);

        let changes: Vec<String> = original
            .iter()
            .zip(&new_names)
            .filter(|(old, new)| old != new)
            .map(|(old, new)| format!("{old} → {new}"))
            .collect();

        let result_df = if changes.is_empty() {
            df.clone()
        } else {
            let columns: Vec<Column> = df
                .get_columns()
                .iter()
                .zip(&new_names)
                .map(|(col, name)| col.clone().with_name(name.as_str().into()))
                .collect();
            DataFrame::new(columns)?
        };

        let message = format!("Standardized {} column names to snake_case", changes.len());
        info!("{}", message);

        let mut metadata = OperationMetadata::new();
        metadata.insert("changes".to_string(), json!(changes));
        metadata.insert("original_columns".to_string(), json!(original));
        metadata.insert("new_columns".to_string(), json!(new_names));

        Ok(OperationResult::success(result_df, message, metadata))
    }
}

/// Standardize a full header, keeping names unique and non-empty.
fn standardized_names(original: &[String]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::with_capacity(original.len());
    original
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let mut base = standardize_name(name);
            if base.is_empty() {
                base = format!("column_{}", idx + 1);
            }
            let mut candidate = base.clone();
            let mut suffix = 2;
            while used.contains(&candidate) {
                candidate = format!("{base}_{suffix}");
                suffix += 1;
            }
            used.insert(candidate.clone());
            candidate
        })
        .collect()
}

impl CleaningOperation for StandardizeColumnNames {
    fn id(&self) -> OperationId {
        OperationId::StandardizeColumnNames
    }

    fn description(&self) -> &'static str {
        "Standardize column names to snake_case (lowercase, underscores, no surrounding whitespace or hyphens)"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn execute(&self, df: &DataFrame, _params: &OperationParams) -> OperationResult {
        run_guarded(self.id(), df, || self.run(df))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_standardize_name() {
        assert_eq!(standardize_name("Customer ID"), "customer_id");
        assert_eq!(standardize_name("  First-Name  "), "first_name");
        assert_eq!(standardize_name("order  --  date"), "order_date");
        assert_eq!(standardize_name("Tab\tSeparated"), "tab_separated");
        assert_eq!(standardize_name("__already_ok__"), "_already_ok_");
        assert_eq!(standardize_name("-Lead-"), "lead");
        assert_eq!(standardize_name("_is_outlier"), "_is_outlier");
        assert_eq!(standardize_name("ÄGE"), "äge");
    }

    #[test]
    fn test_execute_renames_and_reports() {
        let df = df! {
            "Customer ID" => &[1, 2],
            "email" => &["a@x.io", "b@x.io"],
            "Signup-Date" => &["2024-01-01", "2024-02-01"],
        }
        .unwrap();

        let result = StandardizeColumnNames.execute(&df, &OperationParams::new());
        assert!(result.success);
        assert_eq!(names(&result.dataset), vec!["customer_id", "email", "signup_date"]);
        assert_eq!(result.message, "Standardized 2 column names to snake_case");
        assert_eq!(result.metadata["changes"][0], "Customer ID → customer_id");
        assert_eq!(result.dataset.height(), 2);
    }

    #[test]
    fn test_idempotent() {
        let df = df! {
            "A b" => &[1],
            "a_b" => &[2],
            "--" => &[3],
            "X-Y  Z" => &[4],
        }
        .unwrap();

        let once = StandardizeColumnNames.execute(&df, &OperationParams::new()).dataset;
        let twice = StandardizeColumnNames.execute(&once, &OperationParams::new());
        assert_eq!(names(&once), names(&twice.dataset));
        assert_eq!(names(&once), vec!["a_b", "a_b_2", "column_3", "x_y_z"]);
        assert_eq!(twice.metadata["changes"], json!([]));
    }

    #[test]
    fn test_leading_underscore_names_survive_repeat_runs() {
        let df = df! {
            "Home City" => &["a"],
            "_is_outlier" => &[false],
            "_Row Id" => &[1],
        }
        .unwrap();

        let once = StandardizeColumnNames.execute(&df, &OperationParams::new()).dataset;
        assert_eq!(names(&once), vec!["home_city", "_is_outlier", "_row_id"]);
        let twice = StandardizeColumnNames.execute(&once, &OperationParams::new());
        assert_eq!(names(&twice.dataset), names(&once));
        assert_eq!(twice.message, "Standardized 0 column names to snake_case");
    }

    #[test]
    fn test_does_not_touch_input() {
        let df = df! { "Mixed Case" => &[1.0] }.unwrap();
        let _ = StandardizeColumnNames.execute(&df, &OperationParams::new());
        assert_eq!(names(&df), vec!["Mixed Case"]);
    }
}
