use polars::prelude::*;
use serde_json::{Value, json};
use tracing::info;

use super::{CleaningOperation, param_str, param_string_list, run_guarded};
use crate::error::{CleaningError, Result};
use crate::types::{OperationId, OperationMetadata, OperationParams, OperationResult};

/// Removes exact duplicate rows, optionally comparing only a subset of columns.
///
/// Missing values compare equal to each other.
pub struct RemoveDuplicates;

fn parse_keep(value: &str) -> Result<UniqueKeepStrategy> {
    match value.to_ascii_lowercase().as_str() {
        "first" => Ok(UniqueKeepStrategy::First),
        "last" => Ok(UniqueKeepStrategy::Last),
        "false" | "none" => Ok(UniqueKeepStrategy::None),
        other => Err(CleaningError::invalid_parameter(
            OperationId::RemoveDuplicates.as_str(),
            "keep",
            format!("expected 'first', 'last' or false, got '{other}'"),
        )),
    }
}

impl RemoveDuplicates {
    fn run(&self, df: &DataFrame, params: &OperationParams) -> Result<OperationResult> {
        let op = self.id();
        let keep_raw = param_str(op, params, "keep", "first")?;
        let keep = parse_keep(&keep_raw)?;

        let all_columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        let subset = match param_string_list(op, params, "subset")? {
            Some(cols) if !cols.is_empty() => {
                if let Some(missing) = cols.iter().find(|c| !all_columns.contains(c)) {
                    return Err(CleaningError::ColumnNotFound(missing.clone()));
                }
                cols
            }
            _ => all_columns,
        };

        let initial_rows = df.height();
        let result_df = if subset.is_empty() || initial_rows == 0 {
            df.clone()
        } else {
            df.unique_stable(Some(subset.as_slice()), keep, None)?
        };

        let final_rows = result_df.height();
        let removed = initial_rows - final_rows;
        let message = format!("Removed {removed} duplicate rows");
        info!("{}", message);

        let mut metadata = OperationMetadata::new();
        metadata.insert("initial_rows".to_string(), json!(initial_rows));
        metadata.insert("final_rows".to_string(), json!(final_rows));
        metadata.insert("duplicates_removed".to_string(), json!(removed));
        metadata.insert("keep".to_string(), json!(keep_raw));
        metadata.insert("subset".to_string(), json!(subset));

        Ok(OperationResult::success(result_df, message, metadata))
    }
}

impl CleaningOperation for RemoveDuplicates {
    fn id(&self) -> OperationId {
        OperationId::RemoveDuplicates
    }

    fn description(&self) -> &'static str {
        "Remove exact duplicate rows, optionally comparing only a subset of columns"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "subset": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Columns to compare (default: all columns)"
                },
                "keep": {
                    "type": "string",
                    "enum": ["first", "last", "false"],
                    "default": "first",
                    "description": "Which occurrence to keep; 'false' drops every duplicated row"
                }
            }
        })
    }

    fn execute(&self, df: &DataFrame, params: &OperationParams) -> OperationResult {
        run_guarded(self.id(), df, || self.run(df, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> OperationParams {
        value.as_object().cloned().unwrap()
    }

    fn sample() -> DataFrame {
        df! {
            "id" => &[1, 2, 1, 3, 2],
            "name" => &[Some("a"), None, Some("a"), Some("c"), None],
            "score" => &[10, 20, 10, 30, 99],
        }
        .unwrap()
    }

    #[test]
    fn test_remove_exact_duplicates_keep_first() {
        let result = RemoveDuplicates.execute(&sample(), &OperationParams::new());
        assert!(result.success);
        assert_eq!(result.dataset.height(), 4);
        assert_eq!(result.message, "Removed 1 duplicate rows");
        assert_eq!(result.metadata["duplicates_removed"], 1);
    }

    #[test]
    fn test_subset_with_missing_equal_missing() {
        let result = RemoveDuplicates.execute(&sample(), &params(json!({"subset": ["id", "name"]})));
        assert!(result.success);
        // Rows (2, null) repeat even though score differs.
        assert_eq!(result.dataset.height(), 3);
    }

    #[test]
    fn test_keep_last_retains_later_row() {
        let result = RemoveDuplicates.execute(
            &sample(),
            &params(json!({"subset": ["id"], "keep": "last"})),
        );
        let scores: Vec<Option<i32>> = result
            .dataset
            .column("score")
            .unwrap()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(scores, vec![Some(10), Some(30), Some(99)]);
    }

    #[test]
    fn test_keep_false_drops_all_members() {
        let result = RemoveDuplicates.execute(&sample(), &params(json!({"subset": ["id"], "keep": false})));
        assert_eq!(result.dataset.height(), 1);
    }

    #[test]
    fn test_unknown_subset_column_fails_without_change() {
        let df = sample();
        let result = RemoveDuplicates.execute(&df, &params(json!({"subset": ["nope"]})));
        assert!(!result.success);
        assert!(result.message.contains("nope"));
        assert_eq!(result.dataset.height(), df.height());
    }

    #[test]
    fn test_invalid_keep_fails() {
        let result = RemoveDuplicates.execute(&sample(), &params(json!({"keep": "middle"})));
        assert!(!result.success);
    }
}
