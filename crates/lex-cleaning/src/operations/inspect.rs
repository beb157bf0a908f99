use polars::prelude::*;
use serde_json::{Value, json};

use super::{CleaningOperation, run_guarded};
use crate::error::{CleaningError, Result};
use crate::profiler::QualityProfiler;
use crate::types::{OperationId, OperationMetadata, OperationParams, OperationResult, QualityProfile};

/// Profiles the dataset without modifying it. The profile is the metadata.
pub struct InspectData;

impl InspectData {
    fn run(&self, df: &DataFrame) -> Result<OperationResult> {
        let profile = QualityProfiler::profile(df);
        let (message, metadata) = summarize_profile(&profile)?;
        Ok(OperationResult::success(df.clone(), message, metadata))
    }
}

/// Message and metadata of an inspection, for a profile already computed.
pub(crate) fn summarize_profile(profile: &QualityProfile) -> Result<(String, OperationMetadata)> {
    let metadata = match serde_json::to_value(profile)? {
        Value::Object(map) => map,
        other => {
            return Err(CleaningError::Internal(format!(
                "profile serialized to non-object: {other}"
            )));
        }
    };

    let message = format!(
        "Inspected dataset: {} rows, {} columns",
        profile.row_count(),
        profile.column_count()
    );
    Ok((message, metadata))
}

impl CleaningOperation for InspectData {
    fn id(&self) -> OperationId {
        OperationId::InspectData
    }

    fn description(&self) -> &'static str {
        "Inspect the dataset: shape, missing values, duplicates, column types and numeric statistics"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn execute(&self, df: &DataFrame, _params: &OperationParams) -> OperationResult {
        run_guarded(self.id(), df, || self.run(df))
    }
}
