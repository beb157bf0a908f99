//! Per-column type coercion.
//!
//! Each column is converted independently. A column that cannot be
//! converted is logged and left untouched; the operation as a whole still
//! succeeds.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{CleaningOperation, run_guarded};
use crate::error::{CleaningError, Result};
use crate::profiler::quantile_sorted;
use crate::types::{OperationId, OperationMetadata, OperationParams, OperationResult};
use crate::utils::{is_datetime_dtype, is_numeric_dtype, parse_numeric_string, round_to, series_to_f64, series_to_keys};

/// Fill value for strings that have no observed value.
const STRING_FILL: &str = "Unknown";

/// 2000-01-01T00:00:00Z in milliseconds.
const DATETIME_FILL_MS: i64 = 946_684_800_000;

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Integer,
    Float,
    String,
    Datetime,
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Datetime => "datetime",
        })
    }
}

impl FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" | "int64" => Ok(Self::Integer),
            "float" | "float64" | "double" | "numeric" => Ok(Self::Float),
            "string" | "str" | "text" | "categorical" => Ok(Self::String),
            "datetime" | "date" | "timestamp" => Ok(Self::Datetime),
            other => Err(format!("unknown target type '{other}'")),
        }
    }
}

impl TargetType {
    /// Natural target for a column's current dtype.
    pub fn for_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Float32 | DataType::Float64 => Self::Float,
            d if is_numeric_dtype(d) => Self::Integer,
            d if is_datetime_dtype(d) => Self::Datetime,
            _ => Self::String,
        }
    }
}

/// Converts columns to integer, float, string or datetime.
pub struct CoerceTypes;

impl CoerceTypes {
    fn run(&self, df: &DataFrame, params: &OperationParams) -> Result<OperationResult> {
        let mapping: Vec<(String, std::result::Result<TargetType, String>)> = match params.get("types") {
            None | Some(Value::Null) => df
                .get_columns()
                .iter()
                .map(|c| (c.name().to_string(), Ok(TargetType::for_dtype(c.dtype()))))
                .collect(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(col, ty)| {
                    let target = ty
                        .as_str()
                        .ok_or_else(|| format!("type for '{col}' is not a string"))
                        .and_then(str::parse);
                    (col.clone(), target)
                })
                .collect(),
            Some(other) => {
                return Err(CleaningError::invalid_parameter(
                    self.id().as_str(),
                    "types",
                    format!("expected an object of column -> type, got {other}"),
                ));
            }
        };

        let mut result_df = df.clone();
        let mut converted = serde_json::Map::new();
        let mut skipped = Vec::new();

        for (column, target) in mapping {
            let outcome = target
                .map_err(|reason| CleaningError::TypeConversionFailed {
                    column: column.clone(),
                    target_type: "unknown".to_string(),
                    reason,
                })
                .and_then(|target| {
                    let series = result_df
                        .column(&column)
                        .map_err(|_| CleaningError::ColumnNotFound(column.clone()))?
                        .as_materialized_series()
                        .clone();
                    convert_series(&series, target).map(|s| (s, target))
                });

            match outcome {
                Ok((series, target)) => {
                    result_df.replace(&column, series)?;
                    converted.insert(column, json!(target.to_string()));
                }
                Err(e) => {
                    warn!("Skipping type coercion for '{}': {}", column, e);
                    skipped.push(json!({ "column": column, "reason": e.to_string() }));
                }
            }
        }

        let message = format!("Coerced {} columns ({} skipped)", converted.len(), skipped.len());
        info!("{}", message);

        let mut metadata = OperationMetadata::new();
        metadata.insert("converted".to_string(), Value::Object(converted));
        metadata.insert("skipped_columns".to_string(), Value::Array(skipped));

        Ok(OperationResult::success(result_df, message, metadata))
    }
}

fn conversion_error(series: &Series, target: TargetType, reason: impl Into<String>) -> CleaningError {
    CleaningError::TypeConversionFailed {
        column: series.name().to_string(),
        target_type: target.to_string(),
        reason: reason.into(),
    }
}

fn convert_series(series: &Series, target: TargetType) -> Result<Series> {
    match target {
        TargetType::Integer | TargetType::Float => {
            let values = numeric_values(series, target)?;
            let mut present: Vec<f64> = values.iter().flatten().copied().collect();
            if present.is_empty() {
                return Err(conversion_error(series, target, "no parseable numeric values"));
            }
            present.sort_by(|a, b| a.total_cmp(b));
            let median = quantile_sorted(&present, 0.5);
            let filled = values.into_iter().map(|v| v.unwrap_or(median));

            Ok(if target == TargetType::Integer {
                Series::new(series.name().clone(), filled.map(|v| v.trunc() as i64).collect::<Vec<_>>())
            } else {
                Series::new(series.name().clone(), filled.map(|v| round_to(v, 2)).collect::<Vec<_>>())
            })
        }
        TargetType::String => {
            let values: Vec<String> = series_to_keys(series)?
                .into_iter()
                .map(|v| v.unwrap_or_else(|| STRING_FILL.to_string()))
                .collect();
            Ok(Series::new(series.name().clone(), values))
        }
        TargetType::Datetime => {
            let millis = datetime_millis(series)?;
            if millis.iter().all(Option::is_none) && !series.is_empty() {
                return Err(conversion_error(series, target, "no parseable datetime values"));
            }
            let filled: Vec<i64> = millis.into_iter().map(|v| v.unwrap_or(DATETIME_FILL_MS)).collect();
            Ok(Series::new(series.name().clone(), filled)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?)
        }
    }
}

fn numeric_values(series: &Series, target: TargetType) -> Result<Vec<Option<f64>>> {
    match series.dtype() {
        d if is_numeric_dtype(d) || matches!(d, DataType::Boolean) => Ok(series_to_f64(series)?),
        DataType::String => Ok(series
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_numeric_string))
            .collect()),
        other => Err(conversion_error(series, target, format!("cannot interpret {other} as a number"))),
    }
}

fn datetime_millis(series: &Series) -> Result<Vec<Option<i64>>> {
    let dtype = series.dtype();
    if is_datetime_dtype(dtype) {
        let as_ms = series.cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        return Ok(as_ms.cast(&DataType::Int64)?.i64()?.into_iter().collect());
    }
    if is_numeric_dtype(dtype) {
        return Ok(series_to_f64(series)?
            .into_iter()
            .map(|v| v.and_then(|t| timestamp_to_millis(t as i64)))
            .collect());
    }
    if dtype == &DataType::String {
        return Ok(series.str()?.into_iter().map(|v| v.and_then(parse_datetime_str)).collect());
    }
    Err(conversion_error(series, TargetType::Datetime, format!("cannot interpret {dtype} as a datetime")))
}

/// Epoch seconds or milliseconds in a plausible range.
fn timestamp_to_millis(timestamp: i64) -> Option<i64> {
    if timestamp > 1_000_000_000 && timestamp < 2_000_000_000 {
        Some(timestamp * 1000)
    } else if timestamp > 1_000_000_000_000 && timestamp < 2_000_000_000_000 {
        Some(timestamp)
    } else {
        None
    }
}

fn parse_datetime_str(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for pattern in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, pattern) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    for pattern in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, pattern) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis());
        }
    }
    s.parse::<i64>().ok().and_then(timestamp_to_millis)
}

impl CleaningOperation for CoerceTypes {
    fn id(&self) -> OperationId {
        OperationId::CoerceTypes
    }

    fn description(&self) -> &'static str {
        "Convert columns to integer, float, string or datetime; unconvertible columns are skipped"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "types": {
                    "type": "object",
                    "additionalProperties": {
                        "type": "string",
                        "enum": ["integer", "float", "string", "datetime"]
                    },
                    "description": "Column name to target type (default: inferred from current dtypes)"
                }
            }
        })
    }

    fn execute(&self, df: &DataFrame, params: &OperationParams) -> OperationResult {
        run_guarded(self.id(), df, || self.run(df, params))
    }
}
