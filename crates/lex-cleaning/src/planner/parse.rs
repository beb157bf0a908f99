//! Decoding of advisory responses.
//!
//! Advisory services answer in free text that is expected to contain a
//! JSON payload, possibly wrapped in a markdown fence or surrounded by
//! prose. Decoding is strict about the payload's shape and every failure
//! is a typed [`AdvisoryParseError`].

use serde_json::Value;

use crate::error::AdvisoryParseError;
use crate::types::{OperationId, OperationParams, PlanStep, ValidationResult};

/// Which JSON container to look for in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// A `[...]` array (plans).
    Array,
    /// A `{...}` object (validation results).
    Object,
}

impl PayloadKind {
    fn delimiters(self) -> (char, char) {
        match self {
            PayloadKind::Array => ('[', ']'),
            PayloadKind::Object => ('{', '}'),
        }
    }
}

/// Locate the JSON payload inside a response.
///
/// Strips a ```` ```json ```` or ```` ``` ```` fence when present, then
/// returns the span from the first opening delimiter to the last closing one.
pub fn extract_json_payload(response: &str, kind: PayloadKind) -> Result<&str, AdvisoryParseError> {
    let text = strip_fence(response);
    let (open, close) = kind.delimiters();
    let start = text.find(open).ok_or(AdvisoryParseError::NoStructuredPayload)?;
    let end = text.rfind(close).ok_or(AdvisoryParseError::NoStructuredPayload)?;
    if end < start {
        return Err(AdvisoryParseError::NoStructuredPayload);
    }
    Ok(&text[start..=end])
}

fn strip_fence(response: &str) -> &str {
    let text = response.trim();
    let body = if let Some(pos) = text.find("```json") {
        &text[pos + "```json".len()..]
    } else if let Some(pos) = text.find("```") {
        &text[pos + 3..]
    } else {
        return text;
    };
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Decode a plan from an advisory response.
///
/// Accepts a bare array of steps, or an object holding the array under
/// `steps` or `plan`. Every step must name a known operation.
pub fn parse_plan(response: &str) -> Result<Vec<PlanStep>, AdvisoryParseError> {
    let value = match extract_json_payload(response, PayloadKind::Array) {
        Ok(payload) => serde_json::from_str::<Value>(payload)
            .map_err(|e| AdvisoryParseError::InvalidJson(e.to_string()))?,
        Err(_) => {
            let payload = extract_json_payload(response, PayloadKind::Object)?;
            serde_json::from_str::<Value>(payload)
                .map_err(|e| AdvisoryParseError::InvalidJson(e.to_string()))?
        }
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("steps").or_else(|| map.remove("plan")) {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(AdvisoryParseError::UnexpectedShape(format!(
                    "expected an array of steps, got {other}"
                )));
            }
            None => return Err(AdvisoryParseError::MissingField("steps".to_string())),
        },
        other => {
            return Err(AdvisoryParseError::UnexpectedShape(format!(
                "expected an array of steps, got {other}"
            )));
        }
    };

    if items.is_empty() {
        return Err(AdvisoryParseError::EmptyPlan);
    }

    items.into_iter().map(parse_step).collect()
}

fn parse_step(item: Value) -> Result<PlanStep, AdvisoryParseError> {
    let Value::Object(mut map) = item else {
        return Err(AdvisoryParseError::UnexpectedShape(format!(
            "expected a step object, got {item}"
        )));
    };

    let name = match map.remove("tool").or_else(|| map.remove("operation")) {
        Some(Value::String(name)) => name,
        Some(other) => {
            return Err(AdvisoryParseError::UnexpectedShape(format!(
                "operation name must be a string, got {other}"
            )));
        }
        None => return Err(AdvisoryParseError::MissingField("tool".to_string())),
    };
    let operation: OperationId = name.parse()?;

    let parameters = match map.remove("parameters") {
        None | Some(Value::Null) => OperationParams::new(),
        Some(Value::Object(params)) => params,
        Some(other) => {
            return Err(AdvisoryParseError::UnexpectedShape(format!(
                "parameters must be an object, got {other}"
            )));
        }
    };

    let reason = match map.remove("reason") {
        Some(Value::String(reason)) => reason,
        _ => String::new(),
    };

    Ok(PlanStep::new(operation, parameters, reason))
}

/// Decode a validation result. The score is clamped into `1..=10`.
pub fn parse_validation(response: &str) -> Result<ValidationResult, AdvisoryParseError> {
    let payload = extract_json_payload(response, PayloadKind::Object)?;
    let value: Value =
        serde_json::from_str(payload).map_err(|e| AdvisoryParseError::InvalidJson(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(AdvisoryParseError::UnexpectedShape(
            "expected a validation object".to_string(),
        ));
    };

    let score = map
        .get("score")
        .ok_or_else(|| AdvisoryParseError::MissingField("score".to_string()))?;
    let score = score
        .as_f64()
        .or_else(|| score.as_str().and_then(|s| s.trim().parse().ok()))
        .filter(|s| s.is_finite())
        .ok_or_else(|| AdvisoryParseError::UnexpectedShape(format!("score must be a number, got {score}")))?;
    let score = score.round().clamp(1.0, 10.0) as u8;

    let feedback = map
        .get("feedback")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let suggestions = match map.get("suggestions") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    };

    Ok(ValidationResult {
        score,
        feedback,
        suggestions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_from_json_fence() {
        let response = "Here you go:\n```json\n[{\"tool\": \"remove_duplicates\"}]\n```\nDone.";
        assert_eq!(
            extract_json_payload(response, PayloadKind::Array).unwrap(),
            "[{\"tool\": \"remove_duplicates\"}]"
        );
    }

    #[test]
    fn test_extract_from_plain_fence() {
        let response = "```\n{\"score\": 7}\n```";
        assert_eq!(
            extract_json_payload(response, PayloadKind::Object).unwrap(),
            "{\"score\": 7}"
        );
    }

    #[test]
    fn test_extract_embedded_in_prose() {
        let response = "Sure! The plan is [{\"tool\": \"standardize_column_names\"}] as requested.";
        assert!(extract_json_payload(response, PayloadKind::Array).unwrap().starts_with('['));
    }

    #[test]
    fn test_extract_no_payload() {
        assert_eq!(
            extract_json_payload("I cannot help with that.", PayloadKind::Array),
            Err(AdvisoryParseError::NoStructuredPayload)
        );
    }

    #[test]
    fn test_parse_plan_bare_array() {
        let steps = parse_plan(
            r#"[
                {"tool": "standardize_column_names", "parameters": {}, "reason": "names"},
                {"tool": "detect_outliers", "parameters": {"contamination": 0.1, "remove": true}}
            ]"#,
        )
        .unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].operation_id(), Some(OperationId::StandardizeColumnNames));
        assert_eq!(steps[0].reason, "names");
        assert_eq!(steps[1].parameters["remove"], true);
        assert_eq!(steps[1].reason, "");
    }

    #[test]
    fn test_parse_plan_wrapped_object() {
        let steps = parse_plan(r#"{"steps": [{"operation": "remove_duplicates"}]}"#).unwrap();
        assert_eq!(steps[0].operation_id(), Some(OperationId::RemoveDuplicates));
    }

    #[test]
    fn test_parse_plan_rejects_unknown_tool() {
        let err = parse_plan(r#"[{"tool": "drop_table"}]"#).unwrap_err();
        assert_eq!(err, AdvisoryParseError::UnknownOperation("drop_table".to_string()));
    }

    #[test]
    fn test_parse_plan_rejects_empty() {
        assert_eq!(parse_plan("[]").unwrap_err(), AdvisoryParseError::EmptyPlan);
    }

    #[test]
    fn test_parse_plan_rejects_bad_parameters() {
        let err = parse_plan(r#"[{"tool": "remove_duplicates", "parameters": [1, 2]}]"#).unwrap_err();
        assert!(matches!(err, AdvisoryParseError::UnexpectedShape(_)));
    }

    #[test]
    fn test_parse_plan_missing_tool() {
        let err = parse_plan(r#"[{"reason": "no tool"}]"#).unwrap_err();
        assert_eq!(err, AdvisoryParseError::MissingField("tool".to_string()));
    }

    #[test]
    fn test_parse_plan_invalid_json() {
        assert!(matches!(
            parse_plan("[{tool: remove_duplicates}]").unwrap_err(),
            AdvisoryParseError::InvalidJson(_)
        ));
    }

    #[test]
    fn test_parse_validation() {
        let result = parse_validation(
            r#"```json
            {"score": 8, "feedback": "Good cleaning", "suggestions": ["Check dates"]}
            ```"#,
        )
        .unwrap();
        assert_eq!(
            result,
            ValidationResult {
                score: 8,
                feedback: "Good cleaning".to_string(),
                suggestions: vec!["Check dates".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_validation_clamps_score() {
        assert_eq!(parse_validation(r#"{"score": 42}"#).unwrap().score, 10);
        assert_eq!(parse_validation(r#"{"score": -3}"#).unwrap().score, 1);
        assert_eq!(parse_validation(r#"{"score": "7"}"#).unwrap().score, 7);
    }

    #[test]
    fn test_parse_validation_requires_score() {
        assert_eq!(
            parse_validation(r#"{"feedback": "ok"}"#).unwrap_err(),
            AdvisoryParseError::MissingField("score".to_string())
        );
    }
}
