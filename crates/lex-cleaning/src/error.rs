//! Custom error types for the cleaning engine.
//!
//! This module provides the error hierarchy used throughout the engine.
//! Most failures are recoverable and degrade locally (a failed operation,
//! a fallback plan, a neutral validation). Only configuration errors and
//! cancellation ever reach the caller of [`crate::CleaningEngine::run`].
//!
//! Errors are serializable so a hosting layer can forward them as
//! `{code, message}` objects.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

use crate::config::ConfigValidationError;

/// The main error type for the cleaning engine.
#[derive(Error, Debug)]
pub enum CleaningError {
    /// Run was cancelled between two plan steps.
    #[error("Cleaning run cancelled")]
    Cancelled,

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// An operation received a parameter of the wrong type or out of range.
    #[error("Invalid parameter '{parameter}' for {operation}: {reason}")]
    InvalidParameter {
        operation: String,
        parameter: String,
        reason: String,
    },

    /// Type conversion failed.
    #[error("Failed to convert column '{column}' to {target_type}: {reason}")]
    TypeConversionFailed {
        column: String,
        target_type: String,
        reason: String,
    },

    /// A cleaning operation failed internally.
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// The advisory service answered with something that is not a usable payload.
    #[error("Advisory response could not be parsed: {0}")]
    AdvisoryParse(#[from] AdvisoryParseError),

    /// The advisory service could not be reached or returned an error.
    #[error("Advisory service error: {0}")]
    AdvisoryService(String),

    /// Writing the report or the cleaned dataset failed.
    #[error("Failed to write report: {0}")]
    ReportWriteFailed(String),

    /// Configuration is out of range. Fatal at startup.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigValidationError),

    /// Internal error (e.g., an illegal engine state transition).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error (for the advisory client, only with "ai" feature).
    #[cfg(feature = "ai")]
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CleaningError>,
    },
}

/// Typed failures of the decode step applied to advisory responses.
///
/// These never escape the planner or validator; they are caught one level
/// up and replaced by the rule-based fallback.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdvisoryParseError {
    /// No JSON array or object could be located in the response text.
    #[error("no structured payload found in response")]
    NoStructuredPayload,

    /// A payload was located but is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Valid JSON, but not the expected shape.
    #[error("unexpected payload shape: {0}")]
    UnexpectedShape(String),

    /// A step names an operation outside the known set.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// A required key is absent.
    #[error("missing required field '{0}'")]
    MissingField(String),

    /// The plan array decoded fine but contains no steps.
    #[error("plan contains no steps")]
    EmptyPlan,
}

impl CleaningError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        CleaningError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for an [`CleaningError::InvalidParameter`].
    pub fn invalid_parameter(
        operation: impl Into<String>,
        parameter: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CleaningError::InvalidParameter {
            operation: operation.into(),
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Get a stable error code for callers that dispatch on error kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::TypeConversionFailed { .. } => "TYPE_CONVERSION_FAILED",
            Self::OperationFailed(_) => "OPERATION_FAILED",
            Self::AdvisoryParse(_) => "ADVISORY_PARSE_ERROR",
            Self::AdvisoryService(_) => "ADVISORY_SERVICE_ERROR",
            Self::ReportWriteFailed(_) => "REPORT_WRITE_FAILED",
            Self::Config(_) => "INVALID_CONFIG",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            #[cfg(feature = "ai")]
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Check if the engine degrades gracefully on this error instead of halting.
    ///
    /// Configuration errors are the one fatal class.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Internal(_) => false,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => true,
        }
    }
}

impl Serialize for CleaningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("CleaningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, CleaningError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CleaningError::Polars(e).with_context(context))
    }
}
