//! Configuration for the cleaning engine.
//!
//! All knobs are plain scalars with documented valid ranges. Out-of-range
//! values are rejected by [`EngineConfigBuilder::build`] and by
//! [`EngineConfig::validate`]; an engine is never constructed from an
//! invalid configuration.

use serde::{Deserialize, Serialize};

/// Default fraction of missing values above which a column is dropped.
pub const DEFAULT_MISSING_VALUE_THRESHOLD: f64 = 0.5;

/// Default expected share of outliers.
pub const DEFAULT_OUTLIER_CONTAMINATION: f64 = 0.05;

/// Default neighbor count for KNN imputation.
pub const DEFAULT_KNN_NEIGHBORS: usize = 5;

/// Default maximum number of plan steps executed per run.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Default number of memory entries retained.
pub const DEFAULT_MEMORY_SIZE: usize = 10;

/// Configuration for the cleaning engine.
///
/// Use [`EngineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use lex_cleaning::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .missing_value_threshold(0.6)
///     .outlier_contamination(0.1)
///     .max_iterations(8)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Columns whose missing fraction is strictly greater than this are dropped.
    /// Valid range: (0.0, 1.0). Default: 0.5
    pub missing_value_threshold: f64,

    /// Expected fraction of outliers for anomaly scoring.
    /// Valid range: (0.0, 0.5]. Default: 0.05
    pub outlier_contamination: f64,

    /// Number of neighbors for KNN imputation. Default: 5
    pub knn_neighbors: usize,

    /// Maximum number of plan steps executed; the rest are skipped. Default: 5
    pub max_iterations: usize,

    /// Number of most recent memory entries retained. Default: 10
    pub memory_size: usize,

    /// Ask the advisory service for a plan when a provider is configured.
    /// Default: true
    pub use_advisory_planning: bool,

    /// Ask the advisory service to score the result when a provider is configured.
    /// Default: true
    pub use_advisory_validation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            missing_value_threshold: DEFAULT_MISSING_VALUE_THRESHOLD,
            outlier_contamination: DEFAULT_OUTLIER_CONTAMINATION,
            knn_neighbors: DEFAULT_KNN_NEIGHBORS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            memory_size: DEFAULT_MEMORY_SIZE,
            use_advisory_planning: true,
            use_advisory_validation: true,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Validate the configuration and return the first violation found.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.missing_value_threshold > 0.0 && self.missing_value_threshold < 1.0) {
            return Err(ConfigValidationError::OutOfRange {
                field: "missing_value_threshold",
                value: self.missing_value_threshold,
                range: "(0.0, 1.0)",
            });
        }

        if !(self.outlier_contamination > 0.0 && self.outlier_contamination <= 0.5) {
            return Err(ConfigValidationError::OutOfRange {
                field: "outlier_contamination",
                value: self.outlier_contamination,
                range: "(0.0, 0.5]",
            });
        }

        if self.knn_neighbors == 0 {
            return Err(ConfigValidationError::InvalidKnnNeighbors(self.knn_neighbors));
        }

        if self.max_iterations == 0 {
            return Err(ConfigValidationError::MustBePositive("max_iterations"));
        }

        if self.memory_size == 0 {
            return Err(ConfigValidationError::MustBePositive("memory_size"));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid value for '{field}': {value} (must be in {range})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        range: &'static str,
    },

    #[error("Invalid KNN neighbors: {0} (must be at least 1)")]
    InvalidKnnNeighbors(usize),

    #[error("Invalid value for '{0}': must be at least 1")]
    MustBePositive(&'static str),
}

/// Builder for [`EngineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    missing_value_threshold: Option<f64>,
    outlier_contamination: Option<f64>,
    knn_neighbors: Option<usize>,
    max_iterations: Option<usize>,
    memory_size: Option<usize>,
    use_advisory_planning: Option<bool>,
    use_advisory_validation: Option<bool>,
}

impl EngineConfigBuilder {
    /// Set the missing-value threshold. Validated at [`build`](Self::build).
    pub fn missing_value_threshold(mut self, threshold: f64) -> Self {
        self.missing_value_threshold = Some(threshold);
        self
    }

    /// Set the expected outlier contamination.
    pub fn outlier_contamination(mut self, contamination: f64) -> Self {
        self.outlier_contamination = Some(contamination);
        self
    }

    /// Set the number of neighbors for KNN imputation.
    pub fn knn_neighbors(mut self, k: usize) -> Self {
        self.knn_neighbors = Some(k);
        self
    }

    /// Set the step budget.
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Set the memory retention bound.
    pub fn memory_size(mut self, n: usize) -> Self {
        self.memory_size = Some(n);
        self
    }

    /// Enable or disable advisory planning.
    pub fn use_advisory_planning(mut self, enabled: bool) -> Self {
        self.use_advisory_planning = Some(enabled);
        self
    }

    /// Enable or disable advisory validation.
    pub fn use_advisory_validation(mut self, enabled: bool) -> Self {
        self.use_advisory_validation = Some(enabled);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `EngineConfig` or an error if validation fails.
    pub fn build(self) -> Result<EngineConfig, ConfigValidationError> {
        let defaults = EngineConfig::default();
        let config = EngineConfig {
            missing_value_threshold: self
                .missing_value_threshold
                .unwrap_or(defaults.missing_value_threshold),
            outlier_contamination: self
                .outlier_contamination
                .unwrap_or(defaults.outlier_contamination),
            knn_neighbors: self.knn_neighbors.unwrap_or(defaults.knn_neighbors),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            memory_size: self.memory_size.unwrap_or(defaults.memory_size),
            use_advisory_planning: self
                .use_advisory_planning
                .unwrap_or(defaults.use_advisory_planning),
            use_advisory_validation: self
                .use_advisory_validation
                .unwrap_or(defaults.use_advisory_validation),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.missing_value_threshold, 0.5);
        assert_eq!(config.outlier_contamination, 0.05);
        assert_eq!(config.knn_neighbors, 5);
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.memory_size, 10);
        assert!(config.use_advisory_planning);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = EngineConfig::builder()
            .missing_value_threshold(0.7)
            .outlier_contamination(0.1)
            .knn_neighbors(3)
            .max_iterations(10)
            .memory_size(4)
            .use_advisory_planning(false)
            .build()
            .unwrap();

        assert_eq!(config.missing_value_threshold, 0.7);
        assert_eq!(config.outlier_contamination, 0.1);
        assert_eq!(config.knn_neighbors, 3);
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.memory_size, 4);
        assert!(!config.use_advisory_planning);
        assert!(config.use_advisory_validation);
    }

    #[test]
    fn test_threshold_bounds_are_exclusive() {
        for bad in [0.0, 1.0, -0.2, 1.5, f64::NAN] {
            let result = EngineConfig::builder().missing_value_threshold(bad).build();
            assert!(
                matches!(
                    result,
                    Err(ConfigValidationError::OutOfRange {
                        field: "missing_value_threshold",
                        ..
                    })
                ),
                "threshold {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_contamination_bounds() {
        assert!(EngineConfig::builder().outlier_contamination(0.49).build().is_ok());
        assert!(EngineConfig::builder().outlier_contamination(0.5).build().is_ok());
        assert!(EngineConfig::builder().outlier_contamination(0.51).build().is_err());
        assert!(EngineConfig::builder().outlier_contamination(0.0).build().is_err());
    }

    #[test]
    fn test_zero_counts_rejected() {
        assert_eq!(
            EngineConfig::builder().knn_neighbors(0).build(),
            Err(ConfigValidationError::InvalidKnnNeighbors(0))
        );
        assert_eq!(
            EngineConfig::builder().max_iterations(0).build(),
            Err(ConfigValidationError::MustBePositive("max_iterations"))
        );
        assert_eq!(
            EngineConfig::builder().memory_size(0).build(),
            Err(ConfigValidationError::MustBePositive("memory_size"))
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }
}
