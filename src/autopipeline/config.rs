//! AutoML run configuration

use crate::error::{Result, SwiftPredictError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoMlConfig {
    /// Row-null fraction at or below which rows are dropped instead of imputed
    pub null_drop_threshold: f64,
    /// Integer targets with at most this many distinct values are classification
    pub max_classification_cardinality: usize,
    /// Categorical columns with at most this many levels are one-hot encoded
    pub max_onehot_levels: usize,
    /// Minority/majority class ratio below which SMOTE runs
    pub imbalance_threshold: f64,
    pub smote_k_neighbors: usize,
    pub cv_folds: usize,
    pub test_size: f64,
    pub random_state: u64,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Evaluate folds on the rayon pool
    pub parallel_folds: bool,
}

impl Default for AutoMlConfig {
    fn default() -> Self {
        Self {
            null_drop_threshold: 0.10,
            max_classification_cardinality: 20,
            max_onehot_levels: 5,
            imbalance_threshold: 0.15,
            smote_k_neighbors: 5,
            cv_folds: 10,
            test_size: 0.2,
            random_state: 42,
            n_estimators: 100,
            max_depth: 6,
            learning_rate: 0.1,
            parallel_folds: true,
        }
    }
}

impl AutoMlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON config file; absent fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_null_drop_threshold(mut self, threshold: f64) -> Self {
        self.null_drop_threshold = threshold;
        self
    }

    pub fn with_max_classification_cardinality(mut self, n: usize) -> Self {
        self.max_classification_cardinality = n;
        self
    }

    pub fn with_max_onehot_levels(mut self, n: usize) -> Self {
        self.max_onehot_levels = n;
        self
    }

    pub fn with_imbalance_threshold(mut self, threshold: f64) -> Self {
        self.imbalance_threshold = threshold;
        self
    }

    pub fn with_smote_k_neighbors(mut self, k: usize) -> Self {
        self.smote_k_neighbors = k;
        self
    }

    pub fn with_cv_folds(mut self, k: usize) -> Self {
        self.cv_folds = k;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_parallel_folds(mut self, parallel: bool) -> Self {
        self.parallel_folds = parallel;
        self
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(SwiftPredictError::Config(format!("{} must be within [0, 1], got {}", name, v)))
            }
        };
        unit("null_drop_threshold", self.null_drop_threshold)?;
        unit("imbalance_threshold", self.imbalance_threshold)?;

        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(SwiftPredictError::Config(format!(
                "test_size must be within (0, 1), got {}",
                self.test_size
            )));
        }
        if self.cv_folds < 2 {
            return Err(SwiftPredictError::Config(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.smote_k_neighbors == 0 {
            return Err(SwiftPredictError::Config("smote_k_neighbors must be positive".to_string()));
        }
        if self.n_estimators == 0 || self.max_depth == 0 {
            return Err(SwiftPredictError::Config(
                "n_estimators and max_depth must be positive".to_string(),
            ));
        }
        if self.learning_rate <= 0.0 {
            return Err(SwiftPredictError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AutoMlConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cv_folds, 10);
        assert_eq!(config.max_onehot_levels, 5);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(AutoMlConfig::new().with_cv_folds(1).validate().is_err());
        assert!(AutoMlConfig::new().with_test_size(1.0).validate().is_err());
        assert!(AutoMlConfig::new().with_null_drop_threshold(1.5).validate().is_err());
        assert!(matches!(
            AutoMlConfig::new().with_learning_rate(0.0).validate(),
            Err(SwiftPredictError::Config(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AutoMlConfig = serde_json::from_str(r#"{"cv_folds": 5}"#).unwrap();
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.random_state, 42);
    }
}
