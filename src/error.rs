//! Error types for the SwiftPredict pipeline

use thiserror::Error;

/// Result type alias for SwiftPredict operations
pub type Result<T> = std::result::Result<T, SwiftPredictError>;

/// Main error type for the training and inference pipeline
#[derive(Error, Debug)]
pub enum SwiftPredictError {
    #[error("Data quality error{}: {reason}", column.as_ref().map(|c| format!(" in column '{}'", c)).unwrap_or_default())]
    DataQuality {
        column: Option<String>,
        reason: String,
    },

    #[error("Unsupported target type for column '{column}': {dtype}")]
    UnsupportedTargetType { column: String, dtype: String },

    #[error("Schema mismatch: expected {expected}, got {actual}")]
    SchemaMismatch { expected: String, actual: String },

    #[error("Metric '{metric}' could not be computed on fold {fold}: {reason}")]
    MetricComputation {
        metric: String,
        fold: usize,
        reason: String,
    },

    #[error("Training error: {0}")]
    Training(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("No trained model stored under key '{0}'")]
    UnknownModelKey(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SwiftPredictError {
    /// Data quality failure attributed to a single column
    pub fn column_quality(column: impl Into<String>, reason: impl Into<String>) -> Self {
        SwiftPredictError::DataQuality {
            column: Some(column.into()),
            reason: reason.into(),
        }
    }

    /// Data quality failure that concerns the dataset as a whole
    pub fn dataset_quality(reason: impl Into<String>) -> Self {
        SwiftPredictError::DataQuality {
            column: None,
            reason: reason.into(),
        }
    }

    /// Whether the error aborts a run. Only metric failures are recovered.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SwiftPredictError::MetricComputation { .. })
    }
}

impl From<polars::error::PolarsError> for SwiftPredictError {
    fn from(err: polars::error::PolarsError) -> Self {
        SwiftPredictError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for SwiftPredictError {
    fn from(err: serde_json::Error) -> Self {
        SwiftPredictError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SwiftPredictError {
    fn from(err: ndarray::ShapeError) -> Self {
        SwiftPredictError::SchemaMismatch {
            expected: "valid array shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SwiftPredictError::column_quality("age", "column is entirely missing");
        assert_eq!(
            err.to_string(),
            "Data quality error in column 'age': column is entirely missing"
        );

        let err = SwiftPredictError::dataset_quality("dataset is empty");
        assert_eq!(err.to_string(), "Data quality error: dataset is empty");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SwiftPredictError = io_err.into();
        assert!(matches!(err, SwiftPredictError::Io(_)));
    }

    #[test]
    fn test_metric_errors_are_recoverable() {
        let err = SwiftPredictError::MetricComputation {
            metric: "roc_auc".to_string(),
            fold: 3,
            reason: "only one class present".to_string(),
        };
        assert!(!err.is_fatal());
        assert!(SwiftPredictError::ModelNotFitted.is_fatal());
    }
}
