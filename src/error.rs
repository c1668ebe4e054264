//! Error types for the esports analysis pipeline

use thiserror::Error;

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Main error type for the analysis pipeline
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<polars::error::PolarsError> for AnalysisError {
    fn from(err: polars::error::PolarsError) -> Self {
        AnalysisError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AnalysisError {
    fn from(err: ndarray::ShapeError) -> Self {
        AnalysisError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalysisError::FeatureNotFound("match_id".to_string());
        assert_eq!(err.to_string(), "Feature not found: match_id");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AnalysisError = io_err.into();
        assert!(matches!(err, AnalysisError::IoError(_)));
    }

    #[test]
    fn test_shape_error_display() {
        let err = AnalysisError::ShapeError {
            expected: "12 columns".to_string(),
            actual: "10 columns".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid shape: expected 12 columns, got 10 columns");
    }
}
