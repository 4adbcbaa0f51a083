//! Error types for medflow

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for medflow
#[derive(Error, Debug)]
pub enum MedflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No CONFIG_TYPE marker found in {0}")]
    MissingMarker(PathBuf),

    #[error("Unknown analysis type: '{0}'")]
    UnknownAnalysis(String),

    #[error("Settings file not found: {0}")]
    SettingsNotFound(PathBuf),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Target column '{0}' not found in dataset")]
    MissingTarget(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Non-numeric data: {0}")]
    NonNumeric(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter '{name}' = '{value}': {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type alias for medflow operations
pub type Result<T> = std::result::Result<T, MedflowError>;

impl From<polars::error::PolarsError> for MedflowError {
    fn from(err: polars::error::PolarsError) -> Self {
        MedflowError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for MedflowError {
    fn from(err: serde_json::Error) -> Self {
        MedflowError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for MedflowError {
    fn from(err: ndarray::ShapeError) -> Self {
        MedflowError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl MedflowError {
    /// Whether the error belongs to the configuration class of failures
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            MedflowError::ConfigError(_)
                | MedflowError::MissingMarker(_)
                | MedflowError::UnknownAnalysis(_)
                | MedflowError::SettingsNotFound(_)
                | MedflowError::InvalidParameter { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MedflowError::MissingTarget("Overweight".to_string());
        assert_eq!(
            err.to_string(),
            "Target column 'Overweight' not found in dataset"
        );

        let err = MedflowError::ShapeError {
            expected: "10 rows".to_string(),
            actual: "5 rows".to_string(),
        };
        assert!(err.to_string().contains("expected 10 rows"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: MedflowError = io_err.into();
        assert!(matches!(err, MedflowError::IoError(_)));
        assert!(!err.is_config());
    }

    #[test]
    fn test_config_classification() {
        assert!(MedflowError::UnknownAnalysis("svm".into()).is_config());
        assert!(!MedflowError::EmptyData("x".into()).is_config());
    }
}
