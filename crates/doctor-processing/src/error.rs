//! Custom error types for the data doctor pipeline.
//!
//! This module provides the error hierarchy used throughout the crate.
//! Errors are serializable as `{code, message}` so hosts can render them
//! without matching on variants.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the data doctor pipeline.
#[derive(Error, Debug)]
pub enum DoctorError {
    /// The input file extension is not one of the supported formats.
    #[error("Unsupported file format: '{0}' (expected .csv, .xlsx, .xls or .xlsm)")]
    UnsupportedFormat(String),

    /// The input file exists but could not be parsed.
    #[error("Failed to load '{path}': {reason}")]
    Load { path: String, reason: String },

    /// Diagnosis failed. Only ever carried inside a degraded outcome.
    #[error("Diagnosis failed: {0}")]
    Diagnosis(#[from] DiagnosisError),

    /// The request itself is incomplete or unsafe (missing code, bad file name).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Cleaning was requested but no usable diagnosis exists.
    #[error("No usable diagnosis: {0}")]
    DiagnosisUnavailable(String),

    /// The generated code failed or produced no usable result.
    #[error("{0}")]
    Execution(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error.
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

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DoctorError>,
    },
}

/// Why a diagnosis attempt did not yield a usable [`Diagnosis`](crate::Diagnosis).
#[derive(Error, Debug)]
pub enum DiagnosisError {
    /// The backend could not be reached or answered with an error.
    #[error("model backend error: {0:#}")]
    Backend(#[from] anyhow::Error),

    /// The backend answered with an empty body.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// The response contained JSON that does not match the diagnosis contract.
    #[error("model response is not a valid diagnosis: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The response contained no JSON object at all.
    #[error("model response contains no JSON object")]
    NoJsonObject,
}

impl DoctorError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DoctorError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get the error code for host handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::Load { .. } => "LOAD_ERROR",
            Self::Diagnosis(_) => "DIAGNOSIS_ERROR",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::DiagnosisUnavailable(_) => "DIAGNOSIS_UNAVAILABLE",
            Self::Execution(_) => "EXECUTION_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if the failure is caused by the request rather than the system,
    /// i.e. retrying with different input could succeed.
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::UnsupportedFormat(_)
            | Self::Load { .. }
            | Self::InvalidRequest(_)
            | Self::Execution(_) => true,
            Self::WithContext { source, .. } => source.is_input_error(),
            _ => false,
        }
    }
}

impl From<doctor_sandbox::SandboxError> for DoctorError {
    fn from(err: doctor_sandbox::SandboxError) -> Self {
        DoctorError::Execution(err.to_string())
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for DoctorError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("DoctorError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, DoctorError>;

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
        self.map_err(|e| DoctorError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| DoctorError::Io(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            DoctorError::UnsupportedFormat("txt".to_string()).error_code(),
            "UNSUPPORTED_FORMAT"
        );
        assert_eq!(
            DoctorError::Execution("boom".to_string()).error_code(),
            "EXECUTION_ERROR"
        );
    }

    #[test]
    fn test_is_input_error() {
        assert!(DoctorError::UnsupportedFormat("txt".to_string()).is_input_error());
        assert!(
            DoctorError::Execution("boom".to_string())
                .with_context("Cleaning data.csv")
                .is_input_error()
        );
        assert!(!DoctorError::Internal("oops".to_string()).is_input_error());
    }

    #[test]
    fn test_error_serialization() {
        let error = DoctorError::Load {
            path: "data.csv".to_string(),
            reason: "bad quote".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("LOAD_ERROR"));
        assert!(json.contains("bad quote"));
    }

    #[test]
    fn test_with_context() {
        let error = DoctorError::UnsupportedFormat("txt".to_string()).with_context("Staging upload");
        assert!(error.to_string().contains("Staging upload"));
        assert_eq!(error.error_code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_sandbox_error_becomes_execution_error() {
        let err: DoctorError = doctor_sandbox::SandboxError::NoResult {
            entry_point: "clean_data".to_string(),
        }
        .into();
        assert_eq!(err.error_code(), "EXECUTION_ERROR");
        assert!(err.to_string().contains("clean_data"));
    }

    #[test]
    fn test_diagnosis_error_messages() {
        assert_eq!(
            DiagnosisError::NoJsonObject.to_string(),
            "model response contains no JSON object"
        );
        let backend = DiagnosisError::from(anyhow::anyhow!("connection refused"));
        assert!(backend.to_string().contains("connection refused"));
    }
}
