//! Error types for the doctor-sandbox crate.
//!
//! Every failure of a code unit, from a syntax error to a blown time budget,
//! is reported as a [`SandboxError`]. Callers treat all of them as a hard
//! failure of the cleaning step; the variants exist so the failure can be
//! reported precisely.

use thiserror::Error;

/// Specific kinds of Arrow conversion errors.
///
/// Used to provide granular error information when moving DataFrames
/// between Rust (Polars) and the sandbox (pandas) via Arrow IPC.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ArrowConversionKind {
    /// Failed to serialize a Polars DataFrame to Arrow IPC bytes.
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// Failed to deserialize Arrow IPC bytes to a Polars DataFrame.
    #[error("deserialization failed: {0}")]
    Deserialize(String),

    /// A Python value could not be mapped to the expected Rust type.
    #[error("type conversion failed: {0}")]
    TypeConversion(String),
}

/// The main error type for sandboxed execution.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SandboxError {
    /// The code unit was empty; there is nothing to execute.
    #[error("Code unit is empty")]
    EmptyCode,

    /// The code unit cannot be handed to the interpreter (e.g. embedded NUL bytes).
    #[error("Invalid code unit: {0}")]
    InvalidSource(String),

    /// The code unit uses a capability outside the sandbox allow-list.
    #[error("Sandbox violation: {0}")]
    Violation(String),

    /// The code unit exceeded its wall-clock budget.
    #[error("Execution timed out: {0}")]
    Timeout(String),

    /// The code unit raised an exception (syntax or runtime error).
    #[error("Error executing generated code: {message}")]
    Execution {
        /// The Python exception rendered as `Type: message`.
        message: String,
    },

    /// The code unit ran, but defined no `clean_data` function and left `df` untouched.
    #[error(
        "The generated code ran, but defined no '{entry_point}' function and did not modify 'df'"
    )]
    NoResult {
        /// The expected entry point name.
        entry_point: String,
    },

    /// The code unit produced something other than a DataFrame, or an oversized one.
    #[error("Generated code returned an unusable result: {0}")]
    InvalidResult(String),

    /// The interpreter or one of pandas/numpy/pyarrow is not available.
    #[error("Python runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// Failed to move data between Rust and Python via Arrow.
    #[error("Arrow conversion error: {0}")]
    ArrowConversion(#[from] ArrowConversionKind),
}

impl SandboxError {
    /// Short machine-readable code, mirroring the processing crate's error codes.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyCode => "EMPTY_CODE",
            Self::InvalidSource(_) => "INVALID_SOURCE",
            Self::Violation(_) => "SANDBOX_VIOLATION",
            Self::Timeout(_) => "EXECUTION_TIMEOUT",
            Self::Execution { .. } => "EXECUTION_FAILED",
            Self::NoResult { .. } => "NO_RESULT",
            Self::InvalidResult(_) => "INVALID_RESULT",
            Self::RuntimeUnavailable(_) => "RUNTIME_UNAVAILABLE",
            Self::ArrowConversion(_) => "ARROW_CONVERSION",
        }
    }
}

impl From<pyo3::PyErr> for SandboxError {
    fn from(err: pyo3::PyErr) -> Self {
        SandboxError::Execution {
            message: err.to_string(),
        }
    }
}

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;
