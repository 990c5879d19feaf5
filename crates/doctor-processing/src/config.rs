//! Configuration types for the data doctor pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use doctor_sandbox::SandboxLimits;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default working directory for staged uploads and generated files.
pub const DEFAULT_WORKDIR: &str = "temp";

/// Default timeout for one diagnosis round-trip, in seconds.
pub const DEFAULT_DIAGNOSIS_TIMEOUT_SECS: u64 = 60;

/// Default number of retries after a transient diagnosis failure.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Configuration for the data doctor pipeline.
///
/// Use [`DoctorConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust
/// use doctor_processing::config::DoctorConfig;
///
/// let config = DoctorConfig::builder()
///     .workdir("uploads")
///     .diagnosis_timeout_secs(45)
///     .sandbox_timeout_secs(10)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorConfig {
    /// Directory holding staged inputs, cleaned CSVs and reports.
    /// Default: "temp"
    pub workdir: PathBuf,

    /// Timeout for a single request to the model backend, in seconds.
    /// Default: 60
    pub diagnosis_timeout_secs: u64,

    /// Retries after a transient backend failure (timeout, connection
    /// error, HTTP 429/5xx). Default: 2
    pub max_retries: u32,

    /// Limits for executing generated code.
    /// Default: 30 s wall clock, 5 000 000 result rows
    pub sandbox: SandboxLimits,
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from(DEFAULT_WORKDIR),
            diagnosis_timeout_secs: DEFAULT_DIAGNOSIS_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            sandbox: SandboxLimits::default(),
        }
    }
}

impl DoctorConfig {
    /// Create a new configuration builder.
    pub fn builder() -> DoctorConfigBuilder {
        DoctorConfigBuilder::default()
    }

    /// Diagnosis timeout as a [`Duration`].
    pub fn diagnosis_timeout(&self) -> Duration {
        Duration::from_secs(self.diagnosis_timeout_secs)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.workdir.as_os_str().is_empty() {
            return Err(ConfigValidationError::EmptyWorkdir);
        }

        if self.diagnosis_timeout_secs == 0 {
            return Err(ConfigValidationError::ZeroTimeout {
                field: "diagnosis_timeout_secs".to_string(),
            });
        }

        if self.sandbox.timeout_secs == 0 {
            return Err(ConfigValidationError::ZeroTimeout {
                field: "sandbox.timeout_secs".to_string(),
            });
        }

        if self.sandbox.max_result_rows == 0 {
            return Err(ConfigValidationError::InvalidRowLimit(
                self.sandbox.max_result_rows,
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Working directory must not be empty")]
    EmptyWorkdir,

    #[error("Invalid timeout for '{field}': must be at least 1 second")]
    ZeroTimeout { field: String },

    #[error("Invalid result row limit: {0} (must be at least 1)")]
    InvalidRowLimit(usize),
}

/// Builder for [`DoctorConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct DoctorConfigBuilder {
    workdir: Option<PathBuf>,
    diagnosis_timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    sandbox_timeout_secs: Option<u64>,
    max_result_rows: Option<usize>,
}

impl DoctorConfigBuilder {
    /// Set the working directory for staged files and outputs.
    pub fn workdir(mut self, path: impl Into<PathBuf>) -> Self {
        self.workdir = Some(path.into());
        self
    }

    /// Set the timeout for one diagnosis request, in seconds.
    pub fn diagnosis_timeout_secs(mut self, secs: u64) -> Self {
        self.diagnosis_timeout_secs = Some(secs);
        self
    }

    /// Set the number of retries after transient backend failures.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set the wall-clock budget for generated code, in seconds.
    pub fn sandbox_timeout_secs(mut self, secs: u64) -> Self {
        self.sandbox_timeout_secs = Some(secs);
        self
    }

    /// Set the result row cap for generated code.
    pub fn max_result_rows(mut self, rows: usize) -> Self {
        self.max_result_rows = Some(rows);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `DoctorConfig` or an error if validation fails.
    pub fn build(self) -> Result<DoctorConfig, ConfigValidationError> {
        let defaults = SandboxLimits::default();
        let config = DoctorConfig {
            workdir: self
                .workdir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKDIR)),
            diagnosis_timeout_secs: self
                .diagnosis_timeout_secs
                .unwrap_or(DEFAULT_DIAGNOSIS_TIMEOUT_SECS),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            sandbox: SandboxLimits {
                timeout_secs: self.sandbox_timeout_secs.unwrap_or(defaults.timeout_secs),
                max_result_rows: self.max_result_rows.unwrap_or(defaults.max_result_rows),
                ..defaults
            },
        };

        config.validate()?;
        Ok(config)
    }
}
