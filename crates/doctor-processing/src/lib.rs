//! Dataset profiling, model diagnosis and sandboxed cleaning.
//!
//! # Overview
//!
//! This library takes a tabular dataset through three steps:
//!
//! - **Profiling**: shape, duplicates, missing values, cardinality and
//!   distribution statistics per column ([`DataProfiler`])
//! - **Diagnosis**: a condensed profile is sent to a language model, which
//!   answers with a summary, per-column strategies and a pandas cleaning
//!   routine ([`DiagnosisClient`])
//! - **Cleaning**: the routine runs in the `doctor_sandbox` executor against a
//!   private copy of the data, and a before/after report is written
//!   ([`Doctor`])
//!
//! Diagnosis never fails a request. When the model cannot be reached or its
//! answer is unusable, [`DiagnosisOutcome::Failed`] carries the cause and the
//! profile is still returned.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use doctor_processing::{Doctor, DoctorConfig};
//! use doctor_processing::ai::GeminiProvider;
//! use std::sync::Arc;
//!
//! let provider = Arc::new(GeminiProvider::new(api_key)?);
//! let doctor = Doctor::builder()
//!     .config(DoctorConfig::builder().workdir("temp").build()?)
//!     .ai_provider(provider)
//!     .build()?;
//!
//! let filename = doctor.stage("patients.csv")?;
//! let analysis = doctor.analyze(&filename)?;
//! if analysis.is_diagnosed() {
//!     let cleaning = doctor.clean(&analysis.cleaning_request())?;
//!     println!("Report written to {}", cleaning.report_file.display());
//! }
//! ```
//!
//! # AI Providers
//!
//! The library supports multiple model backends through the [`ai::AIProvider`] trait.
//! Currently implemented providers:
//!
//! - [`ai::GeminiProvider`] - Google Gemini API
//! - [`ai::OpenRouterProvider`] - OpenRouter API (supports multiple LLM models)
//!
//! To implement your own provider, see the [`ai`] module documentation.

pub mod ai;
pub mod config;
pub mod diagnosis;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod profiler;
pub mod reporting;
pub mod types;

// Re-exports for convenient access
pub use config::{ConfigValidationError, DoctorConfig, DoctorConfigBuilder};
pub use diagnosis::{DiagnosisClient, RuleBook};
pub use error::{DiagnosisError, DoctorError, Result as DoctorResult, ResultExt};
pub use loader::{InputFormat, load_dataset, write_csv};
pub use pipeline::{
    AnalysisReport, CleaningReport, CleaningRequest, Doctor, DoctorBuilder, RunReport,
};
pub use profiler::DataProfiler;
pub use reporting::{HealthMetric, HealthReport, ReportGenerator, ReportParams};
pub use types::{
    ColumnStats, Diagnosis, DiagnosisFailure, DiagnosisOutcome, FAILED_DIAGNOSIS_SUMMARY,
    NumericStats, Profile, Strategy,
};
