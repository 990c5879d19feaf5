//! Cleaning report generation.
//!
//! The report has three sections: the executive summary from the diagnosis,
//! the procedures executed, and a before/after health comparison. It is
//! written as JSON (`Report_<stem>.json`) for an external renderer.
//!
//! # Example
//!
//! ```rust,ignore
//! use doctor_processing::reporting::{ReportGenerator, ReportParams};
//!
//! let report = ReportGenerator::build(ReportParams {
//!     source_file: "patients.csv",
//!     clean_file: "clean_patients.csv",
//!     summary: &diagnosis.summary,
//!     strategies: &diagnosis.strategies,
//!     before: &before,
//!     after: &after,
//! });
//! ReportGenerator::new("temp").write(&report, "patients")?;
//! ```

mod generator;

pub use generator::{
    DEFAULT_PROCEDURES, HealthMetric, HealthReport, ReportGenerator, ReportParams,
    report_file_name,
};
