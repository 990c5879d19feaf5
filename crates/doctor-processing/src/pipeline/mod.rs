//! Pipeline module.
//!
//! This module provides the [`Doctor`] request pipeline and the shapes of its
//! analysis and cleaning results.

mod builder;
mod reports;

pub use builder::{Doctor, DoctorBuilder};
pub use reports::{
    AnalysisReport, CleaningReport, CleaningRequest, DEFAULT_CLEANING_SUMMARY, RunReport,
};
