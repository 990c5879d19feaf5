//! Request and response shapes of the analyze and clean steps.

use crate::reporting::HealthMetric;
use crate::types::{Diagnosis, DiagnosisOutcome, Profile, Strategy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Summary used when a cleaning request carries none.
pub const DEFAULT_CLEANING_SUMMARY: &str = "Cleaning completed successfully.";

/// Result of analyzing one staged file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub filename: String,
    pub data_stats: Profile,
    /// The diagnosis, or the degraded placeholder when diagnosis failed.
    pub ai_diagnosis: Diagnosis,
    /// Why diagnosis failed, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis_error: Option<String>,
}

impl AnalysisReport {
    pub(crate) fn new(filename: String, data_stats: Profile, outcome: DiagnosisOutcome) -> Self {
        let diagnosis_error = outcome.failure_reason().map(str::to_string);
        Self {
            filename,
            data_stats,
            ai_diagnosis: outcome.into_diagnosis(),
            diagnosis_error,
        }
    }

    /// Whether the model produced a usable diagnosis.
    pub fn is_diagnosed(&self) -> bool {
        self.diagnosis_error.is_none()
    }

    /// The cleaning request that applies this analysis' diagnosis.
    pub fn cleaning_request(&self) -> CleaningRequest {
        CleaningRequest {
            filename: self.filename.clone(),
            code: self.ai_diagnosis.code.clone(),
            strategies: self.ai_diagnosis.strategies.clone(),
            summary: Some(self.ai_diagnosis.summary.clone()),
        }
    }
}

/// Everything needed to clean a staged file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningRequest {
    /// Name of a file in the working directory.
    pub filename: String,
    /// The code unit to execute.
    pub code: String,
    #[serde(default)]
    pub strategies: Vec<Strategy>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl CleaningRequest {
    /// Build a request from a saved diagnosis.
    pub fn from_diagnosis(filename: impl Into<String>, diagnosis: &Diagnosis) -> Self {
        Self {
            filename: filename.into(),
            code: diagnosis.code.clone(),
            strategies: diagnosis.strategies.clone(),
            summary: Some(diagnosis.summary.clone()),
        }
    }

    /// The summary for the report, falling back to a generic one.
    pub fn summary_or_default(&self) -> &str {
        self.summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_CLEANING_SUMMARY)
    }
}

/// Result of a successful cleaning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub status: String,
    pub message: String,
    /// Path of the cleaned CSV.
    pub clean_file: PathBuf,
    /// Path of the JSON report.
    pub report_file: PathBuf,
    pub after_stats: Profile,
    pub health_metrics: Vec<HealthMetric>,
}

/// Analysis followed by cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub analysis: AnalysisReport,
    pub cleaning: CleaningReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn empty_profile() -> Profile {
        Profile {
            rows: 0,
            columns: 0,
            duplicates: 0,
            column_details: IndexMap::new(),
        }
    }

    #[test]
    fn test_degraded_analysis_keeps_profile() {
        let report = AnalysisReport::new(
            "data.csv".to_string(),
            empty_profile(),
            DiagnosisOutcome::failed("timeout"),
        );

        assert!(!report.is_diagnosed());
        assert_eq!(report.diagnosis_error.as_deref(), Some("timeout"));
        assert!(!report.ai_diagnosis.has_code());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["filename"], "data.csv");
        assert_eq!(json["ai_diagnosis"]["generated_python_code"], "");
        assert_eq!(json["data_stats"]["rows"], 0);
    }

    #[test]
    fn test_diagnosed_analysis_omits_error() {
        let diagnosis = Diagnosis {
            summary: "ok".to_string(),
            strategies: vec![],
            code: "def clean_data(df):\n    return df".to_string(),
        };
        let report = AnalysisReport::new(
            "data.csv".to_string(),
            empty_profile(),
            DiagnosisOutcome::Diagnosed(diagnosis),
        );

        assert!(report.is_diagnosed());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("diagnosis_error").is_none());

        let request = report.cleaning_request();
        assert_eq!(request.filename, "data.csv");
        assert_eq!(request.summary_or_default(), "ok");
    }

    #[test]
    fn test_summary_falls_back() {
        let request = CleaningRequest {
            filename: "a.csv".to_string(),
            code: "x".to_string(),
            strategies: vec![],
            summary: Some("  ".to_string()),
        };
        assert_eq!(request.summary_or_default(), DEFAULT_CLEANING_SUMMARY);
    }
}
