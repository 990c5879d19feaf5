use crate::error::{Result, ResultExt};
use crate::types::{Profile, Strategy};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Procedures listed when the diagnosis named no strategies.
pub const DEFAULT_PROCEDURES: [&str; 3] = [
    "Standardized schema structure.",
    "Applied statistical imputation.",
    "Removed anomalies.",
];

// ============================================================================
// Report Types
// ============================================================================

/// Cleaning report for one dataset, ready for an external renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    /// Name of the original input file
    pub source_file: String,
    /// Name of the cleaned CSV
    pub clean_file: String,
    /// The diagnosis summary
    pub executive_summary: String,
    /// One line per executed procedure
    pub procedures: Vec<String>,
    /// Before/after comparison
    pub health_metrics: Vec<HealthMetric>,
}

/// One row of the before/after comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthMetric {
    pub metric: String,
    pub before: usize,
    pub after: usize,
}

impl HealthMetric {
    fn new(metric: &str, before: usize, after: usize) -> Self {
        Self {
            metric: metric.to_string(),
            before,
            after,
        }
    }

    /// `after - before`, negative when the metric went down.
    pub fn delta(&self) -> i64 {
        self.after as i64 - self.before as i64
    }
}

/// Inputs for [`ReportGenerator::build`].
pub struct ReportParams<'a> {
    pub source_file: &'a str,
    pub clean_file: &'a str,
    pub summary: &'a str,
    pub strategies: &'a [Strategy],
    pub before: &'a Profile,
    pub after: &'a Profile,
}

// ============================================================================
// Generator
// ============================================================================

pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Assemble the report from the diagnosis and both profiles.
    pub fn build(params: ReportParams<'_>) -> HealthReport {
        let ReportParams {
            source_file,
            clean_file,
            summary,
            strategies,
            before,
            after,
        } = params;

        HealthReport {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            source_file: source_file.to_string(),
            clean_file: clean_file.to_string(),
            executive_summary: summary.to_string(),
            procedures: procedures(strategies),
            health_metrics: health_metrics(before, after),
        }
    }

    /// Write `report` as `Report_<stem>.json` and return its path.
    pub fn write(&self, report: &HealthReport, stem: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).context("Creating report directory")?;

        let report_path = self.output_dir.join(report_file_name(stem));
        let mut file = File::create(&report_path)
            .context(format!("Creating {}", report_path.display()))?;
        file.write_all(serde_json::to_string_pretty(report)?.as_bytes())
            .context(format!("Writing {}", report_path.display()))?;

        info!("Report saved: {}", report_path.display());
        Ok(report_path)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// `Report_<stem>.json`
pub fn report_file_name(stem: &str) -> String {
    format!("Report_{stem}.json")
}

fn procedures(strategies: &[Strategy]) -> Vec<String> {
    if strategies.is_empty() {
        return DEFAULT_PROCEDURES.iter().map(|p| p.to_string()).collect();
    }

    strategies
        .iter()
        .map(|s| format!("{} on column '{}' (Detected: {})", s.action, s.column, s.issue))
        .collect()
}

fn health_metrics(before: &Profile, after: &Profile) -> Vec<HealthMetric> {
    vec![
        HealthMetric::new("Total Rows", before.rows, after.rows),
        HealthMetric::new("Total Columns", before.columns, after.columns),
        HealthMetric::new("Missing Values", before.total_missing(), after.total_missing()),
    ]
}
