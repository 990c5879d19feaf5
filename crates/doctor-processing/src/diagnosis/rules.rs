//! Deterministic rendition of the cleaning rules.
//!
//! The rule book never replaces the model's answer. It previews what the
//! rules imply for a profile and flags where a model diagnosis departs
//! from them.

use crate::types::{ColumnStats, Diagnosis, Profile, Strategy};
use once_cell::sync::Lazy;
use regex::Regex;

/// Columns missing more than this percentage are dropped.
pub const DROP_MISSING_PERCENT: f64 = 50.0;

/// Numeric columns with |skewness| above this are imputed with the median.
pub const SKEW_THRESHOLD: f64 = 1.0;

// Matches the entry point definition anywhere in the code unit
static ENTRY_POINT_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*def\s+clean_data\s*\(").expect("Invalid regex: entry point")
});

/// Thresholds for the cleaning rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleBook {
    pub drop_missing_percent: f64,
    pub skew_threshold: f64,
}

impl Default for RuleBook {
    fn default() -> Self {
        Self {
            drop_missing_percent: DROP_MISSING_PERCENT,
            skew_threshold: SKEW_THRESHOLD,
        }
    }
}

impl RuleBook {
    /// Strategies the rules imply for `profile`, in column order.
    pub fn recommend(&self, profile: &Profile) -> Vec<Strategy> {
        let mut strategies = Vec::new();

        for (column, stats) in &profile.column_details {
            if self.should_drop(stats) {
                strategies.push(Strategy::new(
                    column,
                    format!("Missing {:.2}%", stats.missing_percentage),
                    "Drop column",
                ));
                continue;
            }

            if stats.missing_count > 0 {
                strategies.push(Strategy::new(
                    column,
                    "Missing values",
                    self.imputation_for(stats),
                ));
            }

            if let Some(numeric) = &stats.numeric
                && numeric.outlier_count > 0
            {
                strategies.push(Strategy::new(
                    column,
                    format!("{} outliers", numeric.outlier_count),
                    "Cap outliers using IQR bounds",
                ));
            }
        }

        strategies
    }

    /// Human-readable departures of `diagnosis` from the rules.
    ///
    /// An empty list means nothing stood out; it does not mean the code is
    /// correct.
    pub fn audit(&self, profile: &Profile, diagnosis: &Diagnosis) -> Vec<String> {
        let mut findings = Vec::new();

        for strategy in &diagnosis.strategies {
            if !profile.column_details.contains_key(&strategy.column) {
                findings.push(format!(
                    "Strategy references unknown column '{}'",
                    strategy.column
                ));
            }
        }

        for (column, stats) in &profile.column_details {
            let actions: Vec<String> = diagnosis
                .strategies
                .iter()
                .filter(|s| &s.column == column)
                .map(|s| s.action.to_lowercase())
                .collect();

            if self.should_drop(stats) && !actions.iter().any(|a| a.contains("drop")) {
                findings.push(format!(
                    "Column '{}' is {:.2}% missing but is not dropped",
                    column, stats.missing_percentage
                ));
            }

            if stats.is_numeric
                && stats.skewness().abs() > self.skew_threshold
                && actions.iter().any(|a| a.contains("mean"))
            {
                findings.push(format!(
                    "Column '{}' is skewed ({:.2}) but imputed with the mean",
                    column,
                    stats.skewness()
                ));
            }
        }

        if diagnosis.has_code() && !ENTRY_POINT_DEF.is_match(&diagnosis.code) {
            findings.push("Generated code does not define clean_data(df)".to_string());
        }

        findings
    }

    fn should_drop(&self, stats: &ColumnStats) -> bool {
        stats.missing_percentage > self.drop_missing_percent
    }

    fn imputation_for(&self, stats: &ColumnStats) -> &'static str {
        if !stats.is_numeric {
            "Impute mode"
        } else if stats.skewness().abs() > self.skew_threshold {
            "Impute median"
        } else {
            "Impute mean"
        }
    }
}
