use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Summary shown when the model backend could not produce a diagnosis.
pub const FAILED_DIAGNOSIS_SUMMARY: &str = "Failed to generate diagnosis.";

// ============================================================================
// Profile
// ============================================================================

/// Statistical summary of a dataset.
///
/// `column_details` keeps the dataset's column order and holds exactly one
/// entry per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub rows: usize,
    pub columns: usize,
    pub duplicates: usize,
    pub column_details: IndexMap<String, ColumnStats>,
}

impl Profile {
    /// Total number of missing cells across all columns.
    pub fn total_missing(&self) -> usize {
        self.column_details.values().map(|c| c.missing_count).sum()
    }

    /// Names of numeric columns, in dataset order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.column_details
            .iter()
            .filter(|(_, stats)| stats.is_numeric)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Per-column statistics.
///
/// The numeric fields are present only when `is_numeric` is true; `top_value`
/// only for non-numeric columns that have at least one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    #[serde(rename = "type")]
    pub dtype: String,
    pub missing_count: usize,
    pub missing_percentage: f64,
    pub unique_values: usize,
    pub is_numeric: bool,
    #[serde(flatten)]
    pub numeric: Option<NumericStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_value: Option<String>,
}

impl ColumnStats {
    /// Skewness of a numeric column, 0 for everything else.
    pub fn skewness(&self) -> f64 {
        self.numeric.as_ref().map_or(0.0, |n| n.skewness)
    }
}

/// Statistics computed for numeric columns only.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NumericStats {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub skewness: f64,
    pub outlier_count: usize,
}

// ============================================================================
// Diagnosis
// ============================================================================

/// The model's answer: a summary, the per-column strategies and the code unit.
///
/// Field names on the wire follow the response contract given to the model.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Diagnosis {
    #[serde(rename = "diagnosis_summary")]
    pub summary: String,
    #[serde(rename = "strategies_defined")]
    pub strategies: Vec<Strategy>,
    #[serde(rename = "generated_python_code")]
    pub code: String,
}

impl Diagnosis {
    /// The placeholder returned when diagnosis failed: empty code and strategies.
    pub fn degraded() -> Self {
        Self {
            summary: FAILED_DIAGNOSIS_SUMMARY.to_string(),
            strategies: Vec::new(),
            code: String::new(),
        }
    }

    /// Whether the diagnosis carries a code unit to execute.
    pub fn has_code(&self) -> bool {
        !self.code.trim().is_empty()
    }
}

/// One cleaning decision for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub column: String,
    pub issue: String,
    pub action: String,
}

impl Strategy {
    pub fn new(
        column: impl Into<String>,
        issue: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            issue: issue.into(),
            action: action.into(),
        }
    }
}

/// Why a diagnosis could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisFailure {
    pub reason: String,
}

/// Result of asking the model for a diagnosis.
///
/// Diagnosis never fails the request: a backend or parsing failure yields
/// [`DiagnosisOutcome::Failed`], which callers can still display through
/// [`DiagnosisOutcome::into_diagnosis`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiagnosisOutcome {
    Diagnosed(Diagnosis),
    Failed(DiagnosisFailure),
}

impl DiagnosisOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(DiagnosisFailure {
            reason: reason.into(),
        })
    }

    pub fn is_diagnosed(&self) -> bool {
        matches!(self, Self::Diagnosed(_))
    }

    /// The diagnosis, or the degraded placeholder when diagnosis failed.
    pub fn into_diagnosis(self) -> Diagnosis {
        match self {
            Self::Diagnosed(diagnosis) => diagnosis,
            Self::Failed(_) => Diagnosis::degraded(),
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Diagnosed(_) => None,
            Self::Failed(failure) => Some(&failure.reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_column(missing: usize) -> ColumnStats {
        ColumnStats {
            dtype: "object".to_string(),
            missing_count: missing,
            missing_percentage: 0.0,
            unique_values: 2,
            is_numeric: false,
            numeric: None,
            top_value: Some("Lagos".to_string()),
        }
    }

    #[test]
    fn test_diagnosis_uses_wire_names() {
        let diagnosis = Diagnosis {
            summary: "Missing ages".to_string(),
            strategies: vec![Strategy::new("age", "Missing", "Impute median")],
            code: "def clean_data(df):\n    return df".to_string(),
        };
        let json = serde_json::to_value(&diagnosis).unwrap();

        assert_eq!(json["diagnosis_summary"], "Missing ages");
        assert_eq!(json["strategies_defined"][0]["action"], "Impute median");
        assert!(json["generated_python_code"].as_str().unwrap().contains("clean_data"));
    }

    #[test]
    fn test_failed_outcome_degrades() {
        let outcome = DiagnosisOutcome::failed("timeout");
        assert!(!outcome.is_diagnosed());
        assert_eq!(outcome.failure_reason(), Some("timeout"));

        let diagnosis = outcome.into_diagnosis();
        assert_eq!(diagnosis.summary, FAILED_DIAGNOSIS_SUMMARY);
        assert!(diagnosis.strategies.is_empty());
        assert!(!diagnosis.has_code());
    }

    #[test]
    fn test_column_stats_serialization_shape() {
        let numeric = ColumnStats {
            dtype: "int64".to_string(),
            missing_count: 0,
            missing_percentage: 0.0,
            unique_values: 5,
            is_numeric: true,
            numeric: Some(NumericStats {
                mean: 1.0,
                ..NumericStats::default()
            }),
            top_value: None,
        };
        let json = serde_json::to_value(&numeric).unwrap();
        assert_eq!(json["type"], "int64");
        assert_eq!(json["mean"], 1.0);
        assert!(json.get("top_value").is_none());

        let text = serde_json::to_value(text_column(1)).unwrap();
        assert!(text.get("mean").is_none());
        assert_eq!(text["top_value"], "Lagos");
    }

    #[test]
    fn test_profile_helpers() {
        let mut column_details = IndexMap::new();
        column_details.insert("city".to_string(), text_column(3));
        column_details.insert(
            "age".to_string(),
            ColumnStats {
                is_numeric: true,
                numeric: Some(NumericStats::default()),
                top_value: None,
                ..text_column(2)
            },
        );
        let profile = Profile {
            rows: 10,
            columns: 2,
            duplicates: 0,
            column_details,
        };

        assert_eq!(profile.total_missing(), 5);
        assert_eq!(profile.numeric_columns(), vec!["age"]);
    }

    #[test]
    fn test_profile_roundtrips_through_json() {
        let mut column_details = IndexMap::new();
        column_details.insert("city".to_string(), text_column(0));
        let profile = Profile {
            rows: 2,
            columns: 1,
            duplicates: 0,
            column_details,
        };
        let json = serde_json::to_string(&profile).unwrap();
        let back: Profile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }
}
