//! Prompt-sized view of a profile.

use crate::types::Profile;
use indexmap::IndexMap;
use serde::Serialize;

/// The four signals per column the model gets to see.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CondensedColumn {
    #[serde(rename = "type")]
    pub dtype: String,
    /// Missing percentage.
    pub missing: f64,
    /// Skewness, 0 for non-numeric columns.
    pub skew: f64,
    pub is_numeric: bool,
}

/// Reduce a profile to type, missing percentage, skew and numeric flag per
/// column, keeping dataset column order.
///
/// Counts, extremes and top values are left out to keep the prompt small
/// for wide datasets.
pub fn condense(profile: &Profile) -> IndexMap<String, CondensedColumn> {
    profile
        .column_details
        .iter()
        .map(|(name, stats)| {
            (
                name.clone(),
                CondensedColumn {
                    dtype: stats.dtype.clone(),
                    missing: stats.missing_percentage,
                    skew: stats.skewness(),
                    is_numeric: stats.is_numeric,
                },
            )
        })
        .collect()
}
