//! Data profiling module for dataset analysis.
//!
//! This module computes the statistical signals the diagnosis is built on:
//! - Shape and duplicate rows
//! - Missing values and cardinality per column
//! - Distribution statistics and IQR outliers for numeric columns
//! - The most frequent value for everything else

mod statistics;

use crate::error::{Result, ResultExt};
use crate::types::{ColumnStats, Profile};
use indexmap::IndexMap;
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

pub(crate) use statistics::{distinct_count, numeric_stats, percentage};

/// Data profiler for analyzing dataset structure and characteristics.
pub struct DataProfiler;

impl DataProfiler {
    /// Profile an entire dataset.
    ///
    /// Every column of `df` gets exactly one entry in
    /// [`Profile::column_details`], in dataset order. Never modifies `df`.
    pub fn profile(df: &DataFrame) -> Result<Profile> {
        let rows = df.height();
        let duplicates = Self::count_duplicates(df).context("Counting duplicate rows")?;

        let mut column_details = IndexMap::with_capacity(df.width());
        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let stats = Self::profile_column(series, rows)
                .context(format!("Profiling column '{}'", series.name()))?;
            column_details.insert(series.name().to_string(), stats);
        }

        debug!(rows, columns = df.width(), duplicates, "Dataset profiled");

        Ok(Profile {
            rows,
            columns: df.width(),
            duplicates,
            column_details,
        })
    }

    /// Rows identical to an earlier row (nulls compare equal).
    fn count_duplicates(df: &DataFrame) -> Result<usize> {
        if df.width() == 0 || df.height() == 0 {
            return Ok(0);
        }
        let unique = df.unique::<&str, &str>(None, UniqueKeepStrategy::First, None)?;
        Ok(df.height() - unique.height())
    }

    fn profile_column(series: &Series, rows: usize) -> Result<ColumnStats> {
        let dtype = dtype_label(series.dtype());

        if is_numeric_dtype(series.dtype()) {
            let values = numeric_values(series)?;
            let missing_count = rows - values.len();
            let unique_values = distinct_count(&values);

            Ok(ColumnStats {
                dtype,
                missing_count,
                missing_percentage: percentage(missing_count, rows),
                unique_values,
                is_numeric: true,
                numeric: Some(numeric_stats(&values)),
                top_value: None,
            })
        } else {
            let missing_count = series.null_count();
            let non_null = series.drop_nulls();

            Ok(ColumnStats {
                dtype,
                missing_count,
                missing_percentage: percentage(missing_count, rows),
                unique_values: non_null.n_unique()?,
                is_numeric: false,
                numeric: None,
                top_value: most_frequent_value(&non_null)?,
            })
        }
    }
}

/// Integer and float columns are numeric; booleans are not.
fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Non-missing values of a numeric column as `f64`; NaN counts as missing.
fn numeric_values(series: &Series) -> Result<Vec<f64>> {
    let floats = series.cast(&DataType::Float64)?;
    Ok(floats
        .f64()?
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .collect())
}

/// Most frequent value rendered as text; ties go to the lexically smallest.
fn most_frequent_value(non_null: &Series) -> Result<Option<String>> {
    if non_null.is_empty() {
        return Ok(None);
    }

    let rendered = non_null.cast(&DataType::String)?;
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in rendered.str()?.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    Ok(best.map(|(value, _)| value.to_string()))
}

/// Dtype names as the generated pandas code will see them.
pub(crate) fn dtype_label(dtype: &DataType) -> String {
    match dtype {
        DataType::Int8 => "int8".to_string(),
        DataType::Int16 => "int16".to_string(),
        DataType::Int32 => "int32".to_string(),
        DataType::Int64 => "int64".to_string(),
        DataType::UInt8 => "uint8".to_string(),
        DataType::UInt16 => "uint16".to_string(),
        DataType::UInt32 => "uint32".to_string(),
        DataType::UInt64 => "uint64".to_string(),
        DataType::Float32 => "float32".to_string(),
        DataType::Float64 => "float64".to_string(),
        DataType::Boolean => "bool".to_string(),
        DataType::String => "object".to_string(),
        DataType::Date | DataType::Datetime(_, _) => "datetime64[ns]".to_string(),
        other => other.to_string(),
    }
}
