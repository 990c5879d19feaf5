//! Statistical functions for column profiling.
//!
//! All functions work on the non-missing values of a column. Empty input
//! yields 0 rather than NaN so profiles always serialize to valid JSON.

use crate::types::NumericStats;

/// Tukey fence multiplier for outlier detection.
pub(crate) const IQR_MULTIPLIER: f64 = 1.5;

/// Compute every numeric statistic for one column.
///
/// Missing values must already be removed. An empty slice yields all zeros.
pub(crate) fn numeric_stats(values: &[f64]) -> NumericStats {
    if values.is_empty() {
        return NumericStats::default();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    NumericStats {
        mean: mean(values),
        median: quantile(&sorted, 0.5),
        std_dev: sample_std(values),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        skewness: skewness(values),
        outlier_count: outlier_count(&sorted),
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub(crate) fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let mean = mean(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

/// Adjusted Fisher-Pearson skewness `G1 = sqrt(n(n-1)) / (n-2) * m3 / m2^1.5`.
///
/// Returns 0 for fewer than three values or a constant column.
pub(crate) fn skewness(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }

    let mean = mean(values);
    let nf = n as f64;
    let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / nf;
    if m2 <= f64::EPSILON * mean.abs().max(1.0) {
        return 0.0;
    }
    let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / nf;

    (nf * (nf - 1.0)).sqrt() / (nf - 2.0) * m3 / m2.powf(1.5)
}

/// Quantile by linear interpolation between the closest order statistics.
///
/// `sorted` must be in ascending order.
pub(crate) fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let position = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let fraction = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
        }
    }
}

/// Count values outside `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`.
///
/// `sorted` must be in ascending order.
pub(crate) fn outlier_count(sorted: &[f64]) -> usize {
    if sorted.is_empty() {
        return 0;
    }

    let q1 = quantile(sorted, 0.25);
    let q3 = quantile(sorted, 0.75);
    let iqr = q3 - q1;
    let lower_bound = q1 - IQR_MULTIPLIER * iqr;
    let upper_bound = q3 + IQR_MULTIPLIER * iqr;

    sorted
        .iter()
        .filter(|&&v| v < lower_bound || v > upper_bound)
        .count()
}

/// Number of distinct values; `-0.0` and `0.0` count as one.
pub(crate) fn distinct_count(values: &[f64]) -> usize {
    let mut distinct: Vec<f64> = values
        .iter()
        .map(|&v| if v == 0.0 { 0.0 } else { v })
        .collect();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    distinct.len()
}

/// Percentage of `part` in `total`, rounded to two decimals; 0 when `total` is 0.
pub(crate) fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
}
