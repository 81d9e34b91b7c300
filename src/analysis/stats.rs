//! Robust statistics over daily cost series.
//!
//! Median and MAD stand in for mean and standard deviation so that a single
//! aberrant day cannot drag the baseline. Theil–Sen gives a slope with the
//! same resistance for drift detection.

/// Scales MAD into a consistent estimator of the standard deviation under normality.
pub const MODIFIED_Z_SCALE: f64 = 0.6745;

/// MAD below this is treated as a flat baseline.
pub const MAD_EPSILON: f64 = 1e-10;

/// Z-score reported when the baseline is flat and the current day moved anyway.
/// Saturation constant, not a computed statistic.
pub const SATURATED_Z_SCORE: f64 = 10.0;

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Median absolute deviation around a precomputed median.
pub fn median_absolute_deviation(values: &[f64], center: f64) -> Option<f64> {
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

/// Modified z-score of `value` against a baseline summarised by `median` and `mad`.
///
/// A flat baseline (`mad < MAD_EPSILON`) yields `±SATURATED_Z_SCORE` when the
/// value moved by more than `min_move`, otherwise `None`.
pub fn modified_z_score(value: f64, median: f64, mad: f64, min_move: f64) -> Option<f64> {
    if mad < MAD_EPSILON {
        let diff = value - median;
        if diff.abs() > min_move {
            Some(if diff > 0.0 { SATURATED_Z_SCORE } else { -SATURATED_Z_SCORE })
        } else {
            None
        }
    } else {
        Some(MODIFIED_Z_SCALE * (value - median) / mad)
    }
}

/// Theil–Sen slope: median of `(y[j] - y[i]) / (j - i)` over all `i < j`.
///
/// Positions are the series indices, so the slope is in cost per observation.
pub fn theil_sen_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mut slopes = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            slopes.push((values[j] - values[i]) / (j - i) as f64);
        }
    }
    median(&slopes)
}
