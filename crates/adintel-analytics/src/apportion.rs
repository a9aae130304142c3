//! Shared numeric helpers: region apportionment and percentage normalization.

use adintel_core::Creative;

/// Reach attributed to one region: `round(total_reach * percentage / 100)`.
///
/// Negative or non-finite percentages apportion nothing.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn apportion(total_reach: u64, percentage: f64) -> u64 {
    if !percentage.is_finite() || percentage <= 0.0 {
        return 0;
    }
    (total_reach as f64 * percentage / 100.0).round() as u64
}

/// `(region, reach)` pairs for a creative with a demographic sample and
/// nonzero reach. Empty for every other creative.
#[must_use]
pub fn region_reach(creative: &Creative) -> Vec<(String, u64)> {
    let Some(sample) = creative.sample() else {
        return Vec::new();
    };
    let total = creative.effective_reach();
    if total == 0 {
        return Vec::new();
    }
    sample
        .regions
        .iter()
        .map(|r| (r.region.to_ascii_uppercase(), apportion(total, r.percentage)))
        .collect()
}

#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Normalize a group of percentages in place.
///
/// - Sum within `0.1` of 100: values are rounded to two decimals.
/// - Sum of zero: values are left unchanged.
/// - Otherwise every value is rescaled proportionally to sum to 100.
///
/// In the first and last case any rounding residual is folded into the
/// largest entry so the group sums to exactly 100.
pub fn normalize_percentages(values: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    if values.is_empty() || sum.abs() < f64::EPSILON || !sum.is_finite() {
        return;
    }

    if (sum - 100.0).abs() <= 0.1 {
        for v in values.iter_mut() {
            *v = round2(*v);
        }
    } else {
        for v in values.iter_mut() {
            *v = round2(*v / sum * 100.0);
        }
    }

    let rounded_sum: f64 = values.iter().sum();
    let residual = round2(100.0 - rounded_sum);
    if residual.abs() > f64::EPSILON {
        if let Some(largest) = values.iter_mut().max_by(|a, b| a.total_cmp(b)) {
            *largest = round2(*largest + residual);
        }
    }
}
