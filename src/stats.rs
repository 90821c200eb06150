//! Small descriptive statistics over `f64` slices.
//!
//! All functions use population (not sample) statistics and return `None`
//! for empty input instead of NaN.

#![allow(clippy::cast_precision_loss)]

use std::cmp::Ordering;

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub(crate) fn population_stdev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// `stdev / |mean|`; `None` when the mean is zero.
pub(crate) fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    if m == 0.0 {
        return None;
    }
    Some(population_stdev(values)? / m.abs())
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    out
}

/// Median; the mean of the two middle values for even lengths.
pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let s = sorted(values);
    let mid = s.len() / 2;
    if s.len() % 2 == 0 {
        Some((s[mid - 1] + s[mid]) / 2.0)
    } else {
        Some(s[mid])
    }
}

/// Weighted median of `(value, weight)` pairs.
///
/// Sorts by value and returns the first value at which the cumulative
/// weight reaches half the total. Falls back to the unweighted median when
/// the total weight is not positive.
pub(crate) fn weighted_median(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }
    let total: f64 = pairs.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        let values: Vec<f64> = pairs.iter().map(|(v, _)| *v).collect();
        return median(&values);
    }

    let mut ordered = pairs.to_vec();
    ordered.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let half = total / 2.0;
    let mut cumulative = 0.0;
    for (value, weight) in &ordered {
        cumulative += weight.max(0.0);
        if cumulative >= half {
            return Some(*value);
        }
    }
    ordered.last().map(|(v, _)| *v)
}

pub(crate) fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(median(&[]), None);
        assert_eq!(weighted_median(&[]), None);
        assert_eq!(min_max(&[]), None);
    }

    #[test]
    fn population_statistics() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), Some(5.0));
        assert_eq!(population_stdev(&values), Some(2.0));
        assert_eq!(coefficient_of_variation(&values), Some(0.4));
        assert_eq!(coefficient_of_variation(&[-1.0, 1.0]), None);
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn weighted_median_reaches_half_weight() {
        let pairs = [(3520.0, 0.9), (3480.0, 0.7), (3500.0, 0.9)];
        assert_eq!(weighted_median(&pairs), Some(3500.0));

        // Heavy weight on the top value pulls the median up.
        let pairs = [(1.0, 0.1), (2.0, 0.1), (3.0, 5.0)];
        assert_eq!(weighted_median(&pairs), Some(3.0));
    }

    #[test]
    fn weighted_median_zero_weight_falls_back() {
        let pairs = [(1.0, 0.0), (2.0, 0.0), (10.0, 0.0)];
        assert_eq!(weighted_median(&pairs), Some(2.0));
    }
}
