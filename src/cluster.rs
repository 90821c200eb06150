//! Candidate clustering and outlier detection.
//!
//! Clustering is a greedy first-fit pass in input order: each unclustered
//! value opens a new cluster and pulls in every later unclustered value
//! within the relative tolerance of the *opening* value. The result is
//! order-dependent and not a global optimum; callers rely on that exact
//! grouping (including the "first cluster wins ties" rule), so it must not
//! be replaced by a density or k-means style grouping. Cost is quadratic,
//! which is fine for candidate sets of at most a few dozen values.

use crate::stats;

/// Default relative clustering tolerance.
pub const DEFAULT_TOLERANCE: f64 = 0.15;

/// Default outlier z-score threshold.
///
/// Deliberately aggressive: with a handful of values it flags an entry
/// around four times the others.
pub const DEFAULT_Z_THRESHOLD: f64 = 1.4;

/// Relative distance between two values, measured against `a` (or `b` when
/// `a` is zero).
#[must_use]
pub fn relative_distance(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs();
    if a != 0.0 {
        diff / a.abs()
    } else if b != 0.0 {
        diff / b.abs()
    } else {
        0.0
    }
}

/// Groups numerically close values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateClusterer {
    tolerance: f64,
    z_threshold: f64,
}

impl Default for CandidateClusterer {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE, DEFAULT_Z_THRESHOLD)
    }
}

impl CandidateClusterer {
    /// Creates a clusterer with explicit thresholds.
    #[must_use]
    pub const fn new(tolerance: f64, z_threshold: f64) -> Self {
        Self {
            tolerance,
            z_threshold,
        }
    }

    /// Relative clustering tolerance.
    #[must_use]
    pub const fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Outlier z-score threshold.
    #[must_use]
    pub const fn z_threshold(&self) -> f64 {
        self.z_threshold
    }

    /// Cluster with this clusterer's tolerance.
    #[must_use]
    pub fn cluster(&self, values: &[f64]) -> Vec<Vec<usize>> {
        cluster(values, self.tolerance)
    }

    /// Detect outliers with this clusterer's z threshold.
    #[must_use]
    pub fn detect_outliers(&self, values: &[f64]) -> Vec<bool> {
        detect_outliers(values, self.z_threshold)
    }
}

/// Groups indices of `values` into non-overlapping clusters.
///
/// Clusters are returned in the order they were opened and each cluster
/// lists indices in input order.
#[must_use]
pub fn cluster(values: &[f64], tolerance: f64) -> Vec<Vec<usize>> {
    let mut assigned = vec![false; values.len()];
    let mut clusters = Vec::new();

    for i in 0..values.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let mut members = vec![i];
        for j in (i + 1)..values.len() {
            if !assigned[j] && relative_distance(values[i], values[j]) <= tolerance {
                assigned[j] = true;
                members.push(j);
            }
        }
        clusters.push(members);
    }

    clusters
}

/// Flags values whose population z-score exceeds `z_threshold`.
///
/// With fewer than three values the z-score is not meaningful and nothing
/// is flagged. Identical values (zero deviation) are never outliers.
#[must_use]
pub fn detect_outliers(values: &[f64], z_threshold: f64) -> Vec<bool> {
    if values.len() < 3 {
        return vec![false; values.len()];
    }
    let (Some(mean), Some(stdev)) = (stats::mean(values), stats::population_stdev(values)) else {
        return vec![false; values.len()];
    };
    if stdev == 0.0 {
        return vec![false; values.len()];
    }
    values
        .iter()
        .map(|v| ((v - mean) / stdev).abs() > z_threshold)
        .collect()
}

/// Index of the largest cluster; the first one found wins ties.
#[must_use]
pub fn largest_cluster(clusters: &[Vec<usize>]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, c) in clusters.iter().enumerate() {
        match best {
            Some(b) if clusters[b].len() >= c.len() => {}
            _ => best = Some(i),
        }
    }
    best
}
