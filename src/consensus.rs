//! Numeric consensus resolution.
//!
//! The consensus path clusters all numeric observations, keeps the largest
//! cluster (first found on ties), and takes its confidence-weighted median.
//! Confidence is scored over *all* observations, not just the winning
//! cluster, so a lone dissenting value still lowers it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::candidate::{skip_warning, SearchCandidate};
use crate::cluster::{self, CandidateClusterer};
use crate::config::ResolverConfig;
use crate::scoring::ConfidenceScorer;
use crate::stats;

/// How a consensus value was reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// Nothing to resolve.
    NoCandidates,
    /// One observation, passed through.
    SingleCandidate,
    /// Weighted median of the largest cluster.
    WeightedMedianCluster,
    /// Produced by the named attribute rule and served from provenance.
    DecisionRule(String),
}

impl ResolutionMethod {
    /// Stable name; the rule name for [`ResolutionMethod::DecisionRule`].
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NoCandidates => "no_candidates",
            Self::SingleCandidate => "single_candidate",
            Self::WeightedMedianCluster => "weighted_median_cluster",
            Self::DecisionRule(rule) => rule,
        }
    }

    /// Inverse of [`ResolutionMethod::as_str`]. Any name that is not a
    /// consensus method is taken as a rule name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "no_candidates" => Self::NoCandidates,
            "single_candidate" => Self::SingleCandidate,
            "weighted_median_cluster" => Self::WeightedMedianCluster,
            rule => Self::DecisionRule(rule.to_string()),
        }
    }
}

/// Result of a consensus resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Resolved value (0 when there were no candidates).
    pub final_value: f64,
    /// Consensus confidence in [0, 1].
    pub confidence_score: f64,
    /// Method used.
    pub method: ResolutionMethod,
    /// Numeric candidates that took part, in input order.
    pub candidates: Vec<SearchCandidate>,
    /// Outlier flag per entry of `candidates`.
    pub outliers: Vec<bool>,
    /// Human-readable warnings.
    pub warnings: Vec<String>,
}

impl ResolutionResult {
    /// Returns true if any candidate was flagged as an outlier.
    #[must_use]
    pub fn has_outliers(&self) -> bool {
        self.outliers.iter().any(|&o| o)
    }
}

/// Resolves numeric candidates by clustering and weighted median.
#[derive(Debug, Clone, Default)]
pub struct ConsensusResolver {
    config: ResolverConfig,
    clusterer: CandidateClusterer,
    scorer: ConfidenceScorer,
}

impl ConsensusResolver {
    /// Creates a resolver from a configuration.
    ///
    /// `config` is used as given and is expected to have passed
    /// [`ResolverConfig::validate`].
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            clusterer: CandidateClusterer::new(
                config.clustering_tolerance,
                config.outlier_threshold,
            ),
            scorer: ConfidenceScorer::new(config.clone()),
            config,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a list of candidates to one value.
    ///
    /// Candidates without a numeric reading or with an out-of-range
    /// confidence are skipped, each with its own warning.
    #[must_use]
    pub fn resolve(&self, candidates: &[SearchCandidate]) -> ResolutionResult {
        let mut warnings = Vec::new();
        let mut accepted: Vec<SearchCandidate> = Vec::with_capacity(candidates.len());
        let mut values: Vec<f64> = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if let Err(e) = candidate.validate() {
                warnings.push(skip_warning(candidate, &e.to_string()));
                continue;
            }
            match candidate.value.as_number() {
                Some(v) => {
                    values.push(v);
                    accepted.push(candidate.clone());
                }
                None => warnings.push(skip_warning(candidate, "value is not numeric")),
            }
        }

        let threshold = self.config.confidence_threshold;

        match accepted.len() {
            0 => {
                warnings.push("No candidates found".to_string());
                ResolutionResult {
                    final_value: 0.0,
                    confidence_score: 0.0,
                    method: ResolutionMethod::NoCandidates,
                    candidates: accepted,
                    outliers: Vec::new(),
                    warnings,
                }
            }
            1 => {
                let only = &accepted[0];
                if only.confidence < threshold {
                    warnings.push(format!(
                        "Low confidence: {:.2} < {threshold:.2} (single source '{}')",
                        only.confidence, only.source
                    ));
                }
                ResolutionResult {
                    final_value: values[0],
                    confidence_score: only.confidence,
                    method: ResolutionMethod::SingleCandidate,
                    outliers: vec![false],
                    candidates: accepted,
                    warnings,
                }
            }
            n => {
                let clusters = self.clusterer.cluster(&values);
                let best = cluster::largest_cluster(&clusters)
                    .map(|i| clusters[i].as_slice())
                    .unwrap_or_default();
                let pairs: Vec<(f64, f64)> = best
                    .iter()
                    .map(|&i| (values[i], accepted[i].confidence))
                    .collect();
                let final_value = stats::weighted_median(&pairs).unwrap_or(0.0);

                let sources: Vec<&str> = accepted.iter().map(|c| c.source.as_str()).collect();
                let confidence_score = self.scorer.score(&values, &sources);
                let outliers = self.clusterer.detect_outliers(&values);

                if confidence_score < threshold {
                    warnings.push(format!(
                        "Low confidence: {confidence_score:.2} < {threshold:.2}"
                    ));
                }
                let outlier_count = outliers.iter().filter(|&&o| o).count();
                if outlier_count > 0 {
                    let flagged: Vec<String> = outliers
                        .iter()
                        .zip(&values)
                        .filter(|(o, _)| **o)
                        .map(|(_, v)| format!("{v}"))
                        .collect();
                    warnings.push(format!(
                        "Detected {outlier_count} outlier(s): {}",
                        flagged.join(", ")
                    ));
                }
                if n < self.config.target_candidates {
                    warnings.push(format!(
                        "Only {n} candidates (target {})",
                        self.config.target_candidates
                    ));
                }
                if let Some(cv) = stats::coefficient_of_variation(&values) {
                    if cv > self.config.max_coefficient_of_variation {
                        warnings.push(format!("High variation among candidates (CV {cv:.2})"));
                    }
                }

                debug!(
                    candidates = n,
                    clusters = clusters.len(),
                    winning_cluster = best.len(),
                    final_value,
                    confidence = confidence_score,
                    "Consensus resolved"
                );

                ResolutionResult {
                    final_value,
                    confidence_score,
                    method: ResolutionMethod::WeightedMedianCluster,
                    candidates: accepted,
                    outliers,
                    warnings,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateValue;

    fn c(value: f64, source: &str, confidence: f64) -> SearchCandidate {
        SearchCandidate::new(value, source, confidence).unwrap()
    }

    #[test]
    fn no_candidates() {
        let result = ConsensusResolver::default().resolve(&[]);
        assert_eq!(result.method, ResolutionMethod::NoCandidates);
        assert_eq!(result.final_value, 0.0);
        assert_eq!(result.confidence_score, 0.0);
        assert_eq!(result.warnings, vec!["No candidates found".to_string()]);
    }

    #[test]
    fn single_candidate_passes_through() {
        let result = ConsensusResolver::default().resolve(&[c(3500.0, "kbb", 0.5)]);
        assert_eq!(result.method, ResolutionMethod::SingleCandidate);
        assert_eq!(result.final_value, 3500.0);
        assert_eq!(result.confidence_score, 0.5);
        assert!(result.warnings.iter().any(|w| w.starts_with("Low confidence")));

        let result = ConsensusResolver::default().resolve(&[c(3500.0, "kbb", 0.9)]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn picks_weighted_median_of_largest_cluster() {
        let result = ConsensusResolver::default().resolve(&[
            c(3500.0, "kbb", 0.9),
            c(3520.0, "edmunds", 0.9),
            c(3480.0, "autotrader", 0.7),
            c(4200.0, "forum", 0.4),
        ]);
        assert_eq!(result.method, ResolutionMethod::WeightedMedianCluster);
        assert_eq!(result.final_value, 3500.0);
        assert_eq!(result.outliers, vec![false, false, false, true]);
        assert!(result.has_outliers());
        assert!(result.warnings.iter().any(|w| w.contains("outlier")));
    }

    #[test]
    fn cluster_tie_goes_to_first_found() {
        let result = ConsensusResolver::default().resolve(&[
            c(100.0, "a", 0.9),
            c(500.0, "b", 0.9),
        ]);
        assert_eq!(result.final_value, 100.0);
        assert!(result.warnings.iter().any(|w| w.starts_with("Only 2 candidates")));
        assert!(result.warnings.iter().any(|w| w.starts_with("High variation")));
    }

    #[test]
    fn malformed_candidates_are_skipped() {
        let mut bad_conf = c(3500.0, "oem", 0.9);
        bad_conf.confidence = 3.0;
        let text = SearchCandidate {
            value: CandidateValue::Text("heavy".to_string()),
            ..c(0.0, "forum", 0.5)
        };
        let result = ConsensusResolver::default().resolve(&[
            bad_conf,
            text,
            c(3500.0, "kbb", 0.9),
            c(3500.0, "edmunds", 0.9),
            c(3500.0, "cars.com", 0.9),
        ]);
        assert_eq!(result.candidates.len(), 3);
        assert_eq!(result.outliers.len(), 3);
        assert_eq!(result.final_value, 3500.0);
        let skipped: Vec<_> = result
            .warnings
            .iter()
            .filter(|w| w.starts_with("Skipped candidate"))
            .collect();
        assert_eq!(skipped.len(), 2);
    }

    #[test]
    fn identical_values_are_confident() {
        let result = ConsensusResolver::default().resolve(&[
            c(3200.0, "a.example", 0.8),
            c(3200.0, "b.example", 0.8),
            c(3200.0, "c.example", 0.8),
        ]);
        assert_eq!(result.final_value, 3200.0);
        assert!(result.confidence_score >= 0.7);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn method_names_round_trip() {
        for m in [
            ResolutionMethod::NoCandidates,
            ResolutionMethod::SingleCandidate,
            ResolutionMethod::WeightedMedianCluster,
            ResolutionMethod::DecisionRule("median_of_trusted_sources".to_string()),
        ] {
            assert_eq!(ResolutionMethod::from_name(m.as_str()), m);
        }
    }
}
