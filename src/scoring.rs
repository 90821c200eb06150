//! Consensus confidence scoring.
//!
//! Combines three signals into one score in [0, 1]:
//! - agreement: `1 - coefficient_of_variation` (0.5 when the mean is zero)
//! - quality: mean per-source quality from fixed domain lists
//! - diversity: unique sources / total sources
//!
//! `confidence = 0.4·agreement + 0.3·quality + 0.3·diversity`.
//!
//! This scores a numeric consensus. Attribute-specific evidence weighting
//! lives in the decision rules and is independent of it.

#![allow(clippy::cast_precision_loss)]

use std::collections::HashSet;

use crate::config::ResolverConfig;
use crate::stats;

/// Score returned for a single, unverifiable observation.
pub const SINGLE_SOURCE_CONFIDENCE: f64 = 0.6;

const AGREEMENT_WEIGHT: f64 = 0.4;
const QUALITY_WEIGHT: f64 = 0.3;
const DIVERSITY_WEIGHT: f64 = 0.3;

/// Domains scored at [`TRUSTED_QUALITY`].
pub const TRUSTED_DOMAINS: &[&str] = &[
    "edmunds.com",
    "kbb.com",
    "caranddriver.com",
    "motortrend.com",
    "consumerreports.org",
    "nhtsa.gov",
    "fueleconomy.gov",
    "edmunds",
    "kbb",
];

/// Domains scored at [`SECONDARY_QUALITY`].
pub const SECONDARY_DOMAINS: &[&str] = &[
    "cars.com",
    "autotrader",
    "cargurus",
    "carfax",
    "autoblog",
    "wikipedia",
    "jdpower",
];

/// Quality of a source on the trusted list.
pub const TRUSTED_QUALITY: f64 = 0.9;
/// Quality of a source on the secondary list.
pub const SECONDARY_QUALITY: f64 = 0.7;
/// Quality of any other source.
pub const DEFAULT_QUALITY: f64 = 0.5;

/// Scores agreement among numeric observations.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    config: ResolverConfig,
}

impl ConfidenceScorer {
    /// Creates a scorer using `config.source_weights` as quality multipliers.
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Base quality of one source before any configured multiplier.
    #[must_use]
    pub fn base_quality(source: &str) -> f64 {
        let lowered = source.to_lowercase();
        if TRUSTED_DOMAINS.iter().any(|d| lowered.contains(d)) {
            TRUSTED_QUALITY
        } else if SECONDARY_DOMAINS.iter().any(|d| lowered.contains(d)) {
            SECONDARY_QUALITY
        } else {
            DEFAULT_QUALITY
        }
    }

    /// Quality of one source, with its configured multiplier applied.
    #[must_use]
    pub fn source_quality(&self, source: &str) -> f64 {
        (Self::base_quality(source) * self.config.source_weight(source)).clamp(0.0, 1.0)
    }

    /// Score `values` observed from `sources` (parallel slices).
    #[must_use]
    pub fn score<S: AsRef<str>>(&self, values: &[f64], sources: &[S]) -> f64 {
        match values.len() {
            0 => return 0.0,
            1 => return SINGLE_SOURCE_CONFIDENCE,
            _ => {}
        }

        let agreement = match stats::coefficient_of_variation(values) {
            Some(cv) => (1.0 - cv).max(0.0),
            None => 0.5,
        };

        let (quality, diversity) = if sources.is_empty() {
            (DEFAULT_QUALITY, 0.0)
        } else {
            let quality = sources
                .iter()
                .map(|s| self.source_quality(s.as_ref()))
                .sum::<f64>()
                / sources.len() as f64;
            let unique: HashSet<&str> = sources.iter().map(AsRef::as_ref).collect();
            (quality, unique.len() as f64 / sources.len() as f64)
        };

        (AGREEMENT_WEIGHT * agreement + QUALITY_WEIGHT * quality + DIVERSITY_WEIGHT * diversity)
            .clamp(0.0, 1.0)
    }
}
