//! Resolver configuration.
//!
//! Every knob has a default matching the documented behaviour of the
//! engine and a closed validation range. Configuration can be built in
//! code, or loaded from a JSON document where missing keys fall back to
//! their defaults.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, ValidationError};
use crate::evidence::WriteGate;
use crate::vehicle::FieldName;

/// Tunable thresholds for clustering, scoring and decision rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Relative distance under which two values share a cluster.
    pub clustering_tolerance: f64,
    /// Minimum confidence for a field to be `ok`.
    pub confidence_threshold: f64,
    /// Z-score above which a value is flagged as an outlier.
    pub outlier_threshold: f64,
    /// Number of candidates a consensus resolution expects to see.
    pub target_candidates: usize,
    /// Minimum winning share of a trust-weighted vote.
    pub min_agreement_ratio: f64,
    /// Source substring → quality multiplier.
    pub source_weights: HashMap<String, f64>,
    /// Evidence-weight floor for writing a value.
    pub min_evidence_weight: f64,
    /// Distinct-source floor for writing a value.
    pub min_sources: usize,
    /// Confidence threshold for catalytic converter counts.
    pub catalytic_confidence_threshold: f64,
    /// Evidence-weight floor for catalytic converter counts.
    pub catalytic_min_evidence_weight: f64,
    /// Relative low/high spread above which the exact value depends on the variant.
    pub variant_spread_threshold: f64,
    /// Coefficient of variation above which a consensus result is flagged.
    pub max_coefficient_of_variation: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            clustering_tolerance: 0.15,
            confidence_threshold: 0.7,
            outlier_threshold: 1.4,
            target_candidates: 3,
            min_agreement_ratio: 0.6,
            source_weights: HashMap::new(),
            min_evidence_weight: 0.7,
            min_sources: 1,
            catalytic_confidence_threshold: 0.6,
            catalytic_min_evidence_weight: 0.5,
            variant_spread_threshold: 0.10,
            max_coefficient_of_variation: 0.30,
        }
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if value.is_nan() || value < min || value > max {
        return Err(ValidationError::ConfigOutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

impl ResolverConfig {
    /// Validates every knob against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ConfigOutOfRange` naming the first offending knob.
    #[allow(clippy::cast_precision_loss)]
    pub fn validate(self) -> Result<Self, ValidationError> {
        check_range("clustering_tolerance", self.clustering_tolerance, 0.01, 1.0)?;
        check_range("confidence_threshold", self.confidence_threshold, 0.0, 1.0)?;
        check_range("outlier_threshold", self.outlier_threshold, 0.5, 5.0)?;
        check_range("target_candidates", self.target_candidates as f64, 1.0, 10.0)?;
        check_range("min_agreement_ratio", self.min_agreement_ratio, 0.0, 1.0)?;
        for (domain, weight) in &self.source_weights {
            check_range(&format!("source_weights.{domain}"), *weight, 0.1, 3.0)?;
        }
        check_range("min_evidence_weight", self.min_evidence_weight, 0.0, 10.0)?;
        check_range("min_sources", self.min_sources as f64, 1.0, 10.0)?;
        check_range(
            "catalytic_confidence_threshold",
            self.catalytic_confidence_threshold,
            0.0,
            1.0,
        )?;
        check_range(
            "catalytic_min_evidence_weight",
            self.catalytic_min_evidence_weight,
            0.0,
            10.0,
        )?;
        check_range("variant_spread_threshold", self.variant_spread_threshold, 0.0, 1.0)?;
        check_range(
            "max_coefficient_of_variation",
            self.max_coefficient_of_variation,
            0.0,
            5.0,
        )?;
        Ok(self)
    }

    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns a parse error for malformed JSON or a validation error for
    /// out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, ResolveError> {
        let config: Self = serde_json::from_str(json).map_err(|source| ResolveError::Parse {
            what: "resolver config".to_string(),
            source,
        })?;
        Ok(config.validate()?)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, otherwise as
    /// [`ResolverConfig::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ResolveError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ResolveError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Quality multiplier configured for a source (1.0 when none matches).
    ///
    /// Matching is a case-insensitive substring test; the largest matching
    /// multiplier wins so the result does not depend on map iteration order.
    #[must_use]
    pub fn source_weight(&self, source: &str) -> f64 {
        let lowered = source.to_lowercase();
        self.source_weights
            .iter()
            .filter(|(domain, _)| lowered.contains(&domain.to_lowercase()))
            .map(|(_, weight)| *weight)
            .fold(None, |best: Option<f64>, w| Some(best.map_or(w, |b| b.max(w))))
            .unwrap_or(1.0)
    }

    /// Floors a resolution of `field` must clear to be `ok`.
    ///
    /// Catalytic converter counts use their own, lower floors.
    #[must_use]
    pub fn write_gate(&self, field: FieldName) -> WriteGate {
        match field {
            FieldName::CatalyticConverters => WriteGate {
                confidence_threshold: self.catalytic_confidence_threshold,
                min_evidence_weight: self.catalytic_min_evidence_weight,
                min_sources: self.min_sources,
            },
            _ => WriteGate {
                confidence_threshold: self.confidence_threshold,
                min_evidence_weight: self.min_evidence_weight,
                min_sources: self.min_sources,
            },
        }
    }
}
