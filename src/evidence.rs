//! Evidence accounting for decision rules.
//!
//! Every candidate a rule accepts contributes `trust × confidence` to the
//! field's evidence weight. That weight, together with the number of
//! distinct contributing sources, gates whether a resolution may be written
//! anywhere as an authoritative value.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::trust::SourceTrust;

/// How the chosen value of a range was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateType {
    /// Median of trusted observations.
    Median,
    /// Winner of a trust-weighted vote.
    MajorityVote,
    /// Market-wide default for a value that varies by trim.
    MarketDefault,
    /// Most-voted count among variant-specific observations.
    MostCommon,
    /// No estimate could be made.
    Unknown,
}

impl EstimateType {
    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Median => "median",
            Self::MajorityVote => "majority_vote",
            Self::MarketDefault => "market_default",
            Self::MostCommon => "most_common",
            Self::Unknown => "unknown",
        }
    }
}

/// Outcome range of a resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    /// Lowest plausible value.
    pub low: Option<f64>,
    /// Highest plausible value.
    pub high: Option<f64>,
    /// Chosen unconditional value.
    pub chosen: Option<f64>,
    /// How `chosen` was produced.
    pub estimate_type: EstimateType,
    /// True when the low/high gap means the exact value depends on an
    /// unresolved variant (trim or engine).
    pub variant_needed_for_exact: bool,
}

impl ValueRange {
    /// A range with nothing known.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            low: None,
            high: None,
            chosen: None,
            estimate_type: EstimateType::Unknown,
            variant_needed_for_exact: false,
        }
    }

    /// A range is complete once a value has been chosen.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.chosen.is_some()
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::unknown()
    }
}

/// A value that only holds under a named variant condition.
///
/// Conditional facts are reported alongside the unconditional value and are
/// never merged into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalFact {
    /// Condition in `key=value` form, e.g. `engine=V8`.
    pub condition: String,
    /// Value under the condition.
    pub value: f64,
    /// Confidence in the value under the condition.
    pub confidence: f64,
    /// Sources that reported it.
    pub sources: Vec<String>,
}

/// One source's contribution to a field's evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceContribution {
    /// Source identifier.
    pub name: String,
    /// Value it reported (numeric reading).
    pub value: f64,
    /// Trust tier of the source.
    pub trust: SourceTrust,
    /// Confidence it reported.
    pub confidence: f64,
}

impl SourceContribution {
    /// `trust × confidence`.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.trust.value() * self.confidence
    }
}

/// Aggregated evidence behind a resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceScore {
    /// Sum of `trust × confidence` over contributions.
    pub weighted_score: f64,
    /// Number of distinct contributing sources.
    pub source_count: usize,
    /// Highest trust tier among contributions.
    pub highest_trust: SourceTrust,
    /// Individual contributions in input order.
    pub sources: Vec<SourceContribution>,
}

impl EvidenceScore {
    /// Evidence with no contributions.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            weighted_score: 0.0,
            source_count: 0,
            highest_trust: SourceTrust::Unknown,
            sources: Vec::new(),
        }
    }

    /// True when both the weight and the source-count floors are cleared.
    #[must_use]
    pub fn meets_threshold(&self, min_score: f64, min_sources: usize) -> bool {
        self.weighted_score >= min_score && self.source_count >= min_sources
    }
}

impl Default for EvidenceScore {
    fn default() -> Self {
        Self::empty()
    }
}

/// Floors a resolution must clear before it may be `ok`, and so before it
/// may be written anywhere as an authoritative value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteGate {
    /// Minimum confidence.
    pub confidence_threshold: f64,
    /// Minimum summed `trust × confidence`.
    pub min_evidence_weight: f64,
    /// Minimum number of distinct sources.
    pub min_sources: usize,
}

impl WriteGate {
    /// Reasons a resolution fails the gate, one warning each. Empty when it
    /// passes.
    #[must_use]
    pub fn failures(
        &self,
        chosen: Option<f64>,
        confidence: f64,
        evidence: &EvidenceScore,
    ) -> Vec<String> {
        let mut reasons = Vec::new();
        if chosen.is_none() {
            reasons.push("No value could be chosen".to_string());
        }
        if confidence < self.confidence_threshold {
            reasons.push(format!(
                "Confidence {confidence:.2} below threshold {:.2}",
                self.confidence_threshold
            ));
        }
        if !evidence.meets_threshold(self.min_evidence_weight, self.min_sources) {
            reasons.push(format!(
                "Insufficient evidence: weight {:.2} from {} source(s) (need {:.2} from {})",
                evidence.weighted_score,
                evidence.source_count,
                self.min_evidence_weight,
                self.min_sources
            ));
        }
        reasons
    }

    /// True when the resolution clears every floor.
    #[must_use]
    pub fn admits(&self, chosen: Option<f64>, confidence: f64, evidence: &EvidenceScore) -> bool {
        self.failures(chosen, confidence, evidence).is_empty()
    }
}

/// Accumulates contributions and conditional facts for one field.
#[derive(Debug, Default)]
pub struct EvidenceLedger {
    contributions: Vec<SourceContribution>,
    conditional: Vec<ConditionalFact>,
}

impl EvidenceLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one accepted candidate.
    pub fn record(
        &mut self,
        name: impl Into<String>,
        value: f64,
        trust: SourceTrust,
        confidence: f64,
    ) {
        self.contributions.push(SourceContribution {
            name: name.into(),
            value,
            trust,
            confidence,
        });
    }

    /// Record a variant-dependent fact.
    pub fn add_conditional(&mut self, fact: ConditionalFact) {
        self.conditional.push(fact);
    }

    /// Current evidence score.
    #[must_use]
    pub fn score(&self) -> EvidenceScore {
        let weighted_score = self.contributions.iter().map(SourceContribution::weight).sum();
        let distinct: HashSet<&str> = self.contributions.iter().map(|c| c.name.as_str()).collect();
        let highest_trust = self
            .contributions
            .iter()
            .map(|c| c.trust)
            .max()
            .unwrap_or_default();
        EvidenceScore {
            weighted_score,
            source_count: distinct.len(),
            highest_trust,
            sources: self.contributions.clone(),
        }
    }

    /// Consume the ledger into its evidence score and conditional facts.
    #[must_use]
    pub fn finish(self) -> (EvidenceScore, Vec<ConditionalFact>) {
        let score = self.score();
        (score, self.conditional)
    }
}
