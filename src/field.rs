//! Per-attribute resolution results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::evidence::{ConditionalFact, EvidenceScore, ValueRange};
use crate::vehicle::FieldName;

/// Outcome status of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    /// Resolved with enough confidence and evidence to be written.
    Ok,
    /// Data exists but conflicts or falls short of a threshold.
    NeedsReview,
    /// No usable data at all.
    InsufficientData,
}

impl FieldStatus {
    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NeedsReview => "needs_review",
            Self::InsufficientData => "insufficient_data",
        }
    }
}

impl fmt::Display for FieldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution of one attribute.
///
/// Created fresh per resolution attempt and never edited afterwards; a
/// later attempt supersedes it with a newer `resolved_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldResolution {
    /// Attribute resolved.
    pub field_name: FieldName,
    /// Outcome range and chosen value.
    pub value_range: ValueRange,
    /// Variant-dependent facts, never merged into `chosen`.
    #[serde(default)]
    pub conditional_values: Vec<ConditionalFact>,
    /// Weighted evidence behind the value.
    pub evidence: EvidenceScore,
    /// Rule confidence in [0, 1].
    pub confidence: f64,
    /// Resolution status.
    pub status: FieldStatus,
    /// Name of the rule that produced this resolution.
    pub decision_rule_applied: String,
    /// Human-readable warnings.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Blake3 digest of the candidates the rule was given.
    pub candidate_digest: String,
    /// When the rule ran.
    pub resolved_at: DateTime<Utc>,
}

impl FieldResolution {
    /// Returns true when the status is `ok`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == FieldStatus::Ok
    }

    /// Chosen unconditional value, if any.
    #[must_use]
    pub fn chosen(&self) -> Option<f64> {
        self.value_range.chosen
    }
}
