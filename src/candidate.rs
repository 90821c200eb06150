//! Candidate observations.
//!
//! A candidate is one external observation of an attribute: a value, the
//! source it came from, the source's self-reported confidence, and an
//! optional citation. The engine has no opinion on how candidates were
//! produced.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Raw observed value.
///
/// Deserializes untagged so JSON `true`, `3450` and `"aluminum"` all map
/// directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandidateValue {
    /// Boolean observation.
    Bool(bool),
    /// Numeric observation.
    Number(f64),
    /// Textual observation; coerced through a fixed keyword table only.
    Text(String),
}

const TRUE_KEYWORDS: &[&str] = &["true", "yes", "aluminum", "aluminium", "alloy"];
const FALSE_KEYWORDS: &[&str] = &["false", "no", "iron", "cast iron", "steel"];

impl CandidateValue {
    /// Numeric reading of the value, if it has one.
    ///
    /// Text is accepted when it is a plain number (thousands separators
    /// allowed). Booleans have no numeric reading.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Text(s) => s
                .trim()
                .replace(',', "")
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Boolean reading of the value, if it has one.
    #[must_use]
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Number(n) if *n == 1.0 => Some(true),
            Self::Number(n) if *n == 0.0 => Some(false),
            Self::Number(_) => None,
            Self::Text(s) => {
                let key = s.trim().to_lowercase();
                if TRUE_KEYWORDS.contains(&key.as_str()) {
                    Some(true)
                } else if FALSE_KEYWORDS.contains(&key.as_str()) {
                    Some(false)
                } else {
                    None
                }
            }
        }
    }

    /// Non-negative whole-number reading of the value, if it has one.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn as_count(&self) -> Option<u32> {
        let n = self.as_number()?;
        if n < 0.0 || n.fract() != 0.0 || n > f64::from(u32::MAX) {
            return None;
        }
        Some(n as u32)
    }
}

impl From<f64> for CandidateValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for CandidateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for CandidateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One observation of an attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    /// Observed value.
    pub value: CandidateValue,
    /// Source identifier (URL, site name, document title).
    pub source: String,
    /// Self-reported confidence in [0, 1].
    pub confidence: f64,
    /// Where in the source the value was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    /// Trim the observation applies to, when variant-specific.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<String>,
    /// Engine the observation applies to, when variant-specific.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
}

impl SearchCandidate {
    /// Creates a validated candidate.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ConfidenceOutOfRange` if `confidence` is
    /// NaN or outside [0, 1].
    pub fn new(
        value: impl Into<CandidateValue>,
        source: impl Into<String>,
        confidence: f64,
    ) -> Result<Self, ValidationError> {
        validate_confidence(confidence)?;
        Ok(Self {
            value: value.into(),
            source: source.into(),
            confidence,
            citation: None,
            trim: None,
            engine: None,
        })
    }

    /// Attach a citation.
    #[must_use]
    pub fn with_citation(mut self, citation: impl Into<String>) -> Self {
        self.citation = Some(citation.into());
        self
    }

    /// Tag the candidate with a trim.
    #[must_use]
    pub fn with_trim(mut self, trim: impl Into<String>) -> Self {
        self.trim = Some(trim.into());
        self
    }

    /// Tag the candidate with an engine.
    #[must_use]
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    /// Checks the confidence of a candidate that bypassed [`SearchCandidate::new`]
    /// (for example one deserialized from JSON).
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ConfidenceOutOfRange` when out of range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_confidence(self.confidence)
    }
}

fn validate_confidence(value: f64) -> Result<(), ValidationError> {
    if value.is_nan() || !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::ConfidenceOutOfRange { value });
    }
    Ok(())
}

/// Warning text recorded when a candidate is skipped.
pub(crate) fn skip_warning(candidate: &SearchCandidate, reason: &str) -> String {
    format!("Skipped candidate from '{}': {reason}", candidate.source)
}

/// Blake3 digest over the canonical JSON form of a candidate list.
///
/// Used as an audit fingerprint: the same inputs always yield the same
/// digest.
#[must_use]
pub fn candidate_digest(candidates: &[SearchCandidate]) -> String {
    let mut hasher = blake3::Hasher::new();
    for candidate in candidates {
        match serde_json::to_vec(candidate) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(format!("{candidate:?}").as_bytes()),
        };
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}
