//! Abstract provenance storage.
//!
//! A backend holds at most one row per `(vehicle_key, field_name)`. Writes
//! are upserts; reads return the newest row regardless of its age.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::candidate::{candidate_digest, CandidateValue, SearchCandidate};
use crate::consensus::{ResolutionMethod, ResolutionResult};
use crate::evidence::{
    ConditionalFact, EstimateType, EvidenceLedger, SourceContribution, ValueRange, WriteGate,
};
use crate::field::{FieldResolution, FieldStatus};
use crate::stats;
use crate::trust;
use crate::vehicle::FieldName;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Connection failed.
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

/// Namespace for record ids; ids are stable per `(vehicle_key, field)`.
const RECORD_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b7e_94d3_4c0a_8e55_0b7d_31a9_c2e4);

/// Identifier of a provenance row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Deterministic id for a vehicle/field pair.
    #[must_use]
    pub fn for_field(vehicle_key: &str, field: FieldName) -> Self {
        let name = format!("{vehicle_key}|{field}");
        Self(Uuid::new_v5(&RECORD_NAMESPACE, name.as_bytes()))
    }

    /// Underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One persisted resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Stable id for the vehicle/field pair.
    pub id: RecordId,
    /// Normalized vehicle key.
    pub vehicle_key: String,
    /// Attribute.
    pub field_name: FieldName,
    /// Chosen value, if any.
    pub final_value: Option<f64>,
    /// Lower end of the observed range.
    pub low: Option<f64>,
    /// Upper end of the observed range.
    pub high: Option<f64>,
    /// How the value was estimated.
    pub estimate_type: EstimateType,
    /// True when the exact value depends on an unresolved variant.
    #[serde(default)]
    pub variant_needed_for_exact: bool,
    /// Confidence in [0, 1].
    pub confidence_score: f64,
    /// Sum of `trust × confidence` over sources.
    pub evidence_weight: f64,
    /// Contributing sources.
    #[serde(default)]
    pub evidence_sources: Vec<SourceContribution>,
    /// Rule or consensus method name.
    pub decision_rule: String,
    /// Resolution status.
    pub status: FieldStatus,
    /// Variant-dependent facts.
    #[serde(default)]
    pub conditional_facts: Vec<ConditionalFact>,
    /// Warnings raised during resolution.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Digest of the input candidates.
    #[serde(default)]
    pub candidate_digest: String,
    /// Creation time; never used for expiry.
    pub created_at: DateTime<Utc>,
}

impl ProvenanceRecord {
    /// Record for an attribute resolved by a decision rule.
    #[must_use]
    pub fn from_field_resolution(vehicle_key: &str, resolution: &FieldResolution) -> Self {
        let range = &resolution.value_range;
        Self {
            id: RecordId::for_field(vehicle_key, resolution.field_name),
            vehicle_key: vehicle_key.to_string(),
            field_name: resolution.field_name,
            final_value: range.chosen,
            low: range.low,
            high: range.high,
            estimate_type: range.estimate_type,
            variant_needed_for_exact: range.variant_needed_for_exact,
            confidence_score: resolution.confidence,
            evidence_weight: resolution.evidence.weighted_score,
            evidence_sources: resolution.evidence.sources.clone(),
            decision_rule: resolution.decision_rule_applied.clone(),
            status: resolution.status,
            conditional_facts: resolution.conditional_values.clone(),
            warnings: resolution.warnings.clone(),
            candidate_digest: resolution.candidate_digest.clone(),
            created_at: resolution.resolved_at,
        }
    }

    /// Record for a consensus result.
    ///
    /// The status is `ok` only when the result clears every floor of
    /// `gate`, evidence included. A result that fails the gate is stored as
    /// `needs_review` with the reasons added to its warnings.
    #[must_use]
    pub fn from_resolution_result(
        vehicle_key: &str,
        field: FieldName,
        result: &ResolutionResult,
        gate: WriteGate,
    ) -> Self {
        let mut ledger = EvidenceLedger::new();
        for c in &result.candidates {
            if let Some(value) = c.value.as_number() {
                ledger.record(c.source.clone(), value, trust::classify(&c.source), c.confidence);
            }
        }
        let (evidence, _) = ledger.finish();
        let values: Vec<f64> = evidence.sources.iter().map(|s| s.value).collect();
        let (low, high) = stats::min_max(&values).unzip();

        let has_value = result.method != ResolutionMethod::NoCandidates;
        let final_value = has_value.then_some(result.final_value);
        let mut warnings = result.warnings.clone();
        let status = if has_value {
            let failures = gate.failures(final_value, result.confidence_score, &evidence);
            if failures.is_empty() {
                FieldStatus::Ok
            } else {
                warnings.extend(failures);
                FieldStatus::NeedsReview
            }
        } else {
            FieldStatus::InsufficientData
        };

        Self {
            id: RecordId::for_field(vehicle_key, field),
            vehicle_key: vehicle_key.to_string(),
            field_name: field,
            final_value,
            low,
            high,
            estimate_type: if has_value {
                EstimateType::Median
            } else {
                EstimateType::Unknown
            },
            variant_needed_for_exact: false,
            confidence_score: result.confidence_score,
            evidence_weight: evidence.weighted_score,
            evidence_sources: evidence.sources,
            decision_rule: result.method.as_str().to_string(),
            status,
            conditional_facts: Vec::new(),
            warnings,
            candidate_digest: candidate_digest(&result.candidates),
            created_at: Utc::now(),
        }
    }

    /// View the record as a consensus result.
    ///
    /// Records written by an attribute rule report that rule as their
    /// method. Outlier flags are not persisted and come back all false.
    #[must_use]
    pub fn to_resolution_result(&self) -> ResolutionResult {
        let candidates: Vec<SearchCandidate> = self
            .evidence_sources
            .iter()
            .map(|s| SearchCandidate {
                value: CandidateValue::Number(s.value),
                source: s.name.clone(),
                confidence: s.confidence,
                citation: None,
                trim: None,
                engine: None,
            })
            .collect();
        ResolutionResult {
            final_value: self.final_value.unwrap_or(0.0),
            confidence_score: self.confidence_score,
            method: ResolutionMethod::from_name(&self.decision_rule),
            outliers: vec![false; candidates.len()],
            candidates,
            warnings: self.warnings.clone(),
        }
    }

    /// View the record as an attribute resolution.
    ///
    /// The evidence score is rebuilt from the stored contributions.
    #[must_use]
    pub fn to_field_resolution(&self) -> FieldResolution {
        let mut ledger = EvidenceLedger::new();
        for s in &self.evidence_sources {
            ledger.record(s.name.clone(), s.value, s.trust, s.confidence);
        }
        FieldResolution {
            field_name: self.field_name,
            value_range: ValueRange {
                low: self.low,
                high: self.high,
                chosen: self.final_value,
                estimate_type: self.estimate_type,
                variant_needed_for_exact: self.variant_needed_for_exact,
            },
            conditional_values: self.conditional_facts.clone(),
            evidence: ledger.score(),
            confidence: self.confidence_score,
            status: self.status,
            decision_rule_applied: self.decision_rule.clone(),
            warnings: self.warnings.clone(),
            candidate_digest: self.candidate_digest.clone(),
            resolved_at: self.created_at,
        }
    }
}

/// Storage backend for provenance rows.
///
/// Implementations must keep one row per `(vehicle_key, field_name)` and
/// must never expire rows on their own.
pub trait ProvenanceBackend: Send + Sync {
    /// Newest row for a vehicle/field, if any.
    fn get_latest(
        &self,
        vehicle_key: &str,
        field: FieldName,
    ) -> Result<Option<ProvenanceRecord>, StorageError>;

    /// Insert or replace the row for the record's vehicle/field.
    fn upsert(&self, record: &ProvenanceRecord) -> Result<RecordId, StorageError>;

    /// Number of stored rows.
    fn row_count(&self) -> Result<usize, StorageError>;
}
