//! Per-vehicle resolution report.
//!
//! A report holds one slot per attribute. Its outcome, overall confidence
//! and field lists are derived from the slots and recomputed every time a
//! resolution is added, so recomputing is idempotent.

#![allow(clippy::cast_precision_loss)]

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::field::{FieldResolution, FieldStatus};
use crate::vehicle::{FieldName, VehicleKey};

/// Overall outcome of a vehicle resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// All four attributes resolved `ok`.
    Complete,
    /// At least one attribute resolved `ok`.
    Partial,
    /// Nothing resolved `ok`.
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// How the attribute values in a report were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Attribute-specific decision rules.
    DecisionRules,
    /// Values served from the provenance store.
    Cached,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::DecisionRules
    }
}

/// Consolidated resolution of all attributes of one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    /// Normalized `year|make|model` key.
    pub vehicle_key: String,
    /// Model year.
    pub year: u16,
    /// Make as given.
    pub make: String,
    /// Model as given.
    pub model: String,
    /// How the values were obtained.
    pub strategy: Strategy,
    /// Derived overall outcome.
    pub outcome: Outcome,
    /// Curb weight resolution.
    pub curb_weight: Option<FieldResolution>,
    /// Aluminum engine resolution.
    pub aluminum_engine: Option<FieldResolution>,
    /// Aluminum rims resolution.
    pub aluminum_rims: Option<FieldResolution>,
    /// Catalytic converter count resolution.
    pub catalytic_converters: Option<FieldResolution>,
    /// Mean confidence over present resolutions.
    pub overall_confidence: f64,
    /// Fields with status `ok`.
    pub fields_resolved: Vec<FieldName>,
    /// Fields with status `needs_review`.
    pub fields_needing_review: Vec<FieldName>,
    /// Fields with status `insufficient_data`.
    pub fields_failed: Vec<FieldName>,
    /// True unless the outcome is complete.
    pub action_needed: bool,
    /// When the report was started.
    pub created_at: DateTime<Utc>,
}

impl ResolutionReport {
    /// Creates an empty report for a vehicle.
    #[must_use]
    pub fn new(vehicle: &VehicleKey, strategy: Strategy) -> Self {
        Self {
            vehicle_key: vehicle.key(),
            year: vehicle.year(),
            make: vehicle.make().to_string(),
            model: vehicle.model().to_string(),
            strategy,
            outcome: Outcome::Failed,
            curb_weight: None,
            aluminum_engine: None,
            aluminum_rims: None,
            catalytic_converters: None,
            overall_confidence: 0.0,
            fields_resolved: Vec::new(),
            fields_needing_review: Vec::new(),
            fields_failed: Vec::new(),
            action_needed: true,
            created_at: Utc::now(),
        }
    }

    fn slot_mut(&mut self, field: FieldName) -> &mut Option<FieldResolution> {
        match field {
            FieldName::CurbWeight => &mut self.curb_weight,
            FieldName::AluminumEngine => &mut self.aluminum_engine,
            FieldName::AluminumRims => &mut self.aluminum_rims,
            FieldName::CatalyticConverters => &mut self.catalytic_converters,
        }
    }

    /// Resolution stored for `field`, if any.
    #[must_use]
    pub fn field(&self, field: FieldName) -> Option<&FieldResolution> {
        match field {
            FieldName::CurbWeight => self.curb_weight.as_ref(),
            FieldName::AluminumEngine => self.aluminum_engine.as_ref(),
            FieldName::AluminumRims => self.aluminum_rims.as_ref(),
            FieldName::CatalyticConverters => self.catalytic_converters.as_ref(),
        }
    }

    /// Present resolutions in report order.
    pub fn resolutions(&self) -> impl Iterator<Item = &FieldResolution> {
        FieldName::ALL.into_iter().filter_map(|f| self.field(f))
    }

    /// Route a resolution into its slot, replacing any earlier one for the
    /// same field, and recompute the derived status.
    pub fn add_field_resolution(&mut self, resolution: FieldResolution) {
        let field = resolution.field_name;
        *self.slot_mut(field) = Some(resolution);
        self.calculate_overall_status();
    }

    /// Recompute outcome, overall confidence and field lists from the slots.
    pub fn calculate_overall_status(&mut self) {
        let mut resolved = Vec::new();
        let mut review = Vec::new();
        let mut failed = Vec::new();
        let mut confidence_sum = 0.0;
        let mut present = 0usize;

        for field in FieldName::ALL {
            let Some(r) = self.field(field) else {
                continue;
            };
            present += 1;
            confidence_sum += r.confidence;
            match r.status {
                FieldStatus::Ok => resolved.push(field),
                FieldStatus::NeedsReview => review.push(field),
                FieldStatus::InsufficientData => failed.push(field),
            }
        }

        self.overall_confidence = if present == 0 {
            0.0
        } else {
            confidence_sum / present as f64
        };
        self.outcome = if present == FieldName::ALL.len() && resolved.len() == present {
            Outcome::Complete
        } else if !resolved.is_empty() {
            Outcome::Partial
        } else {
            Outcome::Failed
        };
        self.action_needed = self.outcome != Outcome::Complete;
        self.fields_resolved = resolved;
        self.fields_needing_review = review;
        self.fields_failed = failed;
    }

    /// Log a one-line summary.
    pub fn log_summary(&self) {
        info!(
            vehicle = %self.vehicle_key,
            outcome = %self.outcome,
            overall_confidence = self.overall_confidence,
            resolved = self.fields_resolved.len(),
            needs_review = self.fields_needing_review.len(),
            failed = self.fields_failed.len(),
            "Resolution report complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::evidence::{EvidenceScore, ValueRange};

    fn resolution(field: FieldName, status: FieldStatus, confidence: f64) -> FieldResolution {
        FieldResolution {
            field_name: field,
            value_range: ValueRange {
                chosen: (status == FieldStatus::Ok).then_some(1.0),
                ..ValueRange::unknown()
            },
            conditional_values: Vec::new(),
            evidence: EvidenceScore::empty(),
            confidence,
            status,
            decision_rule_applied: "test".to_string(),
            warnings: Vec::new(),
            candidate_digest: String::new(),
            resolved_at: Utc::now(),
        }
    }

    fn vehicle() -> VehicleKey {
        VehicleKey::new(2020, "Honda", "Accord").unwrap()
    }

    #[test]
    fn empty_report_failed() {
        let mut report = ResolutionReport::new(&vehicle(), Strategy::DecisionRules);
        report.calculate_overall_status();
        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.overall_confidence, 0.0);
        assert!(report.action_needed);
        assert_eq!(report.vehicle_key, "2020|honda|accord");
    }

    #[test]
    fn all_ok_is_complete() {
        let mut report = ResolutionReport::new(&vehicle(), Strategy::DecisionRules);
        for field in FieldName::ALL {
            report.add_field_resolution(resolution(field, FieldStatus::Ok, 0.9));
        }
        report.calculate_overall_status();
        assert_eq!(report.outcome, Outcome::Complete);
        assert!(!report.action_needed);
        assert_eq!(report.fields_resolved.len(), 4);
        assert!((report.overall_confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn three_ok_of_three_present_is_partial() {
        let mut report = ResolutionReport::new(&vehicle(), Strategy::DecisionRules);
        for field in &FieldName::ALL[..3] {
            report.add_field_resolution(resolution(*field, FieldStatus::Ok, 0.9));
        }
        assert_eq!(report.outcome, Outcome::Partial);
        assert!(report.action_needed);
    }

    #[test]
    fn mixed_statuses() {
        let mut report = ResolutionReport::new(&vehicle(), Strategy::DecisionRules);
        report.add_field_resolution(resolution(FieldName::CurbWeight, FieldStatus::Ok, 0.95));
        report.add_field_resolution(resolution(FieldName::AluminumEngine, FieldStatus::Ok, 0.85));
        report.add_field_resolution(resolution(
            FieldName::AluminumRims,
            FieldStatus::NeedsReview,
            0.5,
        ));
        report.add_field_resolution(resolution(
            FieldName::CatalyticConverters,
            FieldStatus::InsufficientData,
            0.0,
        ));
        assert_eq!(report.outcome, Outcome::Partial);
        assert_eq!(report.fields_needing_review, vec![FieldName::AluminumRims]);
        assert_eq!(report.fields_failed, vec![FieldName::CatalyticConverters]);
        assert!((report.overall_confidence - 0.575).abs() < 1e-9);
    }

    #[test]
    fn re_adding_a_field_replaces_it() {
        let mut report = ResolutionReport::new(&vehicle(), Strategy::DecisionRules);
        report.add_field_resolution(resolution(
            FieldName::CurbWeight,
            FieldStatus::NeedsReview,
            0.3,
        ));
        report.add_field_resolution(resolution(FieldName::CurbWeight, FieldStatus::Ok, 0.95));
        assert_eq!(report.fields_resolved, vec![FieldName::CurbWeight]);
        assert!(report.fields_needing_review.is_empty());
        assert_eq!(report.resolutions().count(), 1);
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut report = ResolutionReport::new(&vehicle(), Strategy::DecisionRules);
        report.add_field_resolution(resolution(FieldName::CurbWeight, FieldStatus::Ok, 0.95));
        let before = report.clone();
        report.calculate_overall_status();
        report.calculate_overall_status();
        assert_eq!(report, before);
    }
}
