//! Resolution engine façade.
//!
//! [`ResolutionEngine`] is built explicitly from its collaborators and
//! passed to callers; there is no process-wide instance. It is cheap to
//! clone and safe to share across threads.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::candidate::SearchCandidate;
use crate::config::ResolverConfig;
use crate::consensus::{ConsensusResolver, ResolutionResult};
use crate::error::{ResolveError, ResolveResult, ValidationError};
use crate::field::FieldStatus;
use crate::report::{ResolutionReport, Strategy};
use crate::rules::DecisionRuleSet;
use crate::storage::{ProvenanceRecord, ProvenanceStore};
use crate::vehicle::{FieldName, VehicleKey};

/// Observations of one vehicle, grouped by attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleObservations {
    /// Model year.
    pub year: u16,
    /// Make.
    pub make: String,
    /// Model.
    pub model: String,
    /// Curb weight observations.
    #[serde(default)]
    pub curb_weight: Vec<SearchCandidate>,
    /// Engine material observations.
    #[serde(default)]
    pub aluminum_engine: Vec<SearchCandidate>,
    /// Rim material observations.
    #[serde(default)]
    pub aluminum_rims: Vec<SearchCandidate>,
    /// Catalytic converter count observations.
    #[serde(default)]
    pub catalytic_converters: Vec<SearchCandidate>,
}

impl VehicleObservations {
    /// Empty observation set for a vehicle.
    #[must_use]
    pub fn new(vehicle: &VehicleKey) -> Self {
        Self {
            year: vehicle.year(),
            make: vehicle.make().to_string(),
            model: vehicle.model().to_string(),
            curb_weight: Vec::new(),
            aluminum_engine: Vec::new(),
            aluminum_rims: Vec::new(),
            catalytic_converters: Vec::new(),
        }
    }

    /// Validated vehicle identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the year is out of range or make/model is blank.
    pub fn vehicle(&self) -> Result<VehicleKey, ValidationError> {
        VehicleKey::new(self.year, &self.make, &self.model)
    }

    /// Candidates for one attribute.
    #[must_use]
    pub fn candidates(&self, field: FieldName) -> &[SearchCandidate] {
        match field {
            FieldName::CurbWeight => &self.curb_weight,
            FieldName::AluminumEngine => &self.aluminum_engine,
            FieldName::AluminumRims => &self.aluminum_rims,
            FieldName::CatalyticConverters => &self.catalytic_converters,
        }
    }

    /// Append a candidate for one attribute.
    #[must_use]
    pub fn with(mut self, field: FieldName, candidate: SearchCandidate) -> Self {
        match field {
            FieldName::CurbWeight => self.curb_weight.push(candidate),
            FieldName::AluminumEngine => self.aluminum_engine.push(candidate),
            FieldName::AluminumRims => self.aluminum_rims.push(candidate),
            FieldName::CatalyticConverters => self.catalytic_converters.push(candidate),
        }
        self
    }

    /// Parse observations from JSON.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Parse` on malformed JSON.
    pub fn from_json_str(json: &str) -> ResolveResult<Self> {
        serde_json::from_str(json).map_err(|source| ResolveError::Parse {
            what: "vehicle observations".to_string(),
            source,
        })
    }

    /// Read observations from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Io` if the file cannot be read and
    /// `ResolveError::Parse` on malformed JSON.
    pub fn from_path(path: impl AsRef<Path>) -> ResolveResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ResolveError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}

/// Runs decision rules and consensus resolution against a provenance store.
#[derive(Debug, Clone)]
pub struct ResolutionEngine {
    rules: Arc<DecisionRuleSet>,
    consensus: Arc<ConsensusResolver>,
    store: Arc<ProvenanceStore>,
}

impl Default for ResolutionEngine {
    fn default() -> Self {
        Self::new(
            Arc::new(DecisionRuleSet::default()),
            Arc::new(ConsensusResolver::default()),
            Arc::new(ProvenanceStore::in_memory()),
        )
    }
}

impl ResolutionEngine {
    /// Create an engine from its collaborators.
    #[must_use]
    pub fn new(
        rules: Arc<DecisionRuleSet>,
        consensus: Arc<ConsensusResolver>,
        store: Arc<ProvenanceStore>,
    ) -> Self {
        Self {
            rules,
            consensus,
            store,
        }
    }

    /// Create an engine whose rules and consensus share one configuration.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ConfigOutOfRange` if any knob is out of
    /// range.
    pub fn from_config(
        config: ResolverConfig,
        store: Arc<ProvenanceStore>,
    ) -> Result<Self, ValidationError> {
        let config = config.validate()?;
        Ok(Self::new(
            Arc::new(DecisionRuleSet::new(config.clone())),
            Arc::new(ConsensusResolver::new(config)),
            store,
        ))
    }

    /// Decision rules in use.
    #[must_use]
    pub fn rules(&self) -> &DecisionRuleSet {
        &self.rules
    }

    /// Consensus resolver in use.
    #[must_use]
    pub fn consensus(&self) -> &ConsensusResolver {
        &self.consensus
    }

    /// Provenance store in use.
    #[must_use]
    pub fn store(&self) -> &ProvenanceStore {
        &self.store
    }

    /// Resolve all four attributes of a vehicle.
    ///
    /// Only resolutions passing `should_write_to_database` are persisted. A
    /// failed write is logged and does not change the report.
    #[must_use]
    pub fn resolve_vehicle(
        &self,
        vehicle: &VehicleKey,
        observations: &VehicleObservations,
    ) -> ResolutionReport {
        let key = vehicle.key();
        let mut report = ResolutionReport::new(vehicle, Strategy::DecisionRules);

        for field in FieldName::ALL {
            let resolution = self.rules.resolve_field(field, observations.candidates(field));
            if self.rules.should_write_to_database(&resolution) {
                let record = ProvenanceRecord::from_field_resolution(&key, &resolution);
                if let Err(e) = self.store.put_record(record) {
                    warn!(
                        vehicle = %key,
                        field = %field,
                        error = %e,
                        "Failed to persist resolution"
                    );
                }
            } else {
                debug!(
                    vehicle = %key,
                    field = %field,
                    status = %resolution.status,
                    "Resolution not written"
                );
            }
            report.add_field_resolution(resolution);
        }

        report.log_summary();
        report
    }

    /// Validate the vehicle named in `observations` and resolve it.
    ///
    /// # Errors
    ///
    /// Returns an error if the vehicle identity is invalid.
    pub fn resolve_observations(
        &self,
        observations: &VehicleObservations,
    ) -> Result<ResolutionReport, ValidationError> {
        let vehicle = observations.vehicle()?;
        Ok(self.resolve_vehicle(&vehicle, observations))
    }

    /// Report built from stored provenance alone.
    ///
    /// Stored fields are re-checked against the current write gate; an `ok`
    /// row that no longer clears it is reported as `needs_review`. Returns
    /// `None` when nothing is stored for the vehicle.
    #[must_use]
    pub fn cached_report(&self, vehicle: &VehicleKey) -> Option<ResolutionReport> {
        let key = vehicle.key();
        let mut report = ResolutionReport::new(vehicle, Strategy::Cached);
        let mut found = false;
        for field in FieldName::ALL {
            let Some(record) = self.store.get_record(&key, field) else {
                continue;
            };
            let mut resolution = record.to_field_resolution();
            if resolution.status == FieldStatus::Ok
                && !self.rules.should_write_to_database(&resolution)
            {
                warn!(vehicle = %key, field = %field, "Stored value fails the write gate");
                resolution.status = FieldStatus::NeedsReview;
                resolution
                    .warnings
                    .push("Stored value does not clear the current write gate".to_string());
            }
            report.add_field_resolution(resolution);
            found = true;
        }
        found.then_some(report)
    }

    /// Numeric consensus for one attribute, served from the store when
    /// possible.
    ///
    /// A fresh result is stored only when it clears the field's write gate:
    /// a value, a confidence at or above the threshold, and enough evidence.
    /// A result served from the store carries the method it was stored
    /// with, which names the attribute rule for rule-written rows.
    #[must_use]
    pub fn resolve_consensus(
        &self,
        vehicle: &VehicleKey,
        field: FieldName,
        candidates: &[SearchCandidate],
    ) -> ResolutionResult {
        let key = vehicle.key();
        if let Some(cached) = self.store.get(&key, field) {
            debug!(vehicle = %key, field = %field, "Serving consensus from provenance");
            return cached;
        }

        let result = self.consensus.resolve(candidates);
        let gate = self.consensus.config().write_gate(field);
        let record = ProvenanceRecord::from_resolution_result(&key, field, &result, gate);
        if record.status == FieldStatus::Ok {
            if let Err(e) = self.store.put_record(record) {
                warn!(vehicle = %key, field = %field, error = %e, "Failed to persist consensus");
            }
        } else {
            debug!(
                vehicle = %key,
                field = %field,
                status = %record.status,
                "Consensus not written"
            );
        }
        info!(
            vehicle = %key,
            field = %field,
            method = result.method.as_str(),
            value = result.final_value,
            confidence = result.confidence_score,
            "Consensus resolved"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::ResolutionMethod;
    use crate::report::Outcome;
    use crate::rules::RULE_BOOLEAN_OEM_PREFERRED;

    fn camry() -> VehicleKey {
        VehicleKey::new(2019, "Toyota", "Camry").unwrap()
    }

    fn c(value: impl Into<crate::candidate::CandidateValue>, source: &str) -> SearchCandidate {
        SearchCandidate::new(value, source, 0.9).unwrap()
    }

    #[test]
    fn persists_only_writable_fields() {
        let engine = ResolutionEngine::default();
        let obs = VehicleObservations::new(&camry())
            .with(FieldName::CurbWeight, c(3310.0, "Toyota official specifications"))
            .with(FieldName::CurbWeight, c(3340.0, "edmunds"))
            .with(FieldName::AluminumEngine, c("aluminum", "forum"));

        let report = engine.resolve_vehicle(&camry(), &obs);
        assert_eq!(report.outcome, Outcome::Partial);
        assert_eq!(engine.store().backend().row_count().unwrap(), 1);
        assert!(engine
            .store()
            .get_record(&camry().key(), FieldName::CurbWeight)
            .is_some());
    }

    #[test]
    fn cached_report_mirrors_stored_fields() {
        let engine = ResolutionEngine::default();
        assert!(engine.cached_report(&camry()).is_none());

        let obs = VehicleObservations::new(&camry())
            .with(FieldName::CurbWeight, c(3310.0, "Toyota official specifications"))
            .with(FieldName::CurbWeight, c(3340.0, "edmunds"));
        let fresh = engine.resolve_vehicle(&camry(), &obs);

        let cached = engine.cached_report(&camry()).unwrap();
        assert_eq!(cached.strategy, Strategy::Cached);
        assert_eq!(cached.fields_resolved, vec![FieldName::CurbWeight]);
        assert_eq!(cached.curb_weight, fresh.curb_weight);
    }

    #[test]
    fn consensus_is_cached_when_confident() {
        let engine = ResolutionEngine::default();
        let first = engine.resolve_consensus(
            &camry(),
            FieldName::CurbWeight,
            &[c(3500.0, "kbb"), c(3500.0, "edmunds"), c(3500.0, "toyota.com")],
        );
        assert!(first.confidence_score >= 0.7);

        let second = engine.resolve_consensus(&camry(), FieldName::CurbWeight, &[c(9999.0, "x")]);
        assert_eq!(second.final_value, first.final_value);
    }

    #[test]
    fn consensus_on_weak_evidence_is_not_cached() {
        let engine = ResolutionEngine::default();
        let weak = [c(3300.0, "someblogpage.example"), c(3300.0, "another.example")];
        let first = engine.resolve_consensus(&camry(), FieldName::CurbWeight, &weak);
        assert!(first.confidence_score >= 0.7);

        assert_eq!(engine.store().backend().row_count().unwrap(), 0);
        assert!(engine.cached_report(&camry()).is_none());
    }

    #[test]
    fn cached_report_regates_stored_rows() {
        let engine = ResolutionEngine::default();
        let result = engine
            .consensus()
            .resolve(&[c(3300.0, "someblogpage.example"), c(3300.0, "another.example")]);
        let mut record = ProvenanceRecord::from_resolution_result(
            &camry().key(),
            FieldName::CurbWeight,
            &result,
            engine.rules().config().write_gate(FieldName::CurbWeight),
        );
        record.status = FieldStatus::Ok;
        engine.store().put_record(record).unwrap();

        let cached = engine.cached_report(&camry()).unwrap();
        let weight = cached.curb_weight.unwrap();
        assert_eq!(weight.status, FieldStatus::NeedsReview);
        assert_eq!(cached.fields_needing_review, vec![FieldName::CurbWeight]);
    }

    #[test]
    fn rule_rows_are_served_with_their_rule() {
        let engine = ResolutionEngine::default();
        let obs = VehicleObservations::new(&camry())
            .with(FieldName::AluminumEngine, c("aluminum", "Toyota official specifications"))
            .with(FieldName::AluminumEngine, c("aluminum", "edmunds.com"));
        let _report = engine.resolve_vehicle(&camry(), &obs);

        let served = engine.resolve_consensus(&camry(), FieldName::AluminumEngine, &[]);
        assert_eq!(
            served.method,
            ResolutionMethod::DecisionRule(RULE_BOOLEAN_OEM_PREFERRED.to_string())
        );
        assert_eq!(served.final_value, 1.0);
    }

    #[test]
    fn out_of_range_config_is_rejected() {
        let config = ResolverConfig {
            confidence_threshold: f64::NAN,
            ..ResolverConfig::default()
        };
        let err = ResolutionEngine::from_config(config, Arc::new(ProvenanceStore::in_memory()))
            .unwrap_err();
        assert!(matches!(err, ValidationError::ConfigOutOfRange { .. }));
    }

    #[test]
    fn empty_consensus_is_not_cached() {
        let engine = ResolutionEngine::default();
        let r = engine.resolve_consensus(&camry(), FieldName::CurbWeight, &[]);
        assert_eq!(r.method, ResolutionMethod::NoCandidates);
        assert_eq!(engine.store().backend().row_count().unwrap(), 0);
    }

    #[test]
    fn observations_parse_from_json() {
        let obs = VehicleObservations::from_json_str(
            r#"{
                "year": 2019, "make": "Toyota", "model": "Camry",
                "curb_weight": [{"value": 3310, "source": "toyota.com", "confidence": 0.9}],
                "aluminum_rims": [{"value": "alloy", "source": "edmunds", "confidence": 0.8, "trim": "XSE"}]
            }"#,
        )
        .unwrap();
        assert_eq!(obs.curb_weight.len(), 1);
        assert_eq!(obs.aluminum_rims[0].trim.as_deref(), Some("XSE"));
        assert!(obs.catalytic_converters.is_empty());

        let report = ResolutionEngine::default().resolve_observations(&obs).unwrap();
        assert_eq!(report.vehicle_key, "2019|toyota|camry");
        let rims = report.aluminum_rims.unwrap();
        assert_ne!(rims.status, FieldStatus::InsufficientData);
    }

    #[test]
    fn invalid_vehicle_is_rejected() {
        let json = r#"{"year": 2019, "make": " ", "model": "Camry"}"#;
        let obs = VehicleObservations::from_json_str(json).unwrap();
        assert!(ResolutionEngine::default().resolve_observations(&obs).is_err());
    }
}
