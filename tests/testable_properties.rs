//! Behavioural properties of the resolution engine.
//!
//! Each test pins one externally observable guarantee: consensus on
//! identical values, outlier detection, weighted-median clustering, the
//! boolean and count rules, the provenance store's upsert and no-expiry
//! semantics, report aggregation, and the write gate.

use std::sync::Arc;

use chrono::{Duration, Utc};

use vehicle_resolver::cluster::{self, DEFAULT_Z_THRESHOLD};
use vehicle_resolver::{
    ConsensusResolver, DecisionRuleSet, FieldName, FieldStatus, InMemoryBackend, Outcome,
    ProvenanceBackend, ProvenanceRecord, ProvenanceStore, ResolutionReport, ResolverConfig,
    SearchCandidate, Strategy, VehicleKey, WriteGate,
};

const CAMRY: &str = "2019|toyota|camry";

fn gate() -> WriteGate {
    ResolverConfig::default().write_gate(FieldName::CurbWeight)
}

fn candidate(value: f64, source: &str, confidence: f64) -> SearchCandidate {
    SearchCandidate::new(value, source, confidence).unwrap()
}

#[test]
fn identical_values_resolve_to_common_value() {
    let resolver = ConsensusResolver::default();
    let sources = ["kbb.com", "edmunds.com", "cars.com", "forum", "toyota.com", "autotrader"];
    for n in 1..=sources.len() {
        let candidates: Vec<SearchCandidate> = sources[..n]
            .iter()
            .map(|s| candidate(3450.0, s, 0.9))
            .collect();
        let result = resolver.resolve(&candidates);
        assert_eq!(result.final_value, 3450.0, "n = {n}");
        assert!(result.confidence_score >= 0.7, "n = {n}: {}", result.confidence_score);
        assert!(!result.has_outliers());
    }
}

#[test]
fn single_far_value_is_an_outlier() {
    let flags = cluster::detect_outliers(&[100.0, 100.0, 100.0, 1000.0], DEFAULT_Z_THRESHOLD);
    assert_eq!(flags, vec![false, false, false, true]);
}

#[test]
fn fewer_than_three_values_have_no_outliers() {
    assert_eq!(cluster::detect_outliers(&[], 1.4), Vec::<bool>::new());
    assert_eq!(cluster::detect_outliers(&[1.0], 1.4), vec![false]);
    assert_eq!(cluster::detect_outliers(&[1.0, 1_000_000.0], 0.5), vec![false, false]);
}

#[test]
fn weighted_median_of_largest_cluster() {
    let result = ConsensusResolver::default().resolve(&[
        candidate(3500.0, "kbb", 0.9),
        candidate(3520.0, "edmunds", 0.9),
        candidate(3480.0, "autotrader", 0.7),
        candidate(4200.0, "forum", 0.4),
    ]);
    assert!((result.final_value - 3500.0).abs() <= 50.0);
    assert_eq!(result.outliers, vec![false, false, false, true]);
    assert!(result.warnings.iter().any(|w| w.contains("outlier")));
}

#[test]
fn unanimous_oem_aluminum_engine() {
    let rules = DecisionRuleSet::default();
    let r = rules.resolve_aluminum_engine(&[
        SearchCandidate::new("aluminum", "Toyota official specifications", 0.95).unwrap(),
        SearchCandidate::new(true, "manufacturer spec sheet", 0.9).unwrap(),
        SearchCandidate::new("aluminum", "edmunds.com", 0.9).unwrap(),
    ]);
    assert_eq!(r.status, FieldStatus::Ok);
    assert_eq!(r.value_range.chosen, Some(1.0));
    assert!(r.confidence >= 0.85);
}

#[test]
fn catalytic_converters_without_data_give_range_only() {
    let r = DecisionRuleSet::default().resolve_catalytic_converters(&[]);
    assert_eq!(r.status, FieldStatus::NeedsReview);
    assert_eq!(r.value_range.low, Some(1.0));
    assert_eq!(r.value_range.high, Some(2.0));
    assert_eq!(r.value_range.chosen, None);
}

#[test]
fn second_put_replaces_first() {
    let resolver = ConsensusResolver::default();
    let store = ProvenanceStore::in_memory();

    let first =
        resolver.resolve(&[candidate(3300.0, "kbb", 0.9), candidate(3300.0, "edmunds", 0.9)]);
    let second =
        resolver.resolve(&[candidate(3400.0, "kbb", 0.9), candidate(3400.0, "edmunds", 0.9)]);
    let id1 = store.put(CAMRY, FieldName::CurbWeight, &first, gate()).unwrap();
    let id2 = store.put(CAMRY, FieldName::CurbWeight, &second, gate()).unwrap();

    assert_eq!(id1, id2);
    assert_eq!(store.backend().row_count().unwrap(), 1);
    assert_eq!(store.get(CAMRY, FieldName::CurbWeight).unwrap().final_value, 3400.0);

    // same answer when the memory map is bypassed
    store.invalidate(CAMRY, None);
    assert_eq!(store.get(CAMRY, FieldName::CurbWeight).unwrap().final_value, 3400.0);
}

#[test]
fn two_year_old_record_is_still_served() {
    let backend = Arc::new(InMemoryBackend::new());
    let result = ConsensusResolver::default()
        .resolve(&[candidate(3300.0, "kbb", 0.9), candidate(3310.0, "edmunds", 0.9)]);
    let mut record =
        ProvenanceRecord::from_resolution_result(CAMRY, FieldName::CurbWeight, &result, gate());
    record.created_at = Utc::now() - Duration::days(2 * 365);
    backend.upsert(&record).unwrap();

    let store = ProvenanceStore::new(backend);
    let got = store.get(CAMRY, FieldName::CurbWeight).unwrap();
    assert_eq!(got.final_value, result.final_value);
}

#[test]
fn report_outcome_follows_field_statuses() {
    let rules = DecisionRuleSet::default();
    let camry = VehicleKey::new(2019, "Toyota", "Camry").unwrap();
    let ok_weight = rules.resolve_curb_weight(&[
        candidate(3310.0, "Toyota official specifications", 0.95),
        candidate(3340.0, "edmunds.com", 0.9),
    ]);
    let ok_engine = rules.resolve_aluminum_engine(&[
        SearchCandidate::new("aluminum", "Toyota official specifications", 0.95).unwrap(),
        SearchCandidate::new("aluminum", "edmunds.com", 0.9).unwrap(),
    ]);
    let ok_rims = rules.resolve_aluminum_rims(&[
        SearchCandidate::new("alloy", "Toyota official specifications", 0.95).unwrap(),
        SearchCandidate::new("alloy", "kbb.com", 0.9).unwrap(),
    ]);
    let ok_cats = rules.resolve_catalytic_converters(&[
        candidate(1.0, "Toyota official specifications", 0.9),
        candidate(1.0, "edmunds.com", 0.9),
    ]);
    for r in [&ok_weight, &ok_engine, &ok_rims, &ok_cats] {
        assert_eq!(r.status, FieldStatus::Ok, "{}", r.field_name);
    }

    let mut complete = ResolutionReport::new(&camry, Strategy::DecisionRules);
    for r in [&ok_weight, &ok_engine, &ok_rims, &ok_cats] {
        complete.add_field_resolution(r.clone());
    }
    complete.calculate_overall_status();
    assert_eq!(complete.outcome, Outcome::Complete);
    assert!(!complete.action_needed);

    let review_rims = rules.resolve_aluminum_rims(&[
        SearchCandidate::new("alloy", "edmunds", 0.9).unwrap(),
        SearchCandidate::new("steel", "kbb", 0.9).unwrap(),
    ]);
    let review_cats = rules.resolve_catalytic_converters(&[]);
    assert_eq!(review_rims.status, FieldStatus::NeedsReview);

    let mut partial = ResolutionReport::new(&camry, Strategy::DecisionRules);
    for r in [ok_weight, ok_engine, review_rims, review_cats] {
        partial.add_field_resolution(r);
    }
    partial.calculate_overall_status();
    assert_eq!(partial.outcome, Outcome::Partial);
    assert!(partial.action_needed);
    assert_eq!(partial.fields_needing_review.len(), 2);
}

#[test]
fn write_gate_requires_ok_status() {
    let rules = DecisionRuleSet::default();
    let mut r = rules.resolve_aluminum_engine(&[
        SearchCandidate::new("aluminum", "Honda official specifications", 0.95).unwrap(),
        SearchCandidate::new("aluminum", "manufacturer press kit", 0.95).unwrap(),
    ]);
    assert!(rules.should_write_to_database(&r));

    r.confidence = 1.0;
    for status in [FieldStatus::NeedsReview, FieldStatus::InsufficientData] {
        r.status = status;
        assert!(!rules.should_write_to_database(&r));
    }
}
