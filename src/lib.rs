//! # vehicle-resolver - Vehicle attribute resolution engine
//!
//! Reconciles conflicting observations of a vehicle attribute (curb weight,
//! engine material, rim material, catalytic converter count) gathered from
//! heterogeneous sources into one value with a confidence score and an
//! audit trail.
//!
//! ## Core Concepts
//!
//! - **SearchCandidate**: one observation `(value, source, confidence)`
//! - **SourceTrust**: reliability tier derived from the source string
//! - **DecisionRuleSet**: per-attribute policy producing a `FieldResolution`
//! - **ConsensusResolver**: clustering + weighted median for numeric values
//! - **ResolutionReport**: all four attributes of one vehicle with an outcome
//! - **ProvenanceStore**: permanent, non-expiring cache of resolutions
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use vehicle_resolver::{
//!     FieldName, ProvenanceStore, ResolutionEngine, ResolverConfig, SearchCandidate,
//!     VehicleKey, VehicleObservations,
//! };
//!
//! let engine = ResolutionEngine::from_config(
//!     ResolverConfig::default(),
//!     Arc::new(ProvenanceStore::in_memory()),
//! )?;
//! let camry = VehicleKey::new(2019, "Toyota", "Camry")?;
//! let observations = VehicleObservations::new(&camry)
//!     .with(
//!         FieldName::CurbWeight,
//!         SearchCandidate::new(3310.0, "Toyota official specifications", 0.95)?,
//!     )
//!     .with(FieldName::CurbWeight, SearchCandidate::new(3340.0, "edmunds.com", 0.9)?);
//!
//! let report = engine.resolve_vehicle(&camry, &observations);
//! assert_eq!(report.curb_weight.and_then(|r| r.chosen()), Some(3325.0));
//! # Ok::<(), vehicle_resolver::ValidationError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod candidate;
pub mod cluster;
pub mod config;
pub mod consensus;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod field;
pub mod report;
pub mod rules;
pub mod scoring;
mod stats;
pub mod storage;
pub mod trust;
pub mod vehicle;

// Re-export primary types at crate root for convenience
pub use candidate::{candidate_digest, CandidateValue, SearchCandidate};
pub use cluster::CandidateClusterer;
pub use config::ResolverConfig;
pub use consensus::{ConsensusResolver, ResolutionMethod, ResolutionResult};
pub use engine::{ResolutionEngine, VehicleObservations};
pub use error::{ResolveError, ResolveResult, ValidationError};
pub use evidence::{
    ConditionalFact, EstimateType, EvidenceLedger, EvidenceScore, SourceContribution, ValueRange,
    WriteGate,
};
pub use field::{FieldResolution, FieldStatus};
pub use report::{Outcome, ResolutionReport, Strategy};
pub use rules::DecisionRuleSet;
pub use scoring::ConfidenceScorer;
#[cfg(feature = "persistent")]
pub use storage::SqliteBackend;
pub use storage::{
    InMemoryBackend, ProvenanceBackend, ProvenanceRecord, ProvenanceStore, RecordId, StorageError,
};
pub use trust::{SourceTrust, SourceTrustClassifier};
pub use vehicle::{FieldName, VehicleKey};
