//! Attribute-specific decision rules.
//!
//! Each attribute has its own policy:
//! - curb weight: median of trusted (HIGH/MEDIUM) sources
//! - aluminum engine: trust-weighted boolean vote, OEM preferred
//! - aluminum rims: trust-weighted vote with per-trim conditional facts
//! - catalytic converters: trust-weighted count vote with per-engine facts
//!
//! All rules share the same evidence accounting and the same write gate: a
//! field is `ok` only when its confidence clears the rule's threshold and
//! its evidence clears both the weight and source-count floors. Rules never
//! promote a `needs_review` or `insufficient_data` field.

mod boolean;
mod continuous;
mod count;

use chrono::Utc;
use tracing::{debug, warn};

use crate::candidate::{candidate_digest, skip_warning, CandidateValue, SearchCandidate};
use crate::config::ResolverConfig;
use crate::evidence::{ConditionalFact, EvidenceLedger, ValueRange};
use crate::field::{FieldResolution, FieldStatus};
use crate::trust::{SourceTrust, SourceTrustClassifier};
use crate::vehicle::FieldName;

/// Rule name for curb weight.
pub const RULE_MEDIAN_OF_TRUSTED: &str = "median_of_trusted_sources";
/// Rule name for aluminum engine.
pub const RULE_BOOLEAN_OEM_PREFERRED: &str = "high_confidence_boolean_oem_preferred";
/// Rule name for aluminum rims.
pub const RULE_TRIM_DEPENDENT: &str = "trim_dependent_with_market_default";
/// Rule name for catalytic converters.
pub const RULE_ENGINE_DEPENDENT: &str = "engine_dependent_with_range";

/// A candidate that passed validation, with its coerced value and trust.
#[derive(Debug, Clone)]
struct Accepted<'a, T> {
    candidate: &'a SearchCandidate,
    value: T,
    trust: SourceTrust,
}

impl<T> Accepted<'_, T> {
    fn weight(&self) -> f64 {
        self.trust.value() * self.candidate.confidence
    }
}

/// Outcome of a trust-weighted vote.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Vote<K> {
    winner: K,
    winning_weight: f64,
    total_weight: f64,
}

impl<K> Vote<K> {
    fn agreement_ratio(&self) -> f64 {
        if self.total_weight > 0.0 {
            self.winning_weight / self.total_weight
        } else {
            0.0
        }
    }
}

/// Tally `trust × confidence` per distinct value.
///
/// Returns `None` when nothing carries positive weight. Ties go to the
/// smallest key.
fn tally<K: Ord + Copy>(items: &[Accepted<'_, K>]) -> Option<Vote<K>> {
    let mut weights: std::collections::BTreeMap<K, f64> = std::collections::BTreeMap::new();
    for item in items {
        *weights.entry(item.value).or_insert(0.0) += item.weight();
    }
    let total_weight: f64 = weights.values().sum();
    if total_weight <= 0.0 {
        return None;
    }
    let mut best: Option<(K, f64)> = None;
    for (&key, &weight) in &weights {
        match best {
            Some((_, w)) if w >= weight => {}
            _ => best = Some((key, weight)),
        }
    }
    best.map(|(winner, winning_weight)| Vote {
        winner,
        winning_weight,
        total_weight,
    })
}

/// Confidence tiers shared by the vote-based rules.
fn vote_confidence(agreement: f64, highest_trust: SourceTrust) -> f64 {
    if agreement >= 0.9 && highest_trust == SourceTrust::High {
        0.95
    } else if agreement >= 0.75 && highest_trust.is_trusted() {
        0.85
    } else if agreement >= 0.6 {
        0.70
    } else {
        0.50
    }
}

/// Highest trust among the voters for `winner`.
fn winner_trust<K: PartialEq>(items: &[Accepted<'_, K>], winner: &K) -> SourceTrust {
    items
        .iter()
        .filter(|a| a.value == *winner)
        .map(|a| a.trust)
        .max()
        .unwrap_or_default()
}

/// Groups items by an optional variant tag, in order of first appearance.
/// Untagged items are left out.
fn group_by_tag<'a, T, F>(
    items: &[Accepted<'a, T>],
    tag: F,
) -> Vec<(String, Vec<Accepted<'a, T>>)>
where
    T: Clone,
    F: Fn(&SearchCandidate) -> Option<&str>,
{
    let mut groups: Vec<(String, Vec<Accepted<'a, T>>)> = Vec::new();
    for item in items {
        let Some(name) = tag(item.candidate).map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };
        match groups.iter_mut().find(|(g, _)| g == name) {
            Some((_, members)) => members.push(item.clone()),
            None => groups.push((name.to_string(), vec![item.clone()])),
        }
    }
    groups
}

/// One conditional fact per variant group, valued by the group's own vote.
#[allow(clippy::cast_precision_loss)]
fn conditional_facts<T, F, G>(
    items: &[Accepted<'_, T>],
    key: &str,
    tag: F,
    to_f64: G,
) -> Vec<ConditionalFact>
where
    T: Ord + Copy,
    F: Fn(&SearchCandidate) -> Option<&str>,
    G: Fn(T) -> f64,
{
    group_by_tag(items, tag)
        .into_iter()
        .filter_map(|(name, members)| {
            let vote = tally(&members)?;
            let winners: Vec<&Accepted<'_, T>> =
                members.iter().filter(|m| m.value == vote.winner).collect();
            let mean_confidence = winners.iter().map(|m| m.candidate.confidence).sum::<f64>()
                / winners.len() as f64;
            let mut sources: Vec<String> = Vec::new();
            for m in &winners {
                if !sources.contains(&m.candidate.source) {
                    sources.push(m.candidate.source.clone());
                }
            }
            Some(ConditionalFact {
                condition: format!("{key}={name}"),
                value: to_f64(vote.winner),
                confidence: (vote.agreement_ratio() * mean_confidence).clamp(0.0, 1.0),
                sources,
            })
        })
        .collect()
}

/// What a rule decided before the common write gate is applied.
struct Draft {
    field: FieldName,
    rule: &'static str,
    range: ValueRange,
    confidence: f64,
    status: FieldStatus,
    warnings: Vec<String>,
}

/// The full set of attribute rules, sharing one configuration.
#[derive(Debug, Clone)]
pub struct DecisionRuleSet {
    config: ResolverConfig,
    classifier: SourceTrustClassifier,
}

impl Default for DecisionRuleSet {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

impl DecisionRuleSet {
    /// Creates a rule set with the built-in trust classifier.
    ///
    /// `config` is used as given; pass it through
    /// [`ResolverConfig::validate`] first, as
    /// [`ResolutionEngine::from_config`](crate::ResolutionEngine::from_config) does.
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_classifier(config, SourceTrustClassifier::default())
    }

    /// Creates a rule set with a custom trust classifier.
    #[must_use]
    pub fn with_classifier(config: ResolverConfig, classifier: SourceTrustClassifier) -> Self {
        Self { config, classifier }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `field` with its rule.
    #[must_use]
    pub fn resolve_field(
        &self,
        field: FieldName,
        candidates: &[SearchCandidate],
    ) -> FieldResolution {
        match field {
            FieldName::CurbWeight => self.resolve_curb_weight(candidates),
            FieldName::AluminumEngine => self.resolve_aluminum_engine(candidates),
            FieldName::AluminumRims => self.resolve_aluminum_rims(candidates),
            FieldName::CatalyticConverters => self.resolve_catalytic_converters(candidates),
        }
    }

    /// True iff `resolution` may be persisted as a simplified scalar
    /// anywhere outside the engine's own store.
    ///
    /// Requires status `ok`, a chosen value, and both the confidence and
    /// evidence floors of the field's rule. A high confidence alone never
    /// suffices.
    #[must_use]
    pub fn should_write_to_database(&self, resolution: &FieldResolution) -> bool {
        resolution.status == FieldStatus::Ok
            && self.config.write_gate(resolution.field_name).admits(
                resolution.value_range.chosen,
                resolution.confidence,
                &resolution.evidence,
            )
    }

    /// Validate, coerce and classify candidates, recording a warning for
    /// every skipped one.
    fn accept<'a, T>(
        &self,
        candidates: &'a [SearchCandidate],
        read: impl Fn(&CandidateValue) -> Option<T>,
        expected: &str,
        warnings: &mut Vec<String>,
    ) -> Vec<Accepted<'a, T>> {
        let mut accepted = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if let Err(e) = candidate.validate() {
                warn!(source = %candidate.source, error = %e, "Skipping candidate");
                warnings.push(skip_warning(candidate, &e.to_string()));
                continue;
            }
            let Some(value) = read(&candidate.value) else {
                warn!(source = %candidate.source, expected, "Skipping malformed candidate");
                warnings.push(skip_warning(candidate, &format!("expected {expected}")));
                continue;
            };
            accepted.push(Accepted {
                candidate,
                value,
                trust: self.classifier.classify(&candidate.source),
            });
        }
        accepted
    }

    /// Apply the common write gate and build the final resolution.
    fn finish(
        &self,
        draft: Draft,
        ledger: EvidenceLedger,
        candidates: &[SearchCandidate],
    ) -> FieldResolution {
        let Draft {
            field,
            rule,
            range,
            confidence,
            mut status,
            mut warnings,
        } = draft;
        let (evidence, conditional) = ledger.finish();

        if status == FieldStatus::Ok {
            let failures = self
                .config
                .write_gate(field)
                .failures(range.chosen, confidence, &evidence);
            if !failures.is_empty() {
                status = FieldStatus::NeedsReview;
                warnings.extend(failures);
            }
        }

        debug!(
            field = %field,
            rule,
            chosen = ?range.chosen,
            confidence,
            evidence_weight = evidence.weighted_score,
            status = %status,
            "Field resolved"
        );

        FieldResolution {
            field_name: field,
            value_range: range,
            conditional_values: conditional,
            evidence,
            confidence,
            status,
            decision_rule_applied: rule.to_string(),
            warnings,
            candidate_digest: candidate_digest(candidates),
            resolved_at: Utc::now(),
        }
    }
}
