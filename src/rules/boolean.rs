//! Aluminum engine and aluminum rims: trust-weighted boolean votes.

use crate::candidate::{CandidateValue, SearchCandidate};
use crate::evidence::{EstimateType, EvidenceLedger, ValueRange};
use crate::field::{FieldResolution, FieldStatus};
use crate::vehicle::FieldName;

use super::{
    conditional_facts, tally, vote_confidence, winner_trust, DecisionRuleSet, Draft,
    RULE_BOOLEAN_OEM_PREFERRED, RULE_TRIM_DEPENDENT,
};

fn flag_value(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

impl DecisionRuleSet {
    /// Resolve whether the engine block is aluminum.
    ///
    /// Each candidate votes with weight `trust × confidence`. Unanimous
    /// HIGH-trust agreement yields 0.95; the tiers fall off with agreement
    /// and trust.
    #[must_use]
    pub fn resolve_aluminum_engine(&self, candidates: &[SearchCandidate]) -> FieldResolution {
        self.resolve_flag(FieldName::AluminumEngine, RULE_BOOLEAN_OEM_PREFERRED, candidates)
    }

    /// Resolve whether the wheels are aluminum alloy.
    ///
    /// The unconditional value is the market-wide vote. Candidates tagged
    /// with a trim also produce one conditional fact per distinct trim, and
    /// more than one trim marks the value as variant-dependent.
    #[must_use]
    pub fn resolve_aluminum_rims(&self, candidates: &[SearchCandidate]) -> FieldResolution {
        self.resolve_flag(FieldName::AluminumRims, RULE_TRIM_DEPENDENT, candidates)
    }

    fn resolve_flag(
        &self,
        field: FieldName,
        rule: &'static str,
        candidates: &[SearchCandidate],
    ) -> FieldResolution {
        let mut warnings = Vec::new();
        let accepted = self.accept(candidates, CandidateValue::as_flag, "a boolean", &mut warnings);

        let mut ledger = EvidenceLedger::new();
        for a in &accepted {
            ledger.record(
                a.candidate.source.clone(),
                flag_value(a.value),
                a.trust,
                a.candidate.confidence,
            );
        }

        let trims = if field == FieldName::AluminumRims {
            conditional_facts(&accepted, "trim", |c| c.trim.as_deref(), flag_value)
        } else {
            Vec::new()
        };
        let trim_count = trims.len();
        let variant_needed = trim_count > 1;
        for fact in trims {
            ledger.add_conditional(fact);
        }

        let Some(vote) = tally(&accepted) else {
            let status = if accepted.is_empty() {
                warnings.push(format!("No usable {field} observations"));
                FieldStatus::InsufficientData
            } else {
                warnings.push("All votes carry zero weight".to_string());
                FieldStatus::NeedsReview
            };
            let draft = Draft {
                field,
                rule,
                range: ValueRange::unknown(),
                confidence: 0.0,
                status,
                warnings,
            };
            return self.finish(draft, ledger, candidates);
        };

        let agreement = vote.agreement_ratio();
        let confidence = vote_confidence(agreement, winner_trust(&accepted, &vote.winner));

        let mut status = FieldStatus::Ok;
        if agreement < self.config.min_agreement_ratio {
            status = FieldStatus::NeedsReview;
            warnings.push(format!(
                "Sources disagree: agreement {agreement:.2} below {:.2}",
                self.config.min_agreement_ratio
            ));
        }

        let estimate_type = if variant_needed {
            warnings.push(format!(
                "Value varies by trim ({trim_count} trims); default reflects the market-wide vote"
            ));
            EstimateType::MarketDefault
        } else {
            EstimateType::MajorityVote
        };

        let any_true = accepted.iter().any(|a| a.value);
        let any_false = accepted.iter().any(|a| !a.value);
        let range = ValueRange {
            low: Some(if any_false { 0.0 } else { 1.0 }),
            high: Some(if any_true { 1.0 } else { 0.0 }),
            chosen: Some(flag_value(vote.winner)),
            estimate_type,
            variant_needed_for_exact: variant_needed,
        };

        let draft = Draft {
            field,
            rule,
            range,
            confidence,
            status,
            warnings,
        };
        self.finish(draft, ledger, candidates)
    }
}
