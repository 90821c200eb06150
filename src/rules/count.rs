//! Catalytic converter count: engine-dependent vote with a range.

use crate::candidate::{CandidateValue, SearchCandidate};
use crate::evidence::{EstimateType, EvidenceLedger, ValueRange};
use crate::field::{FieldResolution, FieldStatus};
use crate::vehicle::FieldName;

use super::{
    conditional_facts, tally, vote_confidence, winner_trust, DecisionRuleSet, Draft,
    RULE_ENGINE_DEPENDENT,
};

/// Typical range reported when nothing is known. Never used as a chosen value.
const TYPICAL_LOW: f64 = 1.0;
const TYPICAL_HIGH: f64 = 2.0;

impl DecisionRuleSet {
    /// Resolve the number of catalytic converters.
    ///
    /// Votes are over count values. With no data the rule reports the
    /// typical 1–2 range without choosing a value. This attribute uses its
    /// own, lower confidence threshold and evidence floor.
    #[must_use]
    pub fn resolve_catalytic_converters(&self, candidates: &[SearchCandidate]) -> FieldResolution {
        let mut warnings = Vec::new();
        let accepted = self.accept(
            candidates,
            CandidateValue::as_count,
            "a non-negative whole number",
            &mut warnings,
        );

        let mut ledger = EvidenceLedger::new();
        for a in &accepted {
            ledger.record(
                a.candidate.source.clone(),
                f64::from(a.value),
                a.trust,
                a.candidate.confidence,
            );
        }

        let engines = conditional_facts(&accepted, "engine", |c| c.engine.as_deref(), f64::from);
        let engine_count = engines.len();
        let variant_needed = engine_count > 1;
        for fact in engines {
            ledger.add_conditional(fact);
        }

        let Some(vote) = tally(&accepted) else {
            warnings.push(
                "No catalytic converter data; typical range is 1-2, not guessing".to_string(),
            );
            let range = ValueRange {
                low: Some(TYPICAL_LOW),
                high: Some(TYPICAL_HIGH),
                chosen: None,
                estimate_type: EstimateType::Unknown,
                variant_needed_for_exact: variant_needed,
            };
            let draft = Draft {
                field: FieldName::CatalyticConverters,
                rule: RULE_ENGINE_DEPENDENT,
                range,
                confidence: 0.0,
                status: FieldStatus::NeedsReview,
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
                "Sources disagree on count: agreement {agreement:.2} below {:.2}",
                self.config.min_agreement_ratio
            ));
        }
        if variant_needed {
            warnings.push(format!(
                "Count varies by engine ({engine_count} engines); see conditional values"
            ));
        }

        let low = accepted.iter().map(|a| a.value).min().map(f64::from);
        let high = accepted.iter().map(|a| a.value).max().map(f64::from);
        let range = ValueRange {
            low,
            high,
            chosen: Some(f64::from(vote.winner)),
            estimate_type: EstimateType::MostCommon,
            variant_needed_for_exact: variant_needed,
        };

        let draft = Draft {
            field: FieldName::CatalyticConverters,
            rule: RULE_ENGINE_DEPENDENT,
            range,
            confidence,
            status,
            warnings,
        };
        self.finish(draft, ledger, candidates)
    }
}
