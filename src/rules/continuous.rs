//! Curb weight: median of trusted sources.

use crate::candidate::{CandidateValue, SearchCandidate};
use crate::evidence::{EstimateType, EvidenceLedger, ValueRange};
use crate::field::{FieldResolution, FieldStatus};
use crate::stats;
use crate::vehicle::FieldName;

use super::{DecisionRuleSet, Draft, RULE_MEDIAN_OF_TRUSTED};

/// Confidence when only one trusted source reported.
const SINGLE_TRUSTED_CONFIDENCE: f64 = 0.7;
/// Confidence when no trusted source reported at all.
const UNTRUSTED_CONFIDENCE: f64 = 0.3;

/// Confidence tier from the relative spread of trusted values.
fn spread_confidence(spread: f64) -> f64 {
    if spread < 0.05 {
        0.95
    } else if spread < 0.10 {
        0.85
    } else {
        0.75
    }
}

impl DecisionRuleSet {
    /// Resolve curb weight.
    ///
    /// Only HIGH and MEDIUM trust values feed the chosen median and the
    /// low/high range; lower-trust values still count as evidence.
    #[must_use]
    pub fn resolve_curb_weight(&self, candidates: &[SearchCandidate]) -> FieldResolution {
        let mut warnings = Vec::new();
        let accepted =
            self.accept(candidates, CandidateValue::as_number, "a number", &mut warnings);

        let mut ledger = EvidenceLedger::new();
        for a in &accepted {
            ledger.record(a.candidate.source.clone(), a.value, a.trust, a.candidate.confidence);
        }

        let draft =
            |range: ValueRange, confidence: f64, status: FieldStatus, warnings: Vec<String>| Draft {
                field: FieldName::CurbWeight,
                rule: RULE_MEDIAN_OF_TRUSTED,
                range,
                confidence,
                status,
                warnings,
            };

        if accepted.is_empty() {
            warnings.push("No usable curb weight observations".to_string());
            return self.finish(
                draft(ValueRange::unknown(), 0.0, FieldStatus::InsufficientData, warnings),
                ledger,
                candidates,
            );
        }

        let trusted: Vec<f64> = accepted
            .iter()
            .filter(|a| a.trust.is_trusted())
            .map(|a| a.value)
            .collect();

        let Some((chosen, (low, high))) = stats::median(&trusted).zip(stats::min_max(&trusted))
        else {
            let all: Vec<f64> = accepted.iter().map(|a| a.value).collect();
            let (low, high) = stats::min_max(&all).unzip();
            warnings.push(format!(
                "No trusted (HIGH/MEDIUM) source among {} observation(s); manual review required",
                all.len()
            ));
            let range = ValueRange {
                low,
                high,
                chosen: None,
                estimate_type: EstimateType::Unknown,
                variant_needed_for_exact: false,
            };
            return self.finish(
                draft(range, UNTRUSTED_CONFIDENCE, FieldStatus::NeedsReview, warnings),
                ledger,
                candidates,
            );
        };

        let spread = if chosen == 0.0 {
            0.0
        } else {
            (high - low) / chosen.abs()
        };
        let variant_needed = spread > self.config.variant_spread_threshold;
        if variant_needed {
            warnings.push(format!(
                "Trusted values span {:.1}% ({low}-{high}); exact weight depends on trim",
                spread * 100.0
            ));
        }

        let confidence = if trusted.len() == 1 {
            SINGLE_TRUSTED_CONFIDENCE
        } else {
            spread_confidence(spread)
        };

        let range = ValueRange {
            low: Some(low),
            high: Some(high),
            chosen: Some(chosen),
            estimate_type: EstimateType::Median,
            variant_needed_for_exact: variant_needed,
        };
        self.finish(draft(range, confidence, FieldStatus::Ok, warnings), ledger, candidates)
    }
}
