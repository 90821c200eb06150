//! Source trust classification.
//!
//! Trust is an ordinal tier derived from the source identifier alone. It is
//! modeled separately from the candidate's self-reported confidence: the
//! tier scales how much a source should influence a decision without
//! mutating the confidence it reported.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Reliability tier of a source.
///
/// Variants are declared lowest first so the derived `Ord` matches the
/// numeric weight: `Unknown < Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTrust {
    /// No indicator matched.
    Unknown,
    /// Forums, dealer listings, user content.
    Low,
    /// Named review sites and data aggregators.
    Medium,
    /// Manufacturer and official sources.
    High,
}

impl SourceTrust {
    /// Multiplicative weight of this tier.
    #[must_use]
    pub const fn value(self) -> f64 {
        match self {
            Self::High => 1.0,
            Self::Medium => 0.7,
            Self::Low => 0.4,
            Self::Unknown => 0.2,
        }
    }

    /// Returns true for the tiers whose values feed chosen statistics.
    #[must_use]
    pub const fn is_trusted(self) -> bool {
        matches!(self, Self::High | Self::Medium)
    }

    /// Short stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Unknown => "unknown",
        }
    }
}

impl Default for SourceTrust {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for SourceTrust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Manufacturer / official indicators.
pub const HIGH_TRUST_INDICATORS: &[&str] = &[
    "oem",
    "manufacturer",
    "official",
    "factory",
    "owner's manual",
    "owners manual",
    "spec sheet",
    "nhtsa",
    "epa.gov",
    "fueleconomy.gov",
];

/// Review site and data aggregator indicators.
pub const MEDIUM_TRUST_INDICATORS: &[&str] = &[
    "edmunds",
    "kbb",
    "kelley blue book",
    "caranddriver",
    "car and driver",
    "motortrend",
    "motor trend",
    "cars.com",
    "autotrader",
    "consumer reports",
    "consumerreports",
    "cargurus",
    "carfax",
    "jdpower",
    "wikipedia",
    "autoblog",
];

/// Community and listing indicators.
pub const LOW_TRUST_INDICATORS: &[&str] = &[
    "forum",
    "reddit",
    "dealer",
    "listing",
    "craigslist",
    "ebay",
    "facebook",
    "youtube",
    "blog",
];

fn indicator_regex(indicators: &[&str]) -> Result<Option<Regex>, ValidationError> {
    let parts: Vec<String> = indicators
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(regex::escape)
        .collect();
    if parts.is_empty() {
        return Ok(None);
    }
    let pattern = format!("(?i)(?:{})", parts.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| ValidationError::InvalidIndicator {
            reason: e.to_string(),
        })
}

/// Maps source identifiers to trust tiers.
///
/// Indicator lists are checked in order HIGH, MEDIUM, LOW with a
/// case-insensitive substring match; the first tier with a hit wins.
/// Classification is total and deterministic.
#[derive(Debug, Clone)]
pub struct SourceTrustClassifier {
    high: Option<Regex>,
    medium: Option<Regex>,
    low: Option<Regex>,
}

impl SourceTrustClassifier {
    /// Build a classifier from custom indicator lists.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidIndicator` if the combined pattern
    /// exceeds the regex engine's limits.
    pub fn with_indicators(
        high: &[&str],
        medium: &[&str],
        low: &[&str],
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            high: indicator_regex(high)?,
            medium: indicator_regex(medium)?,
            low: indicator_regex(low)?,
        })
    }

    /// The classifier built from the default indicator lists.
    #[must_use]
    pub fn builtin() -> &'static Self {
        static BUILTIN: OnceLock<SourceTrustClassifier> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            Self::with_indicators(
                HIGH_TRUST_INDICATORS,
                MEDIUM_TRUST_INDICATORS,
                LOW_TRUST_INDICATORS,
            )
            .expect("built-in trust indicators are escaped literals")
        })
    }

    /// Classify a source identifier.
    #[must_use]
    pub fn classify(&self, source: &str) -> SourceTrust {
        let hit = |re: &Option<Regex>| re.as_ref().is_some_and(|r| r.is_match(source));
        if hit(&self.high) {
            SourceTrust::High
        } else if hit(&self.medium) {
            SourceTrust::Medium
        } else if hit(&self.low) {
            SourceTrust::Low
        } else {
            SourceTrust::Unknown
        }
    }
}

impl Default for SourceTrustClassifier {
    fn default() -> Self {
        Self::builtin().clone()
    }
}

/// Classify a source with the built-in indicator lists.
#[must_use]
pub fn classify(source: &str) -> SourceTrust {
    SourceTrustClassifier::builtin().classify(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered_by_weight() {
        assert!(SourceTrust::High > SourceTrust::Medium);
        assert!(SourceTrust::Medium > SourceTrust::Low);
        assert!(SourceTrust::Low > SourceTrust::Unknown);
        assert_eq!(
            [SourceTrust::Low, SourceTrust::High, SourceTrust::Unknown]
                .into_iter()
                .max(),
            Some(SourceTrust::High)
        );
    }

    #[test]
    fn classifies_each_tier_case_insensitively() {
        assert_eq!(classify("Toyota OEM Spec Sheet"), SourceTrust::High);
        assert_eq!(classify("https://www.Edmunds.com/toyota/camry"), SourceTrust::Medium);
        assert_eq!(classify("camry owners FORUM"), SourceTrust::Low);
        assert_eq!(classify("some random page"), SourceTrust::Unknown);
        assert_eq!(classify(""), SourceTrust::Unknown);
    }

    #[test]
    fn higher_tier_wins_on_multiple_hits() {
        // "official" (high) beats "dealer" (low)
        assert_eq!(classify("official dealer brochure"), SourceTrust::High);
        // "autoblog" (medium) beats "blog" (low)
        assert_eq!(classify("autoblog.com review"), SourceTrust::Medium);
    }

    #[test]
    fn custom_indicators() {
        let classifier =
            SourceTrustClassifier::with_indicators(&["lab"], &[], &["rumor"]).unwrap();
        assert_eq!(classifier.classify("Test LAB report"), SourceTrust::High);
        assert_eq!(classifier.classify("rumor mill"), SourceTrust::Low);
        assert_eq!(classifier.classify("edmunds"), SourceTrust::Unknown);
    }

    #[test]
    fn indicators_are_literal_not_patterns() {
        let classifier = SourceTrustClassifier::with_indicators(&["a.c"], &[], &[]).unwrap();
        assert_eq!(classifier.classify("abc"), SourceTrust::Unknown);
        assert_eq!(classifier.classify("a.c"), SourceTrust::High);
    }
}
