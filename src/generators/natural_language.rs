//! Natural-language domain inference for string features.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::CombinerFeatureStatsGenerator;
use crate::options::StatsOptions;
use crate::statistics::{CustomStatistic, FeatureNameStatistics};
use crate::types::{FeatureColumn, FeatureValues};

pub const NATURAL_LANGUAGE_GENERATOR_NAME: &str = "natural_language_domain";
pub const NATURAL_LANGUAGE_DOMAIN_INFO: &str = "natural_language_domain {}";
pub const NATURAL_LANGUAGE_MATCH_RATE: &str = "natural_language_match_rate";

const MIN_TOKENS: usize = 2;
const MIN_LETTER_RATIO: f64 = 0.6;
const MAX_AVG_WORD_LENGTH: f64 = 15.0;

/// A word: letters and combining marks, optionally joined by apostrophes or
/// hyphens ("don't", "well-known").
static WORD_REGEX: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[\p{L}\p{M}]+(?:['’-][\p{L}\p{M}]+)*")
        .expect("Hard-coded regex pattern should be valid")
});

/// Whether a value reads like prose rather than an identifier or code.
///
/// A match needs at least two whitespace-separated tokens, mostly letters
/// (by share of non-whitespace characters), and words of plausible length.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn is_natural_language(value: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(value) else {
        return false;
    };
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < MIN_TOKENS {
        return false;
    }
    let visible: usize = tokens.iter().map(|t| t.chars().count()).sum();
    let words: Vec<usize> = WORD_REGEX
        .find_iter(text)
        .map(|m| m.as_str().chars().count())
        .collect();
    if words.is_empty() {
        return false;
    }
    let letters: usize = words.iter().sum();
    letters as f64 / visible as f64 >= MIN_LETTER_RATIO
        && letters as f64 / words.len() as f64 <= MAX_AVG_WORD_LENGTH
}

/// Marks string features whose values are mostly natural-language text.
#[derive(Clone, Debug)]
pub struct NaturalLanguageDomainGenerator {
    match_threshold: f64,
    min_examples: u64,
}

impl Default for NaturalLanguageDomainGenerator {
    fn default() -> Self {
        Self::from_options(&StatsOptions::default())
    }
}

impl NaturalLanguageDomainGenerator {
    #[must_use]
    pub const fn from_options(options: &StatsOptions) -> Self {
        Self {
            match_threshold: options.natural_language_match_threshold,
            min_examples: options.semantic_domain_min_examples,
        }
    }
}

/// Running counts only; no values are retained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NaturalLanguageAccumulator {
    non_missing_examples: u64,
    num_values: u64,
    num_matched: u64,
}

impl CombinerFeatureStatsGenerator for NaturalLanguageDomainGenerator {
    type Accumulator = NaturalLanguageAccumulator;

    fn name(&self) -> &str {
        NATURAL_LANGUAGE_GENERATOR_NAME
    }

    fn create_accumulator(&self) -> NaturalLanguageAccumulator {
        NaturalLanguageAccumulator::default()
    }

    fn add_input(&self, acc: &mut NaturalLanguageAccumulator, _feature: &str, column: &FeatureColumn) {
        for cell in column {
            let Some(FeatureValues::Bytes(values)) = cell else {
                continue;
            };
            acc.non_missing_examples += 1;
            for value in values {
                acc.num_values += 1;
                if is_natural_language(value) {
                    acc.num_matched += 1;
                }
            }
        }
    }

    fn merge_into(&self, acc: &mut NaturalLanguageAccumulator, other: &NaturalLanguageAccumulator) {
        acc.non_missing_examples += other.non_missing_examples;
        acc.num_values += other.num_values;
        acc.num_matched += other.num_matched;
    }

    #[allow(clippy::cast_precision_loss)]
    fn extract_output(
        &self,
        feature: &str,
        acc: &NaturalLanguageAccumulator,
    ) -> Result<FeatureNameStatistics> {
        let mut out = FeatureNameStatistics::new(feature);
        if acc.num_values == 0 {
            return Ok(out);
        }
        if acc.non_missing_examples < self.min_examples {
            debug!(
                feature,
                examples = acc.non_missing_examples,
                min_examples = self.min_examples,
                "too few examples for natural-language inference"
            );
            return Ok(out);
        }
        let rate = acc.num_matched as f64 / acc.num_values as f64;
        if rate >= self.match_threshold {
            out.custom_stats
                .push(CustomStatistic::str("domain_info", NATURAL_LANGUAGE_DOMAIN_INFO));
            out.custom_stats
                .push(CustomStatistic::num(NATURAL_LANGUAGE_MATCH_RATE, rate));
        }
        Ok(out)
    }
}
