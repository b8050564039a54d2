// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Readability scoring for rewritten text
//!
//! A Flesch-Kincaid style grade mapped onto a 0–10 simplicity scale, then
//! adjusted for the number of bracket-marked terms and for friendly phrasing:
//!
//! ```text
//! grade    = 0.39 * words/sentence + 11.8 * syllables/word - 15.59
//! base     = clamp(10 - 0.8 * grade, 0, 10)
//! adjusted = max(0, base - min(3, 0.5 * bracketed))
//! final    = min(10, adjusted + min(3, 0.4 * friendly))      rounded to 0.5
//! ```

use crate::syllable::SyllableEstimator;
use crate::whole_word;
use medexplain_core::{ConfigError, ScoringConfig, MAX_SCORE, MIN_SCORE};
use regex::Regex;
use serde::Serialize;

/// Every intermediate of one scoring run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadabilityBreakdown {
    pub words: usize,
    pub sentences: usize,
    pub syllables: u32,
    pub avg_syllables_per_word: f64,
    pub avg_words_per_sentence: f64,
    pub grade: f64,
    pub base: f64,
    pub bracket_penalty: f64,
    pub friendly_matches: usize,
    pub friendly_bonus: f64,
    /// Final score, rounded to the nearest 0.5
    pub score: f64,
}

pub struct ReadabilityScorer {
    config: ScoringConfig,
    friendly: Vec<Regex>,
    syllables: SyllableEstimator,
}

impl Default for ReadabilityScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default()).expect("default friendliness lexicon compiles")
    }
}

impl ReadabilityScorer {
    pub fn new(config: ScoringConfig) -> Result<Self, ConfigError> {
        let friendly = config
            .friendly_terms
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| whole_word(t.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            friendly,
            syllables: SyllableEstimator::new(),
        })
    }

    /// Simplicity score in [0, 10], rounded to the nearest 0.5
    pub fn score(&self, text: &str, bracketed_terms: usize) -> f64 {
        self.breakdown(text, bracketed_terms).score
    }

    pub fn breakdown(&self, text: &str, bracketed_terms: usize) -> ReadabilityBreakdown {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return ReadabilityBreakdown::default();
        }

        let sentences = text
            .split(['.', '!', '?'])
            .filter(|s| !s.trim().is_empty())
            .count();
        let syllables: u32 = words.iter().map(|w| self.syllables.estimate(w)).sum();

        let c = &self.config;
        let avg_syllables_per_word = syllables as f64 / words.len() as f64;
        let avg_words_per_sentence = words.len() as f64 / sentences.max(1) as f64;

        let grade = c.sentence_coefficient * avg_words_per_sentence
            + c.syllable_coefficient * avg_syllables_per_word
            - c.grade_offset;
        let base = (MAX_SCORE - grade * c.grade_weight).clamp(MIN_SCORE, MAX_SCORE);

        let bracket_penalty = (bracketed_terms as f64 * c.bracket_weight).min(c.bracket_cap);
        let adjusted = (base - bracket_penalty).max(MIN_SCORE);

        let friendly_matches: usize = self.friendly.iter().map(|re| re.find_iter(text).count()).sum();
        let friendly_bonus = (friendly_matches as f64 * c.friendly_weight).min(c.friendly_cap);
        let score = round_to_half((adjusted + friendly_bonus).min(MAX_SCORE));

        ReadabilityBreakdown {
            words: words.len(),
            sentences,
            syllables,
            avg_syllables_per_word,
            avg_words_per_sentence,
            grade,
            base,
            bracket_penalty,
            friendly_matches,
            friendly_bonus,
            score,
        }
    }
}

fn round_to_half(value: f64) -> f64 {
    (value * 2.0).round() / 2.0
}
