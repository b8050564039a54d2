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

//! Per-term flags and the off-topic check
//!
//! Two flag policies exist. Heuristic passes (intake and the final re-merge)
//! judge a term by its own shape. The bracket pass judges by term length and
//! by whether the rewritten text gives dosing instructions.

use crate::compile;
use medexplain_core::{ConfigError, FlagConfig, TermSample};
use regex::Regex;

pub struct TermFlagger {
    misunderstood_letters: usize,
    explained_misunderstood_chars: usize,
    term_usage: Regex,
    text_usage: Regex,
}

impl TermFlagger {
    pub fn from_config(config: &FlagConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            misunderstood_letters: config.misunderstood_letters,
            explained_misunderstood_chars: config.explained_misunderstood_chars,
            term_usage: compile(&config.term_usage_pattern)?,
            text_usage: compile(&config.text_usage_pattern)?,
        })
    }

    /// Sample for a term found by the heuristic extractor
    pub fn heuristic_sample(&self, term: &str, score: f64) -> TermSample {
        let letters = term.chars().filter(|c| c.is_ascii_alphabetic()).count();
        TermSample::new(term, score).with_flags(
            letters > self.misunderstood_letters,
            self.term_usage.is_match(term),
        )
    }

    /// Sample for a term the generation service marked as explained
    pub fn explained_sample(&self, term: &str, score: f64, rewritten_text: &str) -> TermSample {
        TermSample::new(term, score).with_flags(
            term.chars().count() > self.explained_misunderstood_chars,
            self.has_usage_instructions(rewritten_text),
        )
    }

    pub fn has_usage_instructions(&self, text: &str) -> bool {
        self.text_usage.is_match(text)
    }
}

impl Default for TermFlagger {
    fn default() -> Self {
        Self::from_config(&FlagConfig::default()).expect("default flag patterns compile")
    }
}

/// Cheap keyword test for whether an input is about health at all
pub struct TopicGuard {
    keywords: Option<Regex>,
}

impl TopicGuard {
    pub fn new(keywords: &[String]) -> Result<Self, ConfigError> {
        let alternation = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");

        let keywords = if alternation.is_empty() {
            None
        } else {
            Some(compile(&format!("(?i){}", alternation))?)
        };
        Ok(Self { keywords })
    }

    /// Substring match, so "fevers" and "heartburn" count. An empty keyword
    /// list treats everything as medical.
    pub fn is_probably_medical(&self, text: &str) -> bool {
        match &self.keywords {
            Some(re) => re.is_match(text),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medexplain_core::OrchestratorConfig;

    #[test]
    fn test_heuristic_flags() {
        let flagger = TermFlagger::default();

        let sample = flagger.heuristic_sample("Hypertension", 0.0);
        assert!(sample.misunderstood);
        assert!(!sample.usage_instruction);

        let sample = flagger.heuristic_sample("Lisinopril 10mg", 0.0);
        // "Lisinoprilmg" has 12 letters
        assert!(sample.misunderstood);
        assert!(sample.usage_instruction);

        let sample = flagger.heuristic_sample("daily", 2.5);
        assert!(!sample.misunderstood);
        assert!(sample.usage_instruction);
        assert_eq!(sample.score, 2.5);
    }

    #[test]
    fn test_only_ascii_letters_count() {
        let flagger = TermFlagger::default();
        // twelve letters, eight of them ASCII
        assert!(!flagger.heuristic_sample("Ménière-Ödème", 0.0).misunderstood);
        assert!(flagger.heuristic_sample("Meniere-Odeme-x", 0.0).misunderstood);
    }

    #[test]
    fn test_explained_flags_use_rewritten_text() {
        let flagger = TermFlagger::default();
        let text = "Take Lisinopril 10mg every day.";

        let sample = flagger.explained_sample("Lisinopril 10mg", 3.0, text);
        assert!(sample.misunderstood);
        assert!(sample.usage_instruction);

        let sample = flagger.explained_sample("Asthma", 3.0, "Asthma makes breathing hard.");
        assert!(!sample.misunderstood);
        assert!(!sample.usage_instruction);
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let config = FlagConfig {
            text_usage_pattern: "(unclosed".to_string(),
            ..FlagConfig::default()
        };
        assert!(matches!(
            TermFlagger::from_config(&config),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_topic_guard() {
        let guard = TopicGuard::new(&OrchestratorConfig::default().medical_keywords).unwrap();
        assert!(guard.is_probably_medical("I was diagnosed with a rare SYNDROME"));
        assert!(guard.is_probably_medical("persistent fevers at night"));
        assert!(!guard.is_probably_medical("What is the capital of France?"));

        let permissive = TopicGuard::new(&[]).unwrap();
        assert!(permissive.is_probably_medical("anything at all"));
    }
}
