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

//! Candidate term extraction
//!
//! A pipeline of independent [`TermMatcher`]s, each casting its own net over
//! the text. Results are unioned into one set, deduplicated by exact string
//! (case as matched), so no single matcher has to be authoritative.

use crate::{compile, whole_word};
use medexplain_core::{ConfigError, ExtractionConfig};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// One extraction heuristic
pub trait TermMatcher: Send + Sync {
    /// Identifier used in diagnostics
    fn name(&self) -> &'static str;

    /// Add every term this heuristic finds in `text` to `found`
    fn find(&self, text: &str, found: &mut BTreeSet<String>);
}

/// Known clinical and administrative words, matched whole-word and
/// case-insensitively; every occurrence is kept as spelled in the text.
pub struct LexiconMatcher {
    patterns: Vec<Regex>,
}

impl LexiconMatcher {
    pub fn new(known_terms: &[String]) -> Result<Self, ConfigError> {
        let patterns = known_terms
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| whole_word(t.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }
}

impl TermMatcher for LexiconMatcher {
    fn name(&self) -> &'static str {
        "lexicon"
    }

    fn find(&self, text: &str, found: &mut BTreeSet<String>) {
        for re in &self.patterns {
            found.extend(re.find_iter(text).map(|m| m.as_str().to_string()));
        }
    }
}

/// Multi-word clinical phrases; only the first match of each pattern is kept
pub struct PhraseMatcher {
    patterns: Vec<Regex>,
}

impl PhraseMatcher {
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| compile(&format!("(?i){}", p)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }
}

impl TermMatcher for PhraseMatcher {
    fn name(&self) -> &'static str {
        "phrase"
    }

    fn find(&self, text: &str, found: &mut BTreeSet<String>) {
        for re in &self.patterns {
            if let Some(m) = re.find(text) {
                found.insert(m.as_str().to_string());
            }
        }
    }
}

/// Capitalized drug name followed by a dose, e.g. "Aspirin 81mg"
pub struct DosageMatcher {
    pattern: Regex,
}

impl DosageMatcher {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: compile(pattern)?,
        })
    }
}

impl TermMatcher for DosageMatcher {
    fn name(&self) -> &'static str {
        "dosage"
    }

    fn find(&self, text: &str, found: &mut BTreeSet<String>) {
        found.extend(self.pattern.find_iter(text).map(|m| m.as_str().to_string()));
    }
}

/// Long alphabetic tokens that are not already lexicon entries
pub struct LongWordMatcher {
    pattern: Regex,
    known: HashSet<String>,
}

impl LongWordMatcher {
    pub fn new(min_len: usize, known_terms: &[String]) -> Result<Self, ConfigError> {
        if min_len == 0 {
            return Err(ConfigError::Invalid(
                "extraction.long_word_min_len must be positive".to_string(),
            ));
        }
        Ok(Self {
            pattern: compile(&format!(r"\b[a-zA-Z]{{{},}}\b", min_len))?,
            known: known_terms.iter().map(|t| t.trim().to_lowercase()).collect(),
        })
    }
}

impl TermMatcher for LongWordMatcher {
    fn name(&self) -> &'static str {
        "long_word"
    }

    fn find(&self, text: &str, found: &mut BTreeSet<String>) {
        for m in self.pattern.find_iter(text) {
            if !self.known.contains(&m.as_str().to_lowercase()) {
                found.insert(m.as_str().to_string());
            }
        }
    }
}

/// Runs every matcher and unions the results
pub struct TermExtractor {
    matchers: Vec<Box<dyn TermMatcher>>,
}

impl Default for TermExtractor {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default()).expect("default extraction patterns compile")
    }
}

impl TermExtractor {
    /// The four standard heuristics built from configuration
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_matchers(vec![
            Box::new(LexiconMatcher::new(&config.known_terms)?),
            Box::new(PhraseMatcher::new(&config.phrase_patterns)?),
            Box::new(DosageMatcher::new(&config.dosage_pattern)?),
            Box::new(LongWordMatcher::new(
                config.long_word_min_len,
                &config.known_terms,
            )?),
        ]))
    }

    pub fn with_matchers(matchers: Vec<Box<dyn TermMatcher>>) -> Self {
        Self { matchers }
    }

    pub fn matcher_names(&self) -> Vec<&'static str> {
        self.matchers.iter().map(|m| m.name()).collect()
    }

    /// Distinct candidate terms in `text`; empty when nothing matched
    pub fn extract(&self, text: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        for matcher in &self.matchers {
            let before = found.len();
            matcher.find(text, &mut found);
            debug!("{} matcher added {} term(s)", matcher.name(), found.len() - before);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dosage_and_lexicon() {
        let extractor = TermExtractor::default();
        let terms = extractor.extract("Take Aspirin 81mg daily");
        assert!(terms.contains("Aspirin 81mg"));
        assert!(terms.contains("daily"));
    }

    #[test]
    fn test_patient_sentence() {
        let extractor = TermExtractor::default();
        let terms = extractor.extract("Patient has Hypertension and should take Lisinopril 10mg daily");

        assert_eq!(
            terms,
            set(&["Hypertension", "Lisinopril 10mg", "Lisinopril", "daily"])
        );
    }

    #[test]
    fn test_lexicon_keeps_every_spelling() {
        let extractor = TermExtractor::default();
        let terms = extractor.extract("Fever at night. The fever broke by morning.");
        assert!(terms.contains("Fever"));
        assert!(terms.contains("fever"));
        assert!(terms.contains("night"));
        assert!(terms.contains("morning"));
    }

    #[test]
    fn test_lexicon_whole_words_only() {
        let extractor = TermExtractor::default();
        // "rest" inside "arrested", "plan" inside "planet"
        let terms = extractor.extract("arrested planet");
        assert!(terms.is_empty());
    }

    #[test]
    fn test_phrase_first_match_only() {
        let matcher = PhraseMatcher::new(&["blood pressure".to_string()]).unwrap();
        let mut found = BTreeSet::new();
        matcher.find("Blood pressure was high; blood pressure later normal.", &mut found);
        assert_eq!(found, set(&["Blood pressure"]));
    }

    #[test]
    fn test_phrase_patterns() {
        let extractor = TermExtractor::default();
        let terms = extractor.extract("History of type 2 diabetes and post-traumatic stress.");
        assert!(terms.contains("type 2 diabetes"));
        assert!(terms.contains("post-traumatic stress"));
        assert!(terms.contains("diabetes"));
    }

    #[test]
    fn test_long_word_skips_known_terms() {
        let extractor = TermExtractor::default();
        let terms = extractor.extract("Auscultation revealed bronchospasm");
        // lexicon hit; the long-word matcher skips known terms
        assert!(terms.contains("Auscultation"));
        assert!(terms.contains("bronchospasm"));
        assert_eq!(terms.len(), 2);
    }

    #[test]
    fn test_nothing_found() {
        let extractor = TermExtractor::default();
        assert!(extractor.extract("I like green apples.").is_empty());
        assert!(extractor.extract("").is_empty());
    }

    #[test]
    fn test_small_fixture_config() {
        let config = ExtractionConfig {
            known_terms: vec!["rash".to_string()],
            phrase_patterns: vec![],
            long_word_min_len: 12,
            ..ExtractionConfig::default()
        };
        let extractor = TermExtractor::from_config(&config).unwrap();
        let terms = extractor.extract("A rash and a headache, cough too.");
        assert_eq!(terms, set(&["rash"]));
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let err = PhraseMatcher::new(&["(unclosed".to_string()]).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_matcher_names() {
        assert_eq!(
            TermExtractor::default().matcher_names(),
            vec!["lexicon", "phrase", "dosage", "long_word"]
        );
    }
}
