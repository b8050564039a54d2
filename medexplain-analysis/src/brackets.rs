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

//! The `[[term]]` channel
//!
//! The generation service wraps every term it explains in double brackets.
//! Those spans are an explicit extraction source, handled apart from the
//! heuristic matchers, and are removed before text reaches the reader.

use crate::compile;
use lazy_static::lazy_static;
use medexplain_core::ConfigError;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    static ref BRACKETED: Regex = Regex::new(r"\[\[([^\]]+)\]\]").unwrap();
}

/// Distinct trimmed terms marked with `[[...]]`
pub fn extract_bracketed(text: &str) -> BTreeSet<String> {
    BRACKETED
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Remove every `[[` and `]]` marker, keeping the enclosed text
pub fn strip_brackets(text: &str) -> String {
    text.replace("[[", "").replace("]]", "")
}

/// Safety net used when a rewrite marks no terms: capitalized words of the
/// original input.
pub struct CapitalizedFallback {
    pattern: Regex,
}

impl CapitalizedFallback {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: compile(pattern)?,
        })
    }

    pub fn find(&self, text: &str) -> BTreeSet<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medexplain_core::ExtractionConfig;

    #[test]
    fn test_extract_bracketed() {
        let terms = extract_bracketed(
            "[[Hypertension]] means high blood pressure. Take [[ Lisinopril 10mg ]] daily. [[Hypertension]] again.",
        );
        let expected: BTreeSet<String> = ["Hypertension", "Lisinopril 10mg"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(terms, expected);
    }

    #[test]
    fn test_unclosed_and_blank_brackets_ignored() {
        assert!(extract_bracketed("[[ ]] and [[open").is_empty());
        assert!(extract_bracketed("plain text").is_empty());
    }

    #[test]
    fn test_strip_brackets() {
        let clean = strip_brackets("[[Hypertension]] means high blood pressure.");
        assert_eq!(clean, "Hypertension means high blood pressure.");
        assert!(!strip_brackets("a ]] b [[ c").contains("[["));
    }

    #[test]
    fn test_capitalized_fallback() {
        let fallback = CapitalizedFallback::new(&ExtractionConfig::default().capitalized_pattern)
            .unwrap();
        let found = fallback.find("Patient with Long-COVID saw Dr Smith");
        assert!(found.contains("Patient"));
        assert!(found.contains("Long-COVID"));
        assert!(found.contains("Smith"));
        // three letters or fewer after the capital is too short
        assert!(!found.contains("Dr"));
        assert!(!found.contains("with"));
    }
}
