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

//! # MedExplain Analysis
//!
//! Text-side heuristics of the term analytics engine. Everything here is
//! synchronous and side-effect free apart from `tracing` diagnostics.
//!
//! - [`SyllableEstimator`]: spelling-based syllable approximation
//! - [`ReadabilityScorer`]: 0–10 simplicity score for rewritten text
//! - [`TermExtractor`]: union of independent [`TermMatcher`] heuristics
//! - [`brackets`]: the `[[term]]` channel the generation service marks
//!   explained terms with
//! - [`TermFlagger`] / [`TopicGuard`]: per-term flags and the off-topic check
//! - [`ResponseAssembler`]: tolerant reassembly of line-delimited JSON frames

pub mod assembler;
pub mod brackets;
pub mod extractor;
pub mod flags;
pub mod readability;
pub mod syllable;

pub use assembler::{Assembly, EmptyGeneration, MalformedFragment, ResponseAssembler};
pub use brackets::{extract_bracketed, strip_brackets, CapitalizedFallback};
pub use extractor::{
    DosageMatcher, LexiconMatcher, LongWordMatcher, PhraseMatcher, TermExtractor, TermMatcher,
};
pub use flags::{TermFlagger, TopicGuard};
pub use readability::{ReadabilityBreakdown, ReadabilityScorer};
pub use syllable::SyllableEstimator;

use medexplain_core::ConfigError;
use regex::Regex;

/// Compile a configured pattern, reporting the offending pattern on failure
pub(crate) fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Case-insensitive whole-word (or whole-phrase) matcher for a literal
pub(crate) fn whole_word(literal: &str) -> Result<Regex, ConfigError> {
    compile(&format!(r"(?i)\b{}\b", regex::escape(literal)))
}
