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

//! Term records and merge samples
//!
//! A [`TermRecord`] is the persisted aggregate for one normalized term. Its
//! `simplicity_score` is the exact running mean of every sample score merged
//! into it, maintained incrementally:
//!
//! ```text
//! avg_new = (avg_old * count_old + s_new) / (count_old + 1)
//! ```

use crate::error::InvalidTermEntry;
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Lowest simplicity score
pub const MIN_SCORE: f64 = 0.0;

/// Highest simplicity score
pub const MAX_SCORE: f64 = 10.0;

/// Full term table keyed by normalized term
pub type TermMap = BTreeMap<String, TermRecord>;

/// Merge identity of a term: trimmed and lowercased
pub fn normalize_key(term: &str) -> String {
    term.trim().to_lowercase()
}

/// Aggregate statistics for one normalized term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRecord {
    /// Display spelling from the most recent merge (trimmed)
    pub term: String,
    pub normalized_key: String,
    /// Number of samples merged so far (always >= 1)
    pub usage_count: u64,
    /// Cumulative mean of every merged score
    pub simplicity_score: f64,
    pub misunderstood: bool,
    pub usage_instruction: bool,
    /// Time of the last merge
    pub timestamp: DateTime<Utc>,
}

impl TermRecord {
    /// First record for a term, built from a validated sample
    fn first(term: &str, key: String, score: f64, sample: &TermSample) -> Self {
        Self {
            term: term.to_string(),
            normalized_key: key,
            usage_count: 1,
            simplicity_score: score,
            misunderstood: sample.misunderstood,
            usage_instruction: sample.usage_instruction,
            timestamp: sample.timestamp,
        }
    }

    /// Fold one more sample into the running mean and overwrite the
    /// last-merge fields.
    fn absorb(&mut self, term: &str, score: f64, sample: &TermSample) {
        let old_count = self.usage_count as f64;
        self.simplicity_score = (self.simplicity_score * old_count + score) / (old_count + 1.0);
        self.usage_count += 1;
        self.term = term.to_string();
        self.misunderstood = sample.misunderstood;
        self.usage_instruction = sample.usage_instruction;
        self.timestamp = sample.timestamp;
    }

    /// Score rounded to two decimals for display and export
    pub fn display_score(&self) -> f64 {
        (self.simplicity_score * 100.0).round() / 100.0
    }
}

/// What a single merge did to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    Inserted,
    Updated,
}

/// One incoming observation of a term
///
/// `term` is optional so that externally supplied batches (JSON files, other
/// callers) can carry entries that are then rejected individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermSample {
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default, alias = "simpScore")]
    pub score: f64,
    #[serde(default, deserialize_with = "flag")]
    pub misunderstood: bool,
    #[serde(default, alias = "usageInstr", deserialize_with = "flag")]
    pub usage_instruction: bool,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// 0/1 flags as the term table writes them, or plain booleans
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(n) => Ok(n != 0),
        Flag::Float(n) => Ok(n != 0.0),
        Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" | "" => Ok(false),
            other => Err(de::Error::custom(format!("invalid flag value '{}'", other))),
        },
    }
}

impl TermSample {
    pub fn new(term: impl Into<String>, score: f64) -> Self {
        Self {
            term: Some(term.into()),
            score,
            misunderstood: false,
            usage_instruction: false,
            timestamp: Utc::now(),
        }
    }

    pub fn with_flags(mut self, misunderstood: bool, usage_instruction: bool) -> Self {
        self.misunderstood = misunderstood;
        self.usage_instruction = usage_instruction;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Merge this sample into `map`.
    ///
    /// Inserts a fresh record (`usage_count = 1`, score = sample score) or
    /// updates the running mean of an existing one. Samples without a term,
    /// with a blank term or with a non-finite score are rejected and leave
    /// the map untouched. Scores outside [0, 10] are clamped.
    pub fn merge_into(&self, map: &mut TermMap) -> Result<MergeAction, InvalidTermEntry> {
        let term = match self.term.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            Some(_) => return Err(InvalidTermEntry::new("term is blank")),
            None => return Err(InvalidTermEntry::new("missing field `term`")),
        };
        if !self.score.is_finite() {
            return Err(InvalidTermEntry::new(format!(
                "score for '{}' is not a finite number",
                term
            )));
        }
        let score = self.score.clamp(MIN_SCORE, MAX_SCORE);
        let key = normalize_key(term);

        match map.get_mut(&key) {
            Some(record) => {
                record.absorb(term, score, self);
                Ok(MergeAction::Updated)
            }
            None => {
                map.insert(key.clone(), TermRecord::first(term, key, score, self));
                Ok(MergeAction::Inserted)
            }
        }
    }
}

/// Per-request scoring context; never persisted
#[derive(Debug, Clone, Default)]
pub struct ScoringInput {
    pub raw_text: String,
    pub rewritten_text: String,
    pub bracketed_terms: BTreeSet<String>,
}

impl ScoringInput {
    pub fn bracketed_count(&self) -> usize {
        self.bracketed_terms.len()
    }
}
