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

//! Spelling-based syllable estimate
//!
//! Heuristic only: no dictionary, no failure path, always at least 1.

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u', 'y'];

fn is_vowel(c: char) -> bool {
    VOWELS.contains(&c)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyllableEstimator;

impl SyllableEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Approximate syllable count of a single word
    pub fn estimate(&self, word: &str) -> u32 {
        let letters: String = word
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        if letters.len() <= 3 {
            return 1;
        }

        let stem = strip_silent_suffix(&letters);
        let stem = stem.strip_prefix('y').unwrap_or(stem);

        count_vowel_groups(stem).max(1)
    }
}

/// Drop a trailing `es`/`ed`, or a silent `e`, when preceded by a consonant
fn strip_silent_suffix(word: &str) -> &str {
    let consonant_before = |stem: &str| stem.chars().last().is_some_and(|c| !is_vowel(c));

    for suffix in ["es", "ed"] {
        if let Some(stem) = word.strip_suffix(suffix) {
            if consonant_before(stem) {
                return stem;
            }
        }
    }
    if let Some(stem) = word.strip_suffix('e') {
        if consonant_before(stem) {
            return stem;
        }
    }
    word
}

/// Count non-overlapping groups of one or two vowels
fn count_vowel_groups(word: &str) -> u32 {
    let chars: Vec<char> = word.chars().collect();
    let mut count = 0;
    let mut i = 0;
    while i < chars.len() {
        if is_vowel(chars[i]) {
            count += 1;
            i += if chars.get(i + 1).copied().is_some_and(is_vowel) {
                2
            } else {
                1
            };
        } else {
            i += 1;
        }
    }
    count
}
