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

//! Error taxonomy for the analytics engine
//!
//! Only failures that change the user-visible answer are surfaced as
//! [`EngineError`]. Malformed stream fragments and invalid merge entries are
//! recovered where they happen and only travel as diagnostic values.

use thiserror::Error;

/// Failures that abort a simplification request
#[derive(Debug, Error)]
pub enum EngineError {
    /// Transport or service failure calling the generation backend
    #[error("Generation service unavailable: {0}")]
    GenerationUnavailable(String),

    /// The service answered but nothing usable could be assembled
    #[error("Generation service returned no usable content ({skipped} fragment(s) skipped)")]
    EmptyGeneration { skipped: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A merge sample that cannot be applied to the term table
///
/// Skipped by the batch that contains it; never fatal.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid term entry: {reason}")]
pub struct InvalidTermEntry {
    pub reason: String,
}

impl InvalidTermEntry {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
