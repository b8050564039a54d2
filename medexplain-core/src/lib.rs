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

//! MedExplain Core
//!
//! Shared data model for the term analytics engine: per-term aggregate
//! records, incoming merge samples, layered configuration and the error
//! taxonomy every other crate reports through.

pub mod config;
pub mod error;
pub mod term;

pub use config::{
    AssemblyMode, EngineConfig, ExtractionConfig, FlagConfig, GenerationConfig,
    OrchestratorConfig, ScoringConfig, StorageConfig,
};
pub use error::{ConfigError, EngineError, InvalidTermEntry, Result};
pub use term::{
    normalize_key, MergeAction, ScoringInput, TermMap, TermRecord, TermSample, MAX_SCORE, MIN_SCORE,
};
