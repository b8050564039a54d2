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

//! # MedExplain Engine
//!
//! Ties the analysis heuristics and the term ledger to a generation backend.
//! [`Simplifier::simplify`] is the single entry point callers use: it
//! records intake statistics, asks the backend for a plain-language rewrite,
//! scores the answer and folds the results back into the ledger.

pub mod generation;
pub mod orchestrator;

pub use generation::{GenerationClient, GenerationError, OllamaClient};
pub use orchestrator::{AnalyticsOutcome, PassOutcome, Simplifier, SimplifyOutcome};
