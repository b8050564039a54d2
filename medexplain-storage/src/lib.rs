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

//! MedExplain Storage Layer
//!
//! Durable term table for the analytics engine.
//!
//! ## Architecture
//!
//! - [`TermStore`]: whole-table load/save backend (JSON file or in-memory)
//! - [`TermLedger`]: the single writer. Every batch runs load → merge → save
//!   under one lock so concurrent callers never lose an update to
//!   last-writer-wins.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medexplain_core::TermSample;
//! use medexplain_storage::{JsonTermStore, TermLedger};
//! use std::sync::Arc;
//!
//! let ledger = TermLedger::new(Arc::new(JsonTermStore::new("./dataanalytics/medical_terms.json")));
//! let report = ledger.merge_batch(&[TermSample::new("Fever", 5.0)])?;
//! ```

pub mod json_store;
pub mod ledger;
pub mod memory_store;
pub mod store;

pub use json_store::JsonTermStore;
pub use ledger::{merge_one, samples_from_json, MergeReport, TermLedger, TermOrder};
pub use memory_store::MemoryTermStore;
pub use store::{map_to_rows, parse_rows, rows_to_map, StoreError, TermRow, TermStore};
