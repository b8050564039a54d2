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

//! Term store backend contract and the persisted row format

use chrono::{DateTime, Utc};
use medexplain_core::{TermMap, TermRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Persistence failures
///
/// Confined to the analytics side channel: callers log them and carry on.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt term table: {0}")]
    Corrupt(String),
}

/// Whole-table persistence backend
///
/// Implementations move complete tables. Merge semantics belong to
/// [`crate::TermLedger`]; exclusion between writers belongs to the backend,
/// through [`TermStore::transact`].
pub trait TermStore: Send + Sync {
    /// Read the full table. A store with no prior data returns an empty map.
    fn load_all(&self) -> Result<TermMap, StoreError>;

    /// Replace the stored table with `map`.
    fn save_all(&self, map: &TermMap) -> Result<(), StoreError>;

    /// Load, let `apply` edit the table, and save it if `apply` returns
    /// true, excluding every other writer of the same table for the whole
    /// cycle.
    ///
    /// The default only suits backends with a single owner; shared backends
    /// override it.
    fn transact(
        &self,
        apply: &mut dyn FnMut(&mut TermMap) -> bool,
    ) -> Result<(), StoreError> {
        let mut map = self.load_all()?;
        if apply(&mut map) {
            self.save_all(&map)?;
        }
        Ok(())
    }

    /// Short human-readable location for logs
    fn describe(&self) -> String;
}

/// One row of the persisted table
///
/// Column names are the ones external reporting tools read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRow {
    pub term: String,
    #[serde(rename = "usagecount")]
    pub usage_count: u64,
    #[serde(rename = "simpScore")]
    pub simp_score: f64,
    pub misunderstood: u8,
    #[serde(rename = "usageInstr")]
    pub usage_instr: u8,
    pub timestamp: DateTime<Utc>,
}

impl From<&TermRecord> for TermRow {
    fn from(r: &TermRecord) -> Self {
        Self {
            term: r.term.clone(),
            usage_count: r.usage_count,
            simp_score: r.simplicity_score,
            misunderstood: u8::from(r.misunderstood),
            usage_instr: u8::from(r.usage_instruction),
            timestamp: r.timestamp,
        }
    }
}

impl TermRow {
    /// Read one row as tolerantly as external tools write them.
    ///
    /// Flags accept 0/1, booleans and their string forms; numbers may be
    /// strings; a missing or unparseable timestamp becomes now. Only a row
    /// without a usable term or score is rejected.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let obj = value.as_object().ok_or("row is not an object")?;

        let term = match obj.get("term") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err("missing term".to_string()),
        };

        let simp_score = match obj.get("simpScore") {
            None | Some(Value::Null) => 0.0,
            Some(v) => number(v).ok_or_else(|| format!("unreadable simpScore {}", v))?,
        };

        let usage_count = obj
            .get("usagecount")
            .and_then(number)
            .filter(|n| *n >= 1.0)
            .map(|n| n.round() as u64)
            .unwrap_or(1);

        let timestamp = obj
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Self {
            term,
            usage_count,
            simp_score,
            misunderstood: u8::from(obj.get("misunderstood").map_or(false, flag)),
            usage_instr: u8::from(obj.get("usageInstr").map_or(false, flag)),
            timestamp,
        })
    }

    fn into_record(self) -> TermRecord {
        let normalized_key = medexplain_core::normalize_key(&self.term);
        TermRecord {
            term: self.term.trim().to_string(),
            normalized_key,
            usage_count: self.usage_count.max(1),
            simplicity_score: self.simp_score,
            misunderstood: self.misunderstood != 0,
            usage_instruction: self.usage_instr != 0,
            timestamp: self.timestamp,
        }
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        ),
        _ => false,
    }
}

/// Salvage every readable row; the rest are logged and dropped
pub fn parse_rows(values: &[Value]) -> Vec<TermRow> {
    values
        .iter()
        .enumerate()
        .filter_map(|(idx, value)| match TermRow::from_value(value) {
            Ok(row) => Some(row),
            Err(reason) => {
                warn!("Dropping term table row {}: {}", idx + 1, reason);
                None
            }
        })
        .collect()
}

/// Rows in table order (by normalized key)
pub fn map_to_rows(map: &TermMap) -> Vec<TermRow> {
    map.values().map(TermRow::from).collect()
}

/// Rebuild the keyed table from persisted rows.
///
/// Rows with a blank term are dropped. Rows whose terms normalize to the same
/// key (hand-edited tables) are folded together with a count-weighted mean so
/// the running-average invariant survives.
pub fn rows_to_map(rows: Vec<TermRow>) -> TermMap {
    let mut map = TermMap::new();

    for row in rows {
        if row.term.trim().is_empty() {
            warn!("Dropping term table row with blank term");
            continue;
        }
        if !row.simp_score.is_finite() {
            warn!("Dropping term table row '{}' with non-finite score", row.term);
            continue;
        }

        let record = row.into_record();
        match map.get_mut(&record.normalized_key) {
            Some(existing) => {
                warn!(
                    "Duplicate rows for term '{}', folding into one record",
                    record.normalized_key
                );
                let total = existing.usage_count + record.usage_count;
                existing.simplicity_score = (existing.simplicity_score
                    * existing.usage_count as f64
                    + record.simplicity_score * record.usage_count as f64)
                    / total as f64;
                existing.usage_count = total;
                if record.timestamp >= existing.timestamp {
                    existing.term = record.term;
                    existing.misunderstood = record.misunderstood;
                    existing.usage_instruction = record.usage_instruction;
                    existing.timestamp = record.timestamp;
                }
            }
            None => {
                map.insert(record.normalized_key.clone(), record);
            }
        }
    }

    map
}
