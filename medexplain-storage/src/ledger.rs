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

//! Serialized merge front for a term store
//!
//! Load → merge → save is not atomic at the backend level, so two callers
//! interleaving those steps would silently drop one caller's updates. Every
//! batch runs inside [`TermStore::transact`], which excludes writers of the
//! same table through any handle or process, and the ledger serializes its
//! own callers on top of that.

use crate::json_store::JsonTermStore;
use crate::store::{map_to_rows, StoreError, TermStore};
use chrono::Utc;
use medexplain_core::{
    normalize_key, InvalidTermEntry, MergeAction, StorageConfig, TermMap, TermRecord, TermSample,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Merge one sample into an in-memory table.
///
/// See [`TermSample::merge_into`] for the update rule.
pub fn merge_one(map: &mut TermMap, sample: &TermSample) -> Result<MergeAction, InvalidTermEntry> {
    sample.merge_into(map)
}

/// Read a JSON array of merge samples entry by entry.
///
/// Entries that do not deserialize come back as [`InvalidTermEntry`] instead
/// of failing the whole input; only input that is not a JSON array is an
/// error.
pub fn samples_from_json(json: &str) -> Result<(Vec<TermSample>, Vec<InvalidTermEntry>), StoreError> {
    let values: Vec<Value> = serde_json::from_str(json)?;
    let mut samples = Vec::with_capacity(values.len());
    let mut rejected = Vec::new();

    for (idx, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<TermSample>(value) {
            Ok(sample) => samples.push(sample),
            Err(e) => {
                let invalid = InvalidTermEntry::new(format!("entry {}: {}", idx + 1, e));
                warn!("Skipping term entry: {}", invalid);
                rejected.push(invalid);
            }
        }
    }

    Ok((samples, rejected))
}

/// Outcome of one committed batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub added: usize,
    pub updated: usize,
    /// Entries rejected individually; the rest of the batch still applied
    pub skipped: Vec<InvalidTermEntry>,
}

impl MergeReport {
    pub fn applied(&self) -> usize {
        self.added + self.updated
    }
}

/// Sort order for reporting queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermOrder {
    /// Most used first
    Usage,
    /// Lowest (hardest) simplicity score first
    Score,
    /// Most recently merged first
    Recent,
}

/// Single-writer access to a [`TermStore`]
pub struct TermLedger {
    store: Arc<dyn TermStore>,
    write_lock: Mutex<()>,
}

impl TermLedger {
    pub fn new(store: Arc<dyn TermStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Ledger over the JSON table described by `config`
    pub fn open(config: &StorageConfig) -> Self {
        Self::new(Arc::new(JsonTermStore::from_config(config)))
    }

    pub fn store(&self) -> &Arc<dyn TermStore> {
        &self.store
    }

    /// Read the full table
    pub fn load_all(&self) -> Result<TermMap, StoreError> {
        self.store.load_all()
    }

    /// Replace the full table
    pub fn save_all(&self, map: &TermMap) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        self.store.save_all(map)
    }

    /// Apply a batch as one load → merge-all → save cycle.
    ///
    /// Invalid entries are skipped and reported; they never fail the batch.
    /// An empty batch (or one where every entry was rejected) performs no
    /// write.
    pub fn merge_batch(&self, samples: &[TermSample]) -> Result<MergeReport, StoreError> {
        let mut report = MergeReport::default();
        if samples.is_empty() {
            return Ok(report);
        }

        let _guard = self.write_lock.lock();
        let mut total = 0;
        self.store.transact(&mut |map| {
            for sample in samples {
                match merge_one(map, sample) {
                    Ok(MergeAction::Inserted) => report.added += 1,
                    Ok(MergeAction::Updated) => report.updated += 1,
                    Err(invalid) => {
                        warn!("Skipping term entry: {}", invalid);
                        report.skipped.push(invalid);
                    }
                }
            }
            total = map.len();
            report.applied() > 0
        })?;

        info!(
            "Term table {}: +{} new | updated {} | skipped {} | total {}",
            self.store.describe(),
            report.added,
            report.updated,
            report.skipped.len(),
            total
        );

        Ok(report)
    }

    /// Merge a JSON array of samples (the `merge` input format).
    ///
    /// Unreadable entries are reported in `skipped` alongside entries the
    /// merge itself rejects; the rest of the input still applies.
    pub fn merge_json(&self, json: &str) -> Result<MergeReport, StoreError> {
        let (samples, rejected) = samples_from_json(json)?;
        let mut report = self.merge_batch(&samples)?;
        report.skipped.splice(0..0, rejected);
        Ok(report)
    }

    /// Look up one term by any spelling
    pub fn get(&self, term: &str) -> Result<Option<TermRecord>, StoreError> {
        let mut map = self.store.load_all()?;
        Ok(map.remove(&normalize_key(term)))
    }

    /// Reporting view of the table
    pub fn top_terms(&self, order: TermOrder, limit: usize) -> Result<Vec<TermRecord>, StoreError> {
        let mut records: Vec<TermRecord> = self.store.load_all()?.into_values().collect();

        match order {
            TermOrder::Usage => records.sort_by(|a, b| {
                b.usage_count
                    .cmp(&a.usage_count)
                    .then_with(|| a.normalized_key.cmp(&b.normalized_key))
            }),
            TermOrder::Score => records.sort_by(|a, b| {
                a.simplicity_score
                    .total_cmp(&b.simplicity_score)
                    .then_with(|| a.normalized_key.cmp(&b.normalized_key))
            }),
            TermOrder::Recent => records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        }

        records.truncate(limit);
        Ok(records)
    }

    /// Write a timestamped full copy of the table into `dir`
    /// (`medical_terms_YYYYMMDD_HHMMSS.json`). No merging happens.
    pub fn snapshot(&self, dir: &Path) -> Result<PathBuf, StoreError> {
        let map = {
            let _guard = self.write_lock.lock();
            self.store.load_all()?
        };

        fs::create_dir_all(dir)?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let mut path = dir.join(format!("medical_terms_{}.json", stamp));
        let mut suffix = 1;
        while path.exists() {
            path = dir.join(format!("medical_terms_{}_{}.json", stamp, suffix));
            suffix += 1;
        }

        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &map_to_rows(&map))?;
        writer.flush()?;

        info!("Term table snapshot: {:?} ({} rows)", path, map.len());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryTermStore;
    use proptest::prelude::*;

    fn ledger() -> TermLedger {
        TermLedger::new(Arc::new(MemoryTermStore::new()))
    }

    #[test]
    fn test_merge_batch_counts() {
        let ledger = ledger();
        let report = ledger
            .merge_batch(&[
                TermSample::new("Fever", 5.0),
                TermSample::new("cough", 3.0),
                TermSample::new("fever", 5.0),
            ])
            .unwrap();

        assert_eq!(report.added, 2);
        assert_eq!(report.updated, 1);
        assert!(report.skipped.is_empty());

        let fever = ledger.get("FEVER").unwrap().unwrap();
        assert_eq!(fever.usage_count, 2);
        assert_eq!(fever.simplicity_score, 5.0);
    }

    #[test]
    fn test_invalid_entry_does_not_fail_batch() {
        let ledger = ledger();
        let missing = TermSample {
            term: None,
            ..TermSample::new("", 0.0)
        };
        let report = ledger
            .merge_batch(&[missing, TermSample::new("rest", 6.0)])
            .unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(ledger.get("rest").unwrap().is_some());
    }

    #[test]
    fn test_merge_json_skips_unreadable_entries() {
        let ledger = ledger();
        let report = ledger
            .merge_json(
                r#"[
                    {"term":"Fever","simpScore":3,"misunderstood":1,"usageInstr":0},
                    {"term":"Rash","simpScore":"high"},
                    {"term":"Cough","simpScore":4},
                    {"simpScore":2}
                ]"#,
            )
            .unwrap();

        assert_eq!(report.added, 2);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.skipped[0].reason.starts_with("entry 2"));

        let fever = ledger.get("fever").unwrap().unwrap();
        assert!(fever.misunderstood);
        assert!(!fever.usage_instruction);
        assert_eq!(fever.simplicity_score, 3.0);
        assert!(ledger.get("cough").unwrap().is_some());
        assert!(ledger.get("rash").unwrap().is_none());
    }

    #[test]
    fn test_merge_json_rejects_non_array() {
        assert!(matches!(
            ledger().merge_json(r#"{"term":"Fever"}"#),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_top_terms_ordering() {
        let ledger = ledger();
        ledger
            .merge_batch(&[
                TermSample::new("daily", 8.0),
                TermSample::new("daily", 8.0),
                TermSample::new("daily", 8.0),
                TermSample::new("auscultation", 1.0),
                TermSample::new("cough", 4.0),
                TermSample::new("cough", 4.0),
            ])
            .unwrap();

        let by_usage = ledger.top_terms(TermOrder::Usage, 2).unwrap();
        assert_eq!(by_usage.len(), 2);
        assert_eq!(by_usage[0].normalized_key, "daily");
        assert_eq!(by_usage[1].normalized_key, "cough");

        let by_score = ledger.top_terms(TermOrder::Score, 10).unwrap();
        assert_eq!(by_score[0].normalized_key, "auscultation");
    }

    proptest! {
        #[test]
        fn prop_score_is_exact_running_mean(scores in prop::collection::vec(0.0f64..=10.0, 1..60)) {
            let ledger = ledger();
            for score in &scores {
                ledger.merge_batch(&[TermSample::new("Hypertension", *score)]).unwrap();
            }

            let record = ledger.get("hypertension").unwrap().unwrap();
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            prop_assert_eq!(record.usage_count, scores.len() as u64);
            prop_assert!((record.simplicity_score - mean).abs() < 1e-9);
        }
    }
}
