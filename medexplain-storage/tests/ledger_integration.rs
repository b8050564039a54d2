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

//! Integration tests for the JSON-backed term ledger

use medexplain_core::{StorageConfig, TermSample};
use medexplain_storage::{JsonTermStore, TermLedger, TermStore};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn json_ledger(dir: &TempDir) -> Arc<TermLedger> {
    let store = JsonTermStore::new(dir.path().join("medical_terms.json"));
    Arc::new(TermLedger::new(Arc::new(store)))
}

/// Two simultaneous batches for the same term must both land
#[test]
fn test_concurrent_batches_keep_both_updates() {
    let dir = TempDir::new().unwrap();
    let ledger = json_ledger(&dir);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [2.0, 6.0]
        .into_iter()
        .map(|score| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ledger
                    .merge_batch(&[TermSample::new("Fever", score)])
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let record = ledger.get("fever").unwrap().unwrap();
    assert_eq!(record.usage_count, 2);
    assert!((record.simplicity_score - 4.0).abs() < 1e-9);
}

#[test]
fn test_many_writers_no_lost_updates() {
    let dir = TempDir::new().unwrap();
    let ledger = json_ledger(&dir);
    let threads = 8;
    let rounds = 20;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..rounds {
                    ledger
                        .merge_batch(&[
                            TermSample::new("daily", (i % 10) as f64),
                            TermSample::new(format!("term-{}", i), 5.0),
                        ])
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let table = ledger.load_all().unwrap();
    assert_eq!(table["daily"].usage_count, (threads * rounds) as u64);
    for i in 0..threads {
        assert_eq!(table[&format!("term-{}", i)].usage_count, rounds as u64);
    }

    // Mean of i in 0..8, each repeated equally often
    let expected = (0..threads).map(|i| i as f64).sum::<f64>() / threads as f64;
    assert!((table["daily"].simplicity_score - expected).abs() < 1e-9);
}

/// Separately opened ledgers on one table file must still serialize
#[test]
fn test_independent_ledgers_share_one_writer_lock() {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig {
        data_dir: dir.path().to_path_buf(),
        ..StorageConfig::default()
    };
    let threads = 8;
    let rounds = 25;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            // odd threads reach the table through a differently spelled path
            let ledger = if i % 2 == 0 {
                TermLedger::open(&config)
            } else {
                let path = dir.path().join(".").join("medical_terms.json");
                TermLedger::new(Arc::new(JsonTermStore::new(path)))
            };
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..rounds {
                    ledger.merge_batch(&[TermSample::new("fever", 5.0)]).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let table = TermLedger::open(&config).load_all().unwrap();
    assert_eq!(table["fever"].usage_count, (threads * rounds) as u64);
    assert_eq!(table["fever"].simplicity_score, 5.0);
}

#[test]
fn test_table_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let ledger = json_ledger(&dir);
        ledger
            .merge_batch(&[TermSample::new("Lisinopril 10mg", 3.0).with_flags(true, true)])
            .unwrap();
    }

    let reopened = JsonTermStore::new(dir.path().join("medical_terms.json"));
    let table = reopened.load_all().unwrap();
    let record = &table["lisinopril 10mg"];
    assert_eq!(record.term, "Lisinopril 10mg");
    assert!(record.misunderstood);
    assert!(record.usage_instruction);
}

#[test]
fn test_snapshot_writes_timestamped_copy() {
    let dir = TempDir::new().unwrap();
    let ledger = json_ledger(&dir);
    ledger
        .merge_batch(&[TermSample::new("cough", 4.0), TermSample::new("fever", 2.0)])
        .unwrap();

    let out = dir.path().join("exports");
    let first = ledger.snapshot(&out).unwrap();
    let second = ledger.snapshot(&out).unwrap();

    assert_ne!(first, second);
    let name = first.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("medical_terms_"));
    assert!(name.ends_with(".json"));

    let rows: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(&first).unwrap()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["term"], "cough");
    assert_eq!(rows[0]["usagecount"], 1);
}
