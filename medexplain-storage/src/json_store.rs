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

//! JSON file backend
//!
//! The table lives in one JSON array of rows. Saves write a uniquely named
//! sibling temp file and rename it over the table, so readers never observe
//! a half-written table.
//!
//! Writers are excluded per table, not per handle: a process-wide lock keyed
//! on the canonical table path covers every `JsonTermStore` in this process,
//! and an advisory lock on `<table>.lock` covers other processes.

use crate::store::{map_to_rows, parse_rows, rows_to_map, StoreError, TermStore};
use fd_lock::RwLock as FileLock;
use lazy_static::lazy_static;
use medexplain_core::{StorageConfig, TermMap};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

lazy_static! {
    static ref TABLE_LOCKS: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>> = Mutex::new(HashMap::new());
}

fn table_lock(key: &Path) -> Arc<Mutex<()>> {
    let mut locks = TABLE_LOCKS.lock();
    Arc::clone(locks.entry(key.to_path_buf()).or_default())
}

/// `<path>` with `suffix` appended to the full file name
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// File-backed term table
#[derive(Debug, Clone)]
pub struct JsonTermStore {
    path: PathBuf,
    keep_backup: bool,
}

impl JsonTermStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            keep_backup: true,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            path: config.table_path(),
            keep_backup: config.keep_backup,
        }
    }

    pub fn with_backup(mut self, keep_backup: bool) -> Self {
        self.keep_backup = keep_backup;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, ".bak")
    }

    fn lock_path(&self) -> PathBuf {
        sibling(&self.path, ".lock")
    }

    fn parent_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    fn ensure_parent(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.parent_dir() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
                info!("Created term table directory: {:?}", parent);
            }
        }
        Ok(())
    }

    /// Identity of the table regardless of how its path was spelled
    fn canonical_path(&self) -> PathBuf {
        let dir = self.parent_dir().unwrap_or_else(|| Path::new("."));
        match (dir.canonicalize(), self.path.file_name()) {
            (Ok(dir), Some(name)) => dir.join(name),
            _ => self.path.clone(),
        }
    }
}

impl TermStore for JsonTermStore {
    fn load_all(&self) -> Result<TermMap, StoreError> {
        if !self.path.exists() {
            debug!("Term table {:?} not found, starting empty", self.path);
            return Ok(TermMap::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(TermMap::new());
        }

        let values: Vec<Value> = serde_json::from_str(&content).map_err(|e| {
            StoreError::Corrupt(format!("{}: {}", self.path.display(), e))
        })?;

        Ok(rows_to_map(parse_rows(&values)))
    }

    fn save_all(&self, map: &TermMap) -> Result<(), StoreError> {
        self.ensure_parent()?;

        if self.keep_backup && self.path.exists() {
            if let Err(e) = fs::copy(&self.path, self.backup_path()) {
                warn!("Failed to back up term table: {}", e);
            }
        }

        let dir = self.parent_dir().unwrap_or_else(|| Path::new("."));
        let temp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, &map_to_rows(map))?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn transact(
        &self,
        apply: &mut dyn FnMut(&mut TermMap) -> bool,
    ) -> Result<(), StoreError> {
        self.ensure_parent()?;

        let in_process = table_lock(&self.canonical_path());
        let _in_process = in_process.lock();

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())?;
        let mut file_lock = FileLock::new(lock_file);
        let _across_processes = file_lock.write()?;

        let mut map = self.load_all()?;
        if apply(&mut map) {
            self.save_all(&map)?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
