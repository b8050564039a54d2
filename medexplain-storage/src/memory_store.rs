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

//! In-memory backend, for embedding and tests

use crate::store::{StoreError, TermStore};
use medexplain_core::TermMap;
use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct MemoryTermStore {
    table: RwLock<TermMap>,
}

impl MemoryTermStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing table
    pub fn with_table(table: TermMap) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }
}

impl TermStore for MemoryTermStore {
    fn load_all(&self) -> Result<TermMap, StoreError> {
        Ok(self.table.read().clone())
    }

    fn save_all(&self, map: &TermMap) -> Result<(), StoreError> {
        *self.table.write() = map.clone();
        Ok(())
    }

    fn transact(
        &self,
        apply: &mut dyn FnMut(&mut TermMap) -> bool,
    ) -> Result<(), StoreError> {
        let mut table = self.table.write();
        let mut map = table.clone();
        if apply(&mut map) {
            *table = map;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
