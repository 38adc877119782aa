//! In-process registry backend.
//!
//! Rows live in a map per table. Ids are assigned per table starting at 1,
//! like an autoincrement key, and are never reused.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{Backend, NewRow, StoredRow};
use crate::errors::Result;
use crate::mapping::StorageMapping;

static NEXT_MEMORY_KEY: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct MemoryTable {
    last_id: i64,
    rows: BTreeMap<i64, StoredRow>,
}

#[derive(Debug)]
pub struct MemoryBackend {
    key: String,
    mapping: Arc<dyn StorageMapping>,
    tables: Mutex<HashMap<String, MemoryTable>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new(mapping: Arc<dyn StorageMapping>) -> Self {
        let n = NEXT_MEMORY_KEY.fetch_add(1, Ordering::Relaxed);
        Self {
            key: format!("memory-{n}"),
            mapping,
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Number of main rows stored in `table`.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.tables().get(table).map_or(0, |t| t.rows.len())
    }

    /// Ids of the rows of `table` saved under `collection`, in id order.
    #[must_use]
    pub fn ids_in(&self, table: &str, collection: &str) -> Vec<i64> {
        self.tables().get(table).map_or_else(Vec::new, |t| {
            t.rows
                .iter()
                .filter(|(_, row)| row.collection == collection)
                .map(|(id, _)| *id)
                .collect()
        })
    }

    fn tables(&self) -> MutexGuard<'_, HashMap<String, MemoryTable>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Backend for MemoryBackend {
    fn key(&self) -> &str {
        &self.key
    }

    fn mapping(&self) -> &dyn StorageMapping {
        self.mapping.as_ref()
    }

    fn insert(&self, row: NewRow<'_>) -> Result<i64> {
        let mut tables = self.tables();
        let table = tables.entry(row.table.to_string()).or_default();
        table.last_id += 1;
        let id = table.last_id;
        table.rows.insert(
            id,
            StoredRow {
                entity_type: row.entity_type.to_string(),
                collection: row.collection.to_string(),
                row: row.row,
                aux: row
                    .aux
                    .into_iter()
                    .map(|(aux_table, aux)| (aux_table.to_string(), aux))
                    .collect(),
            },
        );
        Ok(id)
    }

    fn fetch(&self, table: &str, id: i64) -> Result<Option<StoredRow>> {
        Ok(self
            .tables()
            .get(table)
            .and_then(|t| t.rows.get(&id))
            .cloned())
    }
}
