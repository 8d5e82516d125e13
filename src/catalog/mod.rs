use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use tracing::debug;

use crate::common::TableId;
use crate::error::DbError;
use crate::storage::heap::file::HeapFile;
use crate::tuple::schema::TupleDesc;

struct TableEntry {
    file: Arc<HeapFile>,
    name: String,
    primary_key: String,
}

/// Registry of the tables of a database instance. Lives in memory only.
pub struct Catalog {
    next_table_id: AtomicU32,
    tables: DashMap<TableId, TableEntry>,
    table_name_to_id: DashMap<String, TableId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            next_table_id: AtomicU32::new(1),
            tables: DashMap::new(),
            table_name_to_id: DashMap::new(),
        }
    }

    /// Reserves an id for a table file that is about to be created.
    pub fn allocate_table_id(&self) -> TableId {
        self.next_table_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a table file under a name. A table added later under the same name
    /// takes over the name, the earlier one stays reachable by its id.
    pub fn add_table(&self, file: HeapFile, name: &str, primary_key: &str) -> Arc<HeapFile> {
        let table_id = file.table_id();
        let file = Arc::new(file);
        // ids of opened files come from outside, keep fresh ids clear of them
        self.next_table_id.fetch_max(table_id + 1, Ordering::Relaxed);

        if let Some(previous) = self.table_name_to_id.insert(name.to_owned(), table_id) {
            debug!("Table {table_id} replaces table {previous} as {name}");
        }
        self.tables.insert(
            table_id,
            TableEntry {
                file: Arc::clone(&file),
                name: name.to_owned(),
                primary_key: primary_key.to_owned(),
            },
        );
        file
    }

    pub fn file(&self, table_id: TableId) -> Result<Arc<HeapFile>> {
        self.tables
            .get(&table_id)
            .map(|entry| Arc::clone(&entry.file))
            .ok_or_else(|| DbError::UnknownTable(table_id).into())
    }

    pub fn tuple_desc(&self, table_id: TableId) -> Result<Arc<TupleDesc>> {
        Ok(Arc::clone(self.file(table_id)?.tuple_desc()))
    }

    pub fn table_id(&self, table_name: &str) -> Option<TableId> {
        self.table_name_to_id.get(table_name).map(|kv| *kv.value())
    }

    pub fn table_name(&self, table_id: TableId) -> Result<String> {
        self.tables
            .get(&table_id)
            .map(|entry| entry.name.clone())
            .ok_or_else(|| DbError::UnknownTable(table_id).into())
    }

    pub fn primary_key(&self, table_id: TableId) -> Result<String> {
        self.tables
            .get(&table_id)
            .map(|entry| entry.primary_key.clone())
            .ok_or_else(|| DbError::UnknownTable(table_id).into())
    }

    /// Ids of all registered tables, in ascending order.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids = self.tables.iter().map(|kv| *kv.key()).collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
