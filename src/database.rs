use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::buffer::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::common::TableId;
use crate::concurrency::{TransactionId, TransactionManager};
use crate::config::DatabaseConfig;
use crate::storage::heap::file::{HeapFile, HeapFileIterator};
use crate::tuple::schema::TupleDesc;
use crate::tuple::Tuple;

/// Owns everything a database instance consists of: its tables, the buffer pool
/// and the source of transaction ids.
pub struct Database {
    config: DatabaseConfig,
    catalog: Arc<Catalog>,
    buffer_pool: BufferPool,
    transaction_manager: TransactionManager,
}

impl Database {
    pub fn new(config: DatabaseConfig) -> Self {
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = BufferPool::new(Arc::clone(&catalog), &config);
        Self {
            config,
            catalog,
            buffer_pool,
            transaction_manager: TransactionManager::new(),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    /// Creates an empty table file at `path` and registers it.
    pub fn create_table(
        &self,
        path: impl AsRef<Path>,
        name: &str,
        desc: TupleDesc,
        primary_key: &str,
    ) -> Result<TableId> {
        let table_id = self.catalog.allocate_table_id();
        let file = HeapFile::create(table_id, path.as_ref(), desc, self.config.page_size)?;
        self.catalog.add_table(file, name, primary_key);
        info!("Created table {name} with id {table_id}");
        Ok(table_id)
    }

    /// Registers an existing table file.
    pub fn open_table(
        &self,
        path: impl AsRef<Path>,
        name: &str,
        desc: TupleDesc,
        primary_key: &str,
    ) -> Result<TableId> {
        let table_id = self.catalog.allocate_table_id();
        let file = HeapFile::open(table_id, path.as_ref(), desc, self.config.page_size)?;
        self.catalog.add_table(file, name, primary_key);
        Ok(table_id)
    }

    pub fn begin(&self) -> Transaction<'_> {
        Transaction {
            tid: self.transaction_manager.begin(),
            database: self,
            completed: false,
        }
    }
}

/// A running transaction. It ends with [`Transaction::commit`] or [`Transaction::abort`];
/// a transaction dropped without either is aborted.
pub struct Transaction<'a> {
    tid: TransactionId,
    database: &'a Database,
    completed: bool,
}

impl<'a> Transaction<'a> {
    pub fn tid(&self) -> TransactionId {
        self.tid
    }

    pub fn insert_tuple(&self, table_id: TableId, tuple: &mut Tuple) -> Result<()> {
        self.database
            .buffer_pool
            .insert_tuple(self.tid, table_id, tuple)
    }

    pub fn delete_tuple(&self, tuple: &Tuple) -> Result<()> {
        self.database.buffer_pool.delete_tuple(self.tid, tuple)
    }

    /// Returns a closed iterator over a table, to be opened by the caller.
    pub fn scan(&self, table_id: TableId) -> Result<HeapFileIterator<'a>> {
        let file = self.database.catalog.file(table_id)?;
        Ok(file.iterator(&self.database.buffer_pool, self.tid))
    }

    pub fn commit(mut self) -> Result<()> {
        self.completed = true;
        self.database
            .buffer_pool
            .transaction_complete(self.tid, true)
    }

    pub fn abort(mut self) -> Result<()> {
        self.completed = true;
        self.database
            .buffer_pool
            .transaction_complete(self.tid, false)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        warn!("Transaction {} dropped without commit, aborting", self.tid);
        if let Err(err) = self
            .database
            .buffer_pool
            .transaction_complete(self.tid, false)
        {
            warn!("Failed to abort transaction {}: {err:#}", self.tid);
        }
    }
}
