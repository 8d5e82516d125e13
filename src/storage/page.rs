use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;

use crate::common::PageId;
use crate::concurrency::{LockMode, TransactionId};
use crate::error::DbError;

/// The in-memory image of a page, exactly one page size long.
///
/// Concurrent writers are kept apart by the lock manager. The `RwLock` around
/// the bytes only makes sharing the page between threads sound.
#[derive(Debug)]
pub struct Page {
    id: PageId,
    data: RwLock<Box<[u8]>>,
    /// the transaction whose changes have not reached the disk yet
    dirtied_by: Mutex<Option<TransactionId>>,
}

impl Page {
    pub fn new(id: PageId, data: Box<[u8]>) -> Self {
        Self {
            id,
            data: RwLock::new(data),
            dirtied_by: Mutex::new(None),
        }
    }

    /// A zeroed page.
    pub fn empty(id: PageId, page_size: usize) -> Self {
        Self::new(id, vec![0u8; page_size].into_boxed_slice())
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn read(&self) -> RwLockReadGuard<Box<[u8]>> {
        self.data.read().unwrap()
    }

    pub fn write(&self) -> RwLockWriteGuard<Box<[u8]>> {
        self.data.write().unwrap()
    }

    pub fn dirtied_by(&self) -> Option<TransactionId> {
        *self.dirtied_by.lock().unwrap()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtied_by().is_some()
    }

    /// Marks the page as modified by `tid`, or as clean if `None`.
    pub fn mark_dirty(&self, tid: Option<TransactionId>) {
        *self.dirtied_by.lock().unwrap() = tid;
    }
}

/// Access to a cached page, bounded by the lock the transaction got for it.
/// Only handles obtained with an exclusive lock can modify the page.
#[derive(Clone, Debug)]
pub struct PageHandle {
    page: Arc<Page>,
    mode: LockMode,
}

impl PageHandle {
    pub(crate) fn new(page: Arc<Page>, mode: LockMode) -> Self {
        Self { page, mode }
    }

    pub fn id(&self) -> PageId {
        self.page.id()
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn read(&self) -> RwLockReadGuard<Box<[u8]>> {
        self.page.read()
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<Box<[u8]>>> {
        match self.mode {
            LockMode::Exclusive => Ok(self.page.write()),
            LockMode::Shared => Err(DbError::ReadOnlyPage(self.page.id()).into()),
        }
    }

    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }
}
