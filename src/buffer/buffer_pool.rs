use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, trace, warn};

use super::clock_replacer::ClockReplacer;
use super::PoolPos;
use crate::catalog::Catalog;
use crate::common::{PageId, TableId};
use crate::concurrency::{LockManager, LockMode, TransactionId};
use crate::config::DatabaseConfig;
use crate::error::DbError;
use crate::storage::page::{Page, PageHandle};
use crate::tuple::Tuple;

struct PoolState {
    page_table: HashMap<PageId, PoolPos>,
    frames: Vec<Option<Arc<Page>>>,
    clock_replacer: ClockReplacer,
}

impl PoolState {
    fn new(capacity: usize) -> Self {
        Self {
            page_table: HashMap::with_capacity(capacity),
            frames: vec![None; capacity],
            clock_replacer: ClockReplacer::new(capacity),
        }
    }

    fn cached(&self, page_id: PageId) -> Option<(PoolPos, &Arc<Page>)> {
        let pool_pos = *self.page_table.get(&page_id)?;
        self.frames[pool_pos].as_ref().map(|page| (pool_pos, page))
    }

    /// Returns an empty frame, evicting a clean page if the pool is full.
    /// Dirty pages are never evicted, so None means every cached page is dirty.
    fn find_frame(&mut self) -> Option<PoolPos> {
        if let Some(free) = self.frames.iter().position(Option::is_none) {
            return Some(free);
        }

        let frames = &self.frames;
        let victim = self
            .clock_replacer
            .find_victim(|pos| matches!(&frames[pos], Some(page) if !page.is_dirty()))?;
        if let Some(page) = self.frames[victim].take() {
            debug!("Evicting page {}", page.id());
            self.page_table.remove(&page.id());
        }
        self.clock_replacer.remove(victim);
        Some(victim)
    }

    fn install(&mut self, pool_pos: PoolPos, page: Arc<Page>) {
        self.page_table.insert(page.id(), pool_pos);
        self.frames[pool_pos] = Some(page);
        self.clock_replacer.reference(pool_pos);
    }

    fn remove(&mut self, page_id: PageId) -> Option<Arc<Page>> {
        let pool_pos = self.page_table.remove(&page_id)?;
        self.clock_replacer.remove(pool_pos);
        self.frames[pool_pos].take()
    }

    fn pages(&self) -> impl Iterator<Item = &Arc<Page>> {
        self.frames.iter().flatten()
    }
}

/// Caches a bounded number of pages and mediates every page access.
///
/// Every page a transaction touches is locked through the pool's [`LockManager`]
/// and stays locked until [`BufferPool::transaction_complete`] (strict two phase
/// locking). Dirty pages are never evicted: they reach the disk when their
/// transaction commits and are reloaded from disk when it aborts.
pub struct BufferPool {
    state: Mutex<PoolState>,
    lock_manager: LockManager,
    catalog: Arc<Catalog>,
    capacity: usize,
    lock_retry_limit: u32,
    lock_retry_wait: Duration,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>, config: &DatabaseConfig) -> Self {
        Self {
            state: Mutex::new(PoolState::new(config.pool_pages)),
            lock_manager: LockManager::new(config.starvation_threshold),
            catalog,
            capacity: config.pool_pages,
            lock_retry_limit: config.lock_retry_limit,
            lock_retry_wait: config.lock_retry_wait,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cached_pages(&self) -> usize {
        self.state.lock().unwrap().page_table.len()
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.state.lock().unwrap().page_table.contains_key(&page_id)
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Locks a page for `tid` and returns it, reading it from disk if it is not cached.
    ///
    /// A denied lock request is retried whenever some lock gets released, for at most
    /// `lock_retry_limit * lock_retry_wait` in total. The transaction is aborted with
    /// [`DbError::TransactionAborted`] once that time ran out, or earlier if the lock
    /// manager considers it starving against an older transaction.
    pub fn get_page(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<PageHandle> {
        self.acquire_lock(tid, page_id, mode)?;
        let page = self.fetch_page(page_id, true)?;
        Ok(PageHandle::new(page, mode))
    }

    /// Locks a page exclusively for changing its tuples. Unlike [`BufferPool::get_page`]
    /// a pool full of dirty pages does not fail the request: the page is handed out
    /// uncached, and the insert or delete caches it or writes it through afterwards.
    pub(crate) fn get_page_for_update(&self, tid: TransactionId, page_id: PageId) -> Result<PageHandle> {
        self.acquire_lock(tid, page_id, LockMode::Exclusive)?;
        let page = self.fetch_page(page_id, false)?;
        Ok(PageHandle::new(page, LockMode::Exclusive))
    }

    fn fetch_page(&self, page_id: PageId, must_cache: bool) -> Result<Arc<Page>> {
        let mut state = self.state.lock().unwrap();
        let cached = state
            .cached(page_id)
            .map(|(pool_pos, page)| (pool_pos, Arc::clone(page)));
        if let Some((pool_pos, page)) = cached {
            state.clock_replacer.reference(pool_pos);
            return Ok(page);
        }

        let pool_pos = state.find_frame();
        if pool_pos.is_none() && must_cache {
            return Err(DbError::BufferPoolExhausted {
                capacity: self.capacity,
            }
            .into());
        }
        let page = Arc::new(
            self.catalog
                .file(page_id.table_id())?
                .read_page(page_id)
                .with_context(|| format!("Failed to load page {page_id} into the buffer pool"))?,
        );
        match pool_pos {
            Some(pool_pos) => {
                state.install(pool_pos, Arc::clone(&page));
                debug!("Loaded page {page_id} into frame {pool_pos}");
            }
            None => debug!("Buffer pool is full of dirty pages, page {page_id} stays uncached"),
        }

        Ok(page)
    }

    fn acquire_lock(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<()> {
        let deadline = Instant::now() + self.lock_retry_wait * self.lock_retry_limit;
        loop {
            let epoch = self.lock_manager.release_epoch();
            if self.lock_manager.try_acquire(page_id, tid, mode) {
                return Ok(());
            }

            if self.lock_manager.is_starving(page_id, tid, mode) {
                warn!("Transaction {tid} starves on page {page_id}, aborting");
                return Err(DbError::TransactionAborted(tid).into());
            }
            let now = Instant::now();
            if now >= deadline {
                warn!("Transaction {tid} gave up waiting for a {mode:?} lock on page {page_id}");
                return Err(DbError::TransactionAborted(tid).into());
            }

            let wait = self.lock_retry_wait.min(deadline - now);
            debug!("Transaction {tid} waits for a {mode:?} lock on page {page_id}");
            self.lock_manager.wait_for_release(epoch, wait);
        }
    }

    /// Releases the lock `tid` holds on a page before the transaction ends.
    /// This breaks two phase locking, so callers must know the page was not used.
    pub fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.lock_manager.release(page_id, tid);
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_lock(tid, page_id)
    }

    /// Adds a tuple to a table on behalf of `tid`. The modified pages stay cached as
    /// dirty pages of the transaction.
    pub fn insert_tuple(&self, tid: TransactionId, table_id: TableId, tuple: &mut Tuple) -> Result<()> {
        let file = self.catalog.file(table_id)?;
        let pages = file.insert_tuple(self, tid, tuple)?;
        self.cache_dirty_pages(tid, pages)
    }

    /// Removes a stored tuple from its table on behalf of `tid`.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(DbError::MissingRecordId)?;
        let file = self.catalog.file(record_id.page_id().table_id())?;
        let pages = file.delete_tuple(self, tid, tuple)?;
        self.cache_dirty_pages(tid, pages)
    }

    /// Marks pages as dirtied by `tid` and makes sure the pool holds exactly these versions.
    fn cache_dirty_pages(&self, tid: TransactionId, pages: Vec<Arc<Page>>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for page in pages {
            page.mark_dirty(Some(tid));
            let page_id = page.id();

            if let Some(&pool_pos) = state.page_table.get(&page_id) {
                state.frames[pool_pos] = Some(page);
                state.clock_replacer.reference(pool_pos);
                continue;
            }

            match state.find_frame() {
                Some(pool_pos) => state.install(pool_pos, page),
                None => {
                    // Nothing clean left to evict: the page has to go to disk before
                    // its transaction completes and can not be restored on abort.
                    warn!("Buffer pool is full of dirty pages, writing page {page_id} of transaction {tid} to disk");
                    self.write_page(&page)?;
                }
            }
        }
        Ok(())
    }

    /// Callers hold the state lock, so no page gets loaded while its file is written.
    fn write_page(&self, page: &Page) -> Result<()> {
        let page_id = page.id();
        self.catalog
            .file(page_id.table_id())?
            .write_page(page)
            .with_context(|| format!("Failed to flush page {page_id}"))?;
        page.mark_dirty(None);
        Ok(())
    }

    /// Writes a cached page to disk if it is dirty. Uncached pages are ignored.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let state = self.state.lock().unwrap();
        if let Some((_, page)) = state.cached(page_id) {
            let page = Arc::clone(page);
            if page.is_dirty() {
                self.write_page(&page)?;
            }
        }
        Ok(())
    }

    /// Writes every dirty cached page to disk. This ignores transaction boundaries,
    /// so it is only meant for shutdown and tests.
    pub fn flush_all_pages(&self) -> Result<()> {
        let state = self.state.lock().unwrap();
        let dirty = state
            .pages()
            .filter(|page| page.is_dirty())
            .cloned()
            .collect::<Vec<_>>();
        for page in dirty {
            self.write_page(&page)?;
        }
        Ok(())
    }

    /// Writes every cached page dirtied by `tid` to disk.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        let state = self.state.lock().unwrap();
        let dirty = Self::dirtied_by(&state, tid);
        debug!("Flushing {} pages of transaction {tid}", dirty.len());
        for page in dirty {
            self.write_page(&page)?;
        }
        Ok(())
    }

    /// Reverts every cached page dirtied by `tid` to its version on disk. A page that
    /// can not be read back is dropped from the pool, so the next access reloads it.
    /// Returns the first failure after all pages were handled.
    fn restore_pages(&self, tid: TransactionId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let dirty = Self::dirtied_by(&state, tid);
        debug!("Restoring {} pages of transaction {tid}", dirty.len());
        let mut result = Ok(());
        for page in dirty {
            let page_id = page.id();
            let on_disk = self
                .catalog
                .file(page_id.table_id())
                .and_then(|file| file.read_page(page_id))
                .with_context(|| format!("Failed to restore page {page_id}"));
            match on_disk {
                Ok(on_disk) => {
                    page.write().copy_from_slice(&on_disk.read());
                    page.mark_dirty(None);
                }
                Err(e) => {
                    warn!("Dropping page {page_id} of aborted transaction {tid} from the pool: {e:#}");
                    state.remove(page_id);
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }
        result
    }

    fn dirtied_by(state: &PoolState, tid: TransactionId) -> Vec<Arc<Page>> {
        state
            .pages()
            .filter(|page| page.dirtied_by() == Some(tid))
            .cloned()
            .collect()
    }

    /// Removes a page from the pool without writing it, dropping any changes.
    pub fn discard_page(&self, page_id: PageId) {
        let mut state = self.state.lock().unwrap();
        if state.remove(page_id).is_some() {
            trace!("Discarded page {page_id}");
        }
    }

    /// Ends a transaction. On commit its dirty pages are written to disk, otherwise they are
    /// reverted to their on-disk version. Either way all of its locks are released afterwards,
    /// even if writing or reading failed.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let result = if commit {
            self.flush_pages(tid)
        } else {
            self.restore_pages(tid)
        };
        self.lock_manager.release_all(tid);
        debug!(
            "Transaction {tid} {}",
            if commit { "committed" } else { "aborted" }
        );
        result
    }

    pub fn transaction_commit(&self, tid: TransactionId) -> Result<()> {
        self.transaction_complete(tid, true)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::OpenOptions;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use anyhow::Result;
    use tempfile::{tempdir, TempDir};

    use super::BufferPool;
    use crate::catalog::Catalog;
    use crate::common::{PageId, TableId};
    use crate::concurrency::{LockMode, TransactionId};
    use crate::config::DatabaseConfig;
    use crate::error::DbError;
    use crate::storage::heap::file::HeapFile;
    use crate::storage::page::Page;
    use crate::storage::TupleIterator;
    use crate::tuple::schema::{TupleDesc, TypeId};
    use crate::tuple::value::Value;
    use crate::tuple::Tuple;

    const PAGE_SIZE: usize = 128;

    struct Fixture {
        _data_dir: TempDir,
        table_id: TableId,
        file: Arc<HeapFile>,
        buffer_pool: BufferPool,
    }

    /// A table of two int columns with `pages` empty pages on disk.
    fn fixture(config: DatabaseConfig, pages: u32) -> Result<Fixture> {
        let data_dir = tempdir()?;
        let catalog = Arc::new(Catalog::new());
        let table_id = catalog.allocate_table_id();
        let file = HeapFile::create(
            table_id,
            data_dir.path().join("pool.dat"),
            TupleDesc::named(&[(TypeId::Integer, "a"), (TypeId::Integer, "b")]),
            PAGE_SIZE,
        )?;
        for page_no in 0..pages {
            file.write_page(&Page::empty(PageId::new(table_id, page_no), PAGE_SIZE))?;
        }
        let file = catalog.add_table(file, "pool", "a");
        let buffer_pool = BufferPool::new(catalog, &config.with_page_size(PAGE_SIZE));
        Ok(Fixture {
            _data_dir: data_dir,
            table_id,
            file,
            buffer_pool,
        })
    }

    fn tuple(file: &HeapFile, a: i32) -> Tuple {
        Tuple::new(
            file.tuple_desc().clone(),
            vec![Value::Integer(a), Value::Integer(a * 2)],
        )
        .unwrap()
    }

    fn tid(id: u64) -> TransactionId {
        TransactionId::new(id)
    }

    #[test]
    fn evicts_clean_pages() -> Result<()> {
        let Fixture {
            _data_dir,
            table_id,
            buffer_pool,
            ..
        } = fixture(DatabaseConfig::default().with_pool_pages(2), 3)?;
        assert_eq!(buffer_pool.capacity(), 2);

        for page_no in 0..3 {
            buffer_pool.get_page(tid(1), PageId::new(table_id, page_no), LockMode::Shared)?;
            assert!(buffer_pool.cached_pages() <= 2);
        }
        assert!(buffer_pool.is_cached(PageId::new(table_id, 2)));
        assert_eq!(buffer_pool.cached_pages(), 2);

        // the same page is served from the cache
        let first = buffer_pool.get_page(tid(1), PageId::new(table_id, 2), LockMode::Shared)?;
        let second = buffer_pool.get_page(tid(1), PageId::new(table_id, 2), LockMode::Shared)?;
        assert!(Arc::ptr_eq(first.page(), second.page()));
        Ok(())
    }

    #[test]
    fn fails_when_all_pages_are_dirty() -> Result<()> {
        let Fixture {
            _data_dir,
            table_id,
            buffer_pool,
            ..
        } = fixture(DatabaseConfig::default().with_pool_pages(2), 3)?;
        let p0 = PageId::new(table_id, 0);
        let p1 = PageId::new(table_id, 1);
        let p2 = PageId::new(table_id, 2);

        for page_id in [p0, p1] {
            let page = buffer_pool.get_page(tid(1), page_id, LockMode::Exclusive)?;
            page.write()?[0] = 1;
            page.page().mark_dirty(Some(tid(1)));
        }

        let err = buffer_pool
            .get_page(tid(1), p2, LockMode::Shared)
            .unwrap_err();
        assert_eq!(
            DbError::of(&err),
            Some(&DbError::BufferPoolExhausted { capacity: 2 })
        );

        buffer_pool.flush_page(p0)?;
        buffer_pool.get_page(tid(1), p2, LockMode::Shared)?;
        assert!(!buffer_pool.is_cached(p0));
        assert!(buffer_pool.is_cached(p1));
        assert!(buffer_pool.is_cached(p2));
        Ok(())
    }

    #[test]
    fn missing_page_is_not_cached() -> Result<()> {
        let Fixture {
            _data_dir,
            table_id,
            buffer_pool,
            ..
        } = fixture(DatabaseConfig::default(), 1)?;
        let page_id = PageId::new(table_id, 5);
        let err = buffer_pool
            .get_page(tid(1), page_id, LockMode::Shared)
            .unwrap_err();
        assert_eq!(DbError::of(&err), Some(&DbError::InvalidPage(page_id)));
        assert_eq!(buffer_pool.cached_pages(), 0);

        let err = buffer_pool
            .get_page(tid(1), PageId::new(table_id + 1, 0), LockMode::Shared)
            .unwrap_err();
        assert_eq!(
            DbError::of(&err),
            Some(&DbError::UnknownTable(table_id + 1))
        );
        Ok(())
    }

    #[test]
    fn shared_waits_for_exclusive_holder() -> Result<()> {
        let config = DatabaseConfig::default()
            .with_lock_retry_limit(100)
            .with_lock_retry_wait(Duration::from_millis(50))
            .with_starvation_threshold(u64::MAX);
        let Fixture {
            _data_dir,
            table_id,
            buffer_pool,
            ..
        } = fixture(config, 1)?;
        let page_id = PageId::new(table_id, 0);

        buffer_pool.get_page(tid(1), page_id, LockMode::Exclusive)?;
        assert!(buffer_pool.holds_lock(tid(1), page_id));

        let granted = AtomicBool::new(false);
        thread::scope(|s| -> Result<()> {
            let reader = s.spawn(|| -> Result<()> {
                buffer_pool.get_page(tid(2), page_id, LockMode::Shared)?;
                granted.store(true, Ordering::SeqCst);
                Ok(())
            });

            thread::sleep(Duration::from_millis(100));
            assert!(!granted.load(Ordering::SeqCst));
            buffer_pool.transaction_complete(tid(1), true)?;
            reader.join().unwrap()?;
            Ok(())
        })?;

        assert!(granted.load(Ordering::SeqCst));
        assert!(!buffer_pool.holds_lock(tid(1), page_id));
        assert!(buffer_pool.holds_lock(tid(2), page_id));
        Ok(())
    }

    #[test]
    fn lock_wait_aborts_after_retries() -> Result<()> {
        let config = DatabaseConfig::default()
            .with_lock_retry_limit(3)
            .with_lock_retry_wait(Duration::from_millis(10))
            .with_starvation_threshold(u64::MAX);
        let Fixture {
            _data_dir,
            table_id,
            buffer_pool,
            ..
        } = fixture(config, 1)?;
        let page_id = PageId::new(table_id, 0);

        buffer_pool.get_page(tid(1), page_id, LockMode::Shared)?;
        let start = Instant::now();
        let err = buffer_pool
            .get_page(tid(2), page_id, LockMode::Exclusive)
            .unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(DbError::of(&err), Some(&DbError::TransactionAborted(tid(2))));
        assert!(DbError::is_transaction_aborted(&err));
        assert!(!buffer_pool.holds_lock(tid(2), page_id));
        Ok(())
    }

    #[test]
    fn younger_transaction_starves_against_older_one() -> Result<()> {
        let config = DatabaseConfig::default()
            .with_lock_retry_limit(1000)
            .with_lock_retry_wait(Duration::from_millis(100))
            .with_starvation_threshold(0);
        let Fixture {
            _data_dir,
            table_id,
            buffer_pool,
            ..
        } = fixture(config, 1)?;
        let page_id = PageId::new(table_id, 0);

        buffer_pool.get_page(tid(1), page_id, LockMode::Exclusive)?;
        let start = Instant::now();
        let err = buffer_pool
            .get_page(tid(2), page_id, LockMode::Shared)
            .unwrap_err();
        assert!(DbError::is_transaction_aborted(&err));
        // no waiting at all
        assert!(start.elapsed() < Duration::from_secs(10));
        Ok(())
    }

    #[test]
    fn abort_restores_disk_version() -> Result<()> {
        let Fixture {
            _data_dir,
            table_id,
            file,
            buffer_pool,
        } = fixture(DatabaseConfig::default(), 0)?;

        let mut kept = tuple(&file, 1);
        buffer_pool.insert_tuple(tid(1), table_id, &mut kept)?;
        buffer_pool.transaction_commit(tid(1))?;

        let mut dropped = tuple(&file, 2);
        buffer_pool.insert_tuple(tid(2), table_id, &mut dropped)?;
        buffer_pool.delete_tuple(tid(2), &kept)?;
        let page_id = PageId::new(table_id, 0);
        let page = buffer_pool.get_page(tid(2), page_id, LockMode::Shared)?;
        assert_eq!(page.page().dirtied_by(), Some(tid(2)));
        assert_eq!(file.layout().free_slots(&page.read()), file.layout().slots() - 1);

        buffer_pool.transaction_complete(tid(2), false)?;
        assert!(!buffer_pool.holds_lock(tid(2), page_id));

        let page = buffer_pool.get_page(tid(3), page_id, LockMode::Shared)?;
        assert!(!page.page().is_dirty());
        let tuples = file.layout().tuples(&page.read(), file.tuple_desc(), page_id);
        assert_eq!(tuples, vec![tuple(&file, 1)]);
        Ok(())
    }

    #[test]
    fn commit_writes_pages_to_disk() -> Result<()> {
        let Fixture {
            _data_dir,
            table_id,
            file,
            buffer_pool,
        } = fixture(DatabaseConfig::default(), 0)?;

        for a in 0..3 {
            buffer_pool.insert_tuple(tid(1), table_id, &mut tuple(&file, a))?;
        }
        let page_id = PageId::new(table_id, 0);
        // the appended page is on disk, but still empty
        let on_disk = file.read_page(page_id)?;
        assert!(file.layout().tuples(&on_disk.read(), file.tuple_desc(), page_id).is_empty());

        buffer_pool.transaction_complete(tid(1), true)?;
        let on_disk = file.read_page(page_id)?;
        let tuples = file.layout().tuples(&on_disk.read(), file.tuple_desc(), page_id);
        assert_eq!(tuples.len(), 3);
        assert!(!buffer_pool.holds_lock(tid(1), page_id));
        Ok(())
    }

    #[test]
    fn discard_drops_changes() -> Result<()> {
        let Fixture {
            _data_dir,
            table_id,
            file,
            buffer_pool,
        } = fixture(DatabaseConfig::default(), 0)?;

        buffer_pool.insert_tuple(tid(1), table_id, &mut tuple(&file, 7))?;
        let page_id = PageId::new(table_id, 0);
        assert!(buffer_pool.is_cached(page_id));
        buffer_pool.discard_page(page_id);
        assert!(!buffer_pool.is_cached(page_id));

        buffer_pool.flush_all_pages()?;
        let page = buffer_pool.get_page(tid(1), page_id, LockMode::Shared)?;
        assert_eq!(file.layout().free_slots(&page.read()), file.layout().slots());
        Ok(())
    }

    #[test]
    fn flush_all_pages_ignores_transactions() -> Result<()> {
        let Fixture {
            _data_dir,
            table_id,
            file,
            buffer_pool,
        } = fixture(DatabaseConfig::default(), 0)?;

        buffer_pool.insert_tuple(tid(1), table_id, &mut tuple(&file, 1))?;
        buffer_pool.flush_all_pages()?;

        let page_id = PageId::new(table_id, 0);
        let on_disk = file.read_page(page_id)?;
        assert_eq!(file.layout().free_slots(&on_disk.read()), file.layout().slots() - 1);
        // nothing left to restore
        buffer_pool.transaction_complete(tid(1), false)?;
        let page = buffer_pool.get_page(tid(2), page_id, LockMode::Shared)?;
        assert_eq!(file.layout().free_slots(&page.read()), file.layout().slots() - 1);
        Ok(())
    }

    #[test]
    fn shared_page_cannot_be_written() -> Result<()> {
        let Fixture {
            _data_dir,
            table_id,
            buffer_pool,
            ..
        } = fixture(DatabaseConfig::default(), 1)?;
        let page_id = PageId::new(table_id, 0);
        let page = buffer_pool.get_page(tid(1), page_id, LockMode::Shared)?;
        assert!(page.write().is_err());
        assert_eq!(
            buffer_pool.lock_manager().lock_mode(tid(1), page_id),
            Some(LockMode::Shared)
        );

        // upgrade as the only holder
        let page = buffer_pool.get_page(tid(1), page_id, LockMode::Exclusive)?;
        assert!(page.write().is_ok());

        buffer_pool.release_page(tid(1), page_id);
        assert!(!buffer_pool.holds_lock(tid(1), page_id));
        Ok(())
    }

    fn tuples_on_disk(file: &HeapFile, page_no: u32) -> Result<usize> {
        let page_id = PageId::new(file.table_id(), page_no);
        let page = file.read_page(page_id)?;
        let count = file.layout().tuples(&page.read(), file.tuple_desc(), page_id).len();
        Ok(count)
    }

    #[test]
    fn writes_succeed_with_a_pool_full_of_dirty_pages() -> Result<()> {
        let Fixture {
            _data_dir,
            table_id,
            file,
            buffer_pool,
        } = fixture(DatabaseConfig::default().with_pool_pages(1), 0)?;
        let slots = file.layout().slots();
        assert_eq!(slots, 15);

        for a in 0..(2 * slots) as i32 {
            buffer_pool.insert_tuple(tid(1), table_id, &mut tuple(&file, a))?;
            assert!(buffer_pool.cached_pages() <= buffer_pool.capacity());
        }
        let mut last = tuple(&file, -1);
        buffer_pool.insert_tuple(tid(1), table_id, &mut last)?;
        assert!(buffer_pool.cached_pages() <= buffer_pool.capacity());
        assert_eq!(file.page_count(), 3);
        assert_eq!(
            last.record_id().map(|record_id| record_id.page_id()),
            Some(PageId::new(table_id, 2))
        );

        // the first page stays cached, the appended ones went straight to disk
        assert!(buffer_pool.is_cached(PageId::new(table_id, 0)));
        assert_eq!(tuples_on_disk(&file, 0)?, 0);
        assert_eq!(tuples_on_disk(&file, 1)?, slots);
        assert_eq!(tuples_on_disk(&file, 2)?, 1);

        // deletes on uncached pages are written through as well
        buffer_pool.delete_tuple(tid(1), &last)?;
        assert_eq!(tuples_on_disk(&file, 2)?, 0);
        assert!(buffer_pool.cached_pages() <= buffer_pool.capacity());

        buffer_pool.transaction_commit(tid(1))?;
        assert_eq!(tuples_on_disk(&file, 0)?, slots);

        let mut iter = file.iterator(&buffer_pool, tid(2));
        iter.open()?;
        let mut count = 0;
        while iter.has_next()? {
            iter.next()?;
            count += 1;
            assert!(buffer_pool.cached_pages() <= buffer_pool.capacity());
        }
        assert_eq!(count, 2 * slots);
        Ok(())
    }

    #[test]
    fn inserts_replace_clean_pages() -> Result<()> {
        let Fixture {
            _data_dir,
            table_id,
            file,
            buffer_pool,
        } = fixture(DatabaseConfig::default().with_pool_pages(2), 3)?;
        let p0 = PageId::new(table_id, 0);

        for page_no in 1..3 {
            buffer_pool.get_page(tid(1), PageId::new(table_id, page_no), LockMode::Shared)?;
        }
        assert_eq!(buffer_pool.cached_pages(), 2);
        assert!(!buffer_pool.is_cached(p0));

        let mut t = tuple(&file, 5);
        buffer_pool.insert_tuple(tid(1), table_id, &mut t)?;
        assert_eq!(t.record_id().map(|record_id| record_id.page_id()), Some(p0));
        assert_eq!(buffer_pool.cached_pages(), 2);
        assert!(buffer_pool.is_cached(p0));
        let page = buffer_pool.get_page(tid(1), p0, LockMode::Shared)?;
        assert_eq!(page.page().dirtied_by(), Some(tid(1)));
        // nothing reached the disk before the commit
        assert_eq!(tuples_on_disk(&file, 0)?, 0);

        buffer_pool.transaction_commit(tid(1))?;
        assert_eq!(tuples_on_disk(&file, 0)?, 1);
        Ok(())
    }

    #[test]
    fn abort_drops_pages_that_cannot_be_restored() -> Result<()> {
        let Fixture {
            _data_dir,
            table_id,
            file,
            buffer_pool,
        } = fixture(DatabaseConfig::default(), 0)?;
        let page_id = PageId::new(table_id, 0);

        buffer_pool.insert_tuple(tid(1), table_id, &mut tuple(&file, 1))?;
        assert!(buffer_pool.is_cached(page_id));
        OpenOptions::new().write(true).open(file.path())?.set_len(0)?;

        let err = buffer_pool
            .transaction_complete(tid(1), false)
            .unwrap_err();
        assert_eq!(DbError::of(&err), Some(&DbError::InvalidPage(page_id)));
        assert!(!buffer_pool.is_cached(page_id));
        assert_eq!(buffer_pool.cached_pages(), 0);
        assert!(!buffer_pool.holds_lock(tid(1), page_id));
        Ok(())
    }
}
