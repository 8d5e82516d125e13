use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::prelude::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::debug;

use super::page::HeapPageLayout;
use crate::buffer::buffer_pool::BufferPool;
use crate::common::{PageId, PageNo, RecordId, TableId};
use crate::concurrency::{LockMode, TransactionId};
use crate::error::DbError;
use crate::storage::page::Page;
use crate::storage::TupleIterator;
use crate::tuple::schema::TupleDesc;
use crate::tuple::Tuple;

/// A table stored as an unordered sequence of fixed size pages in a single file.
///
/// Page `n` lives at byte `n * page_size`. The number of pages is the file size
/// divided by the page size, rounded down; a trailing partial page is ignored
/// everywhere. All tuple level access goes through the buffer pool, only the
/// raw page I/O in [`HeapFile::read_page`] and [`HeapFile::write_page`] touches
/// the file directly.
pub struct HeapFile {
    table_id: TableId,
    path: PathBuf,
    file: File,
    filesize: AtomicU64,
    desc: Arc<TupleDesc>,
    page_size: usize,
    layout: HeapPageLayout,
    /// serializes appending pages at the end of the file
    append_lock: Mutex<()>,
}

impl HeapFile {
    /// Creates a new, empty table file. Fails if the file already exists.
    pub fn create(
        table_id: TableId,
        path: impl Into<PathBuf>,
        desc: TupleDesc,
        page_size: usize,
    ) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("Failed to create data file for table {}", table_id))?;

        Ok(Self::new(table_id, path, file, 0, desc, page_size))
    }

    /// Opens an existing table file.
    pub fn open(
        table_id: TableId,
        path: impl Into<PathBuf>,
        desc: TupleDesc,
        page_size: usize,
    ) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("Could not read data for table {}", table_id))?;

        let size = file
            .metadata()
            .with_context(|| format!("Could not read size of table {}", table_id))?
            .len();

        Ok(Self::new(table_id, path, file, size, desc, page_size))
    }

    fn new(
        table_id: TableId,
        path: PathBuf,
        file: File,
        filesize: u64,
        desc: TupleDesc,
        page_size: usize,
    ) -> Self {
        let layout = HeapPageLayout::new(&desc, page_size);
        Self {
            table_id,
            path,
            file,
            filesize: AtomicU64::new(filesize),
            desc: Arc::new(desc),
            page_size,
            layout,
            append_lock: Mutex::new(()),
        }
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn layout(&self) -> &HeapPageLayout {
        &self.layout
    }

    fn filesize(&self) -> u64 {
        self.filesize.load(Ordering::Acquire)
    }

    /// Number of complete pages in the file.
    pub fn page_count(&self) -> PageNo {
        (self.filesize() / self.page_size as u64) as PageNo
    }

    /// Reads a page from disk. Pages beyond the end of the file do not exist.
    pub fn read_page(&self, page_id: PageId) -> Result<Page> {
        if page_id.table_id() != self.table_id || page_id.page_no() >= self.page_count() {
            return Err(DbError::InvalidPage(page_id).into());
        }

        let offset = page_id.offset(self.page_size);
        let mut data = vec![0u8; self.page_size].into_boxed_slice();
        match self.file.read_exact_at(&mut data, offset) {
            Ok(()) => Ok(Page::new(page_id, data)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("Short read of page {page_id}: {e}");
                Err(DbError::InvalidPage(page_id).into())
            }
            Err(e) => Err(e).with_context(|| {
                format!(
                    "Could not read page at offset {} for table {}",
                    offset, self.table_id
                )
            }),
        }
    }

    /// Writes a page to its place in the file, growing the file if needed.
    pub fn write_page(&self, page: &Page) -> Result<()> {
        let page_id = page.id();
        if page_id.table_id() != self.table_id {
            return Err(DbError::InvalidPage(page_id).into());
        }
        let data = page.read();
        self.write_page_at_offset(page_id.offset(self.page_size), &data)
    }

    fn write_page_at_offset(&self, offset: u64, buffer: &[u8]) -> Result<()> {
        debug_assert_eq!(buffer.len(), self.page_size);
        self.file.write_all_at(buffer, offset).with_context(|| {
            format!(
                "Failed to write data at offset {} for table {}",
                offset, self.table_id
            )
        })?;
        self.file.sync_all().with_context(|| {
            format!(
                "Failed to sync data when writing at offset {} for table {}",
                offset, self.table_id
            )
        })?;
        self.filesize
            .fetch_max(offset + buffer.len() as u64, Ordering::AcqRel);

        Ok(())
    }

    /// Writes an empty page behind the last page and returns its id.
    /// The page does not exist before, so nobody can hold a lock on it.
    fn append_empty_page(&self) -> Result<PageId> {
        let _guard = self.append_lock.lock().unwrap();
        let page_id = PageId::new(self.table_id, self.page_count());
        let empty = vec![0u8; self.page_size];
        self.write_page_at_offset(page_id.offset(self.page_size), &empty)?;
        debug!("Appended page {page_id}");
        Ok(page_id)
    }

    fn check_desc(&self, tuple: &Tuple) -> Result<()> {
        if **tuple.desc() != *self.desc {
            return Err(DbError::SchemaMismatch(format!(
                "table {} stores {}, got {}",
                self.table_id,
                self.desc,
                tuple.desc()
            ))
            .into());
        }
        Ok(())
    }

    /// Stores a tuple in the first page with a free slot, appending a new page if all pages
    /// are full. Sets the tuple's record id and returns the modified page.
    ///
    /// Every visited page is locked exclusively for `tid`. Marking the returned page dirty
    /// is left to the buffer pool.
    pub fn insert_tuple(
        &self,
        buffer_pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<Arc<Page>>> {
        self.check_desc(tuple)?;
        if self.layout.slots() == 0 {
            return Err(DbError::NoFreeSlot(self.table_id).into());
        }

        let mut page_no = 0;
        loop {
            // concurrent inserts may fill the appended page first, so rescan from where we stopped
            while page_no < self.page_count() {
                let page_id = PageId::new(self.table_id, page_no);
                if let Some(page) = self.insert_into(buffer_pool, tid, page_id, tuple)? {
                    return Ok(vec![page]);
                }
                page_no += 1;
            }
            self.append_empty_page()?;
        }
    }

    fn insert_into(
        &self,
        buffer_pool: &BufferPool,
        tid: TransactionId,
        page_id: PageId,
        tuple: &mut Tuple,
    ) -> Result<Option<Arc<Page>>> {
        let page = buffer_pool.get_page_for_update(tid, page_id)?;
        let mut data = page.write()?;
        match self.layout.insert_tuple(&mut data, tuple) {
            Some(slot) => {
                tuple.set_record_id(Some(RecordId::new(page_id, slot)));
                Ok(Some(Arc::clone(page.page())))
            }
            None => Ok(None),
        }
    }

    /// Removes a stored tuple from its page and returns the modified page.
    pub fn delete_tuple(
        &self,
        buffer_pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<Arc<Page>>> {
        let record_id = tuple.record_id().ok_or(DbError::MissingRecordId)?;
        if record_id.page_id().table_id() != self.table_id {
            return Err(DbError::TupleNotFound(record_id).into());
        }

        let page = buffer_pool.get_page_for_update(tid, record_id.page_id())?;
        let mut data = page.write()?;
        if !self.layout.delete_tuple(&mut data, record_id.slot()) {
            return Err(DbError::TupleNotFound(record_id).into());
        }
        drop(data);

        Ok(vec![Arc::clone(page.page())])
    }

    /// Returns a closed iterator over all tuples of the file, see [`HeapFileIterator`].
    pub fn iterator<'a>(
        self: &Arc<Self>,
        buffer_pool: &'a BufferPool,
        tid: TransactionId,
    ) -> HeapFileIterator<'a> {
        HeapFileIterator::new(Arc::clone(self), buffer_pool, tid)
    }
}

/// Iterates over the tuples of a heap file, page by page in ascending order.
///
/// Starts closed. [`TupleIterator::open`] fetches page 0 with a shared lock,
/// the following pages are fetched once the previous ones are exhausted.
pub struct HeapFileIterator<'a> {
    file: Arc<HeapFile>,
    buffer_pool: &'a BufferPool,
    tid: TransactionId,
    page_no: PageNo,
    /// remaining tuples of the current page, None while closed
    tuples: Option<std::vec::IntoIter<Tuple>>,
}

impl<'a> HeapFileIterator<'a> {
    fn new(file: Arc<HeapFile>, buffer_pool: &'a BufferPool, tid: TransactionId) -> Self {
        Self {
            file,
            buffer_pool,
            tid,
            page_no: 0,
            tuples: None,
        }
    }

    fn fetch_tuples(&self, page_no: PageNo) -> Result<std::vec::IntoIter<Tuple>> {
        let page_id = PageId::new(self.file.table_id, page_no);
        let page = self.buffer_pool.get_page(self.tid, page_id, LockMode::Shared)?;
        let data = page.read();
        let tuples = self.file.layout.tuples(&data, &self.file.desc, page_id);
        Ok(tuples.into_iter())
    }
}

impl<'a> TupleIterator for HeapFileIterator<'a> {
    fn open(&mut self) -> Result<()> {
        self.page_no = 0;
        self.tuples = if self.file.page_count() == 0 {
            Some(Vec::new().into_iter())
        } else {
            Some(self.fetch_tuples(0)?)
        };
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool> {
        loop {
            match &self.tuples {
                None => return Ok(false),
                Some(tuples) if !tuples.as_slice().is_empty() => return Ok(true),
                Some(_) => {
                    if self.page_no + 1 >= self.file.page_count() {
                        return Ok(false);
                    }
                    self.page_no += 1;
                    self.tuples = Some(self.fetch_tuples(self.page_no)?);
                }
            }
        }
    }

    fn next(&mut self) -> Result<Tuple> {
        if !self.has_next()? {
            return Err(DbError::NoSuchElement.into());
        }
        self.tuples
            .as_mut()
            .and_then(|tuples| tuples.next())
            .ok_or_else(|| DbError::NoSuchElement.into())
    }

    fn close(&mut self) {
        self.tuples = None;
    }
}
