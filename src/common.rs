use std::fmt::Display;

pub type TableId = u32;
pub type PageNo = u32;
pub type Slot = u16;

pub const DEFAULT_PAGE_SIZE: usize = 4096;
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Identifies a page of a table. The page starts at byte `page_no * page_size`
/// of the table's backing file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    table_id: TableId,
    page_no: PageNo,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: PageNo) -> Self {
        Self { table_id, page_no }
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn page_no(&self) -> PageNo {
        self.page_no
    }

    /// Byte offset of this page inside its table file.
    pub fn offset(&self, page_size: usize) -> u64 {
        self.page_no as u64 * page_size as u64
    }
}

impl Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

/// Identifies the storage slot of a single tuple.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordId {
    page_id: PageId,
    slot: Slot,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: Slot) -> Self {
        Self { page_id, slot }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.page_id, self.slot)
    }
}
