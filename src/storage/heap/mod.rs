pub mod file;
pub mod page;

pub use file::{HeapFile, HeapFileIterator};
pub use page::HeapPageLayout;
