use anyhow::Result;

use crate::tuple::Tuple;

pub mod common;
pub mod heap;
pub mod page;

/// Pull based access to a sequence of tuples.
///
/// Iterators start closed. A closed iterator reports no elements until it is opened.
pub trait TupleIterator {
    /// Positions the iterator before the first tuple.
    fn open(&mut self) -> Result<()>;

    fn has_next(&mut self) -> Result<bool>;

    /// Returns the next tuple, failing with [`crate::error::DbError::NoSuchElement`]
    /// if there is none.
    fn next(&mut self) -> Result<Tuple>;

    /// Starts over from the first tuple.
    fn rewind(&mut self) -> Result<()> {
        self.close();
        self.open()
    }

    fn close(&mut self);
}
