use thiserror::Error;

use crate::common::{PageId, RecordId, TableId};
use crate::concurrency::TransactionId;

/// Failures the storage core raises itself. They are carried inside an
/// `anyhow::Error` so callers can classify them with `downcast_ref`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DbError {
    /// The lock wait ran out of retries or lost against an older lock holder.
    /// The caller has to abort the transaction and may retry it from scratch.
    #[error("transaction {0} aborted while waiting for a lock")]
    TransactionAborted(TransactionId),
    #[error("buffer pool exhausted: all {capacity} cached pages are dirty")]
    BufferPoolExhausted { capacity: usize },
    #[error("page {0} does not exist in its table file")]
    InvalidPage(PageId),
    #[error("no free slot for a tuple in table {0}")]
    NoFreeSlot(TableId),
    #[error("no tuple stored at {0}")]
    TupleNotFound(RecordId),
    #[error("tuple has no record id")]
    MissingRecordId,
    #[error("tuple does not match the table's tuple descriptor: {0}")]
    SchemaMismatch(String),
    #[error("no table with id {0}")]
    UnknownTable(TableId),
    #[error("no more tuples")]
    NoSuchElement,
    #[error("page {0} was fetched read only")]
    ReadOnlyPage(PageId),
    #[error("value of {size} bytes exceeds the limit of {limit} bytes")]
    ValueTooLarge { size: usize, limit: usize },
}

impl DbError {
    /// Returns true if the error chain says the transaction has to be aborted.
    pub fn is_transaction_aborted(err: &anyhow::Error) -> bool {
        matches!(Self::of(err), Some(DbError::TransactionAborted(_)))
    }

    /// Returns the classified failure of an error chain, if any.
    pub fn of(err: &anyhow::Error) -> Option<&DbError> {
        err.downcast_ref::<DbError>()
            .or_else(|| err.chain().find_map(|cause| cause.downcast_ref::<DbError>()))
    }
}
