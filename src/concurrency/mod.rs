use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

pub mod lock_manager;

pub use lock_manager::{LockManager, LockMode};

/// Identifies a transaction. Ids are handed out in increasing order, so the
/// ordering doubles as the priority key of the starvation check: a lower id
/// means an older transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out transaction ids.
pub struct TransactionManager {
    next_tid: AtomicU64,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            next_tid: AtomicU64::new(1),
        }
    }

    /// Returns a fresh id, greater than every id returned before.
    pub fn begin(&self) -> TransactionId {
        TransactionId(self.next_tid.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
