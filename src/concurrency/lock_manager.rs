use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::TransactionId;
use crate::common::PageId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Holders of the locks on a single page.
/// Invariant: if `exclusive` is non-empty, `shared` names no other transaction.
#[derive(Debug, Default)]
struct PageLocks {
    shared: HashSet<TransactionId>,
    exclusive: HashSet<TransactionId>,
}

impl PageLocks {
    fn is_empty(&self) -> bool {
        self.shared.is_empty() && self.exclusive.is_empty()
    }

    fn other_exclusive(&self, tid: TransactionId) -> bool {
        self.exclusive.iter().any(|holder| *holder != tid)
    }

    fn other_shared(&self, tid: TransactionId) -> bool {
        self.shared.iter().any(|holder| *holder != tid)
    }

    /// Returns the transactions other than `tid` whose locks conflict with a `mode` request.
    fn conflicting_holders(
        &self,
        tid: TransactionId,
        mode: LockMode,
    ) -> impl Iterator<Item = TransactionId> + '_ {
        let shared = match mode {
            LockMode::Shared => None,
            LockMode::Exclusive => Some(self.shared.iter()),
        };
        self.exclusive
            .iter()
            .chain(shared.into_iter().flatten())
            .copied()
            .filter(move |holder| *holder != tid)
    }

    fn remove(&mut self, tid: TransactionId) {
        self.shared.remove(&tid);
        self.exclusive.remove(&tid);
    }
}

/// Page level shared/exclusive locks for two phase locking.
///
/// The lock manager only decides. Waiting, retrying and aborting is up to the
/// caller, see [`crate::buffer::buffer_pool::BufferPool::get_page`].
/// Waiters can block on [`LockManager::wait_for_release`] instead of sleeping
/// blindly; every release bumps an epoch and wakes them up.
pub struct LockManager {
    lock_table: DashMap<PageId, PageLocks>,
    attempts: AtomicU64,
    starvation_threshold: u64,
    release_epoch: Mutex<u64>,
    released: Condvar,
}

impl LockManager {
    pub fn new(starvation_threshold: u64) -> Self {
        Self {
            lock_table: DashMap::new(),
            attempts: AtomicU64::new(0),
            starvation_threshold,
            release_epoch: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    /// Tries to grant `tid` a lock on a page. Never blocks.
    ///
    /// A shared lock is granted unless another transaction holds the page exclusively.
    /// An exclusive lock is granted if no other transaction holds any lock on the page,
    /// which includes upgrading the lock of the page's sole shared holder.
    pub fn try_acquire(&self, page_id: PageId, tid: TransactionId, mode: LockMode) -> bool {
        let mut locks = self.lock_table.entry(page_id).or_default();
        match mode {
            LockMode::Shared => {
                if locks.other_exclusive(tid) {
                    return false;
                }
                if locks.shared.insert(tid) {
                    self.attempts.fetch_add(1, Ordering::Relaxed);
                }
                true
            }
            LockMode::Exclusive => {
                if locks.exclusive.contains(&tid) {
                    return true;
                }
                if locks.other_exclusive(tid) || locks.other_shared(tid) {
                    return false;
                }
                locks.exclusive.insert(tid);
                self.attempts.fetch_add(1, Ordering::Relaxed);
                true
            }
        }
    }

    /// Heuristic replacing deadlock detection. Once the number of recorded lock grants
    /// passed the starvation threshold, a waiter should give up if an older transaction
    /// holds a conflicting lock on the page.
    pub fn is_starving(&self, page_id: PageId, tid: TransactionId, mode: LockMode) -> bool {
        if self.attempts.load(Ordering::Relaxed) <= self.starvation_threshold {
            return false;
        }
        match self.lock_table.get(&page_id) {
            Some(locks) => locks
                .conflicting_holders(tid, mode)
                .any(|holder| holder < tid),
            None => false,
        }
    }

    /// Releases whatever lock `tid` holds on the page. Releasing twice is fine.
    pub fn release(&self, page_id: PageId, tid: TransactionId) {
        if let Entry::Occupied(mut entry) = self.lock_table.entry(page_id) {
            entry.get_mut().remove(tid);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
        self.notify_release();
    }

    /// Releases every lock held by `tid`. Afterwards the lock manager has no record of it.
    pub fn release_all(&self, tid: TransactionId) {
        self.lock_table.retain(|_, locks| {
            locks.remove(tid);
            !locks.is_empty()
        });
        self.notify_release();
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_mode(tid, page_id).is_some()
    }

    /// Returns the strongest lock `tid` holds on the page.
    pub fn lock_mode(&self, tid: TransactionId, page_id: PageId) -> Option<LockMode> {
        let locks = self.lock_table.get(&page_id)?;
        if locks.exclusive.contains(&tid) {
            Some(LockMode::Exclusive)
        } else if locks.shared.contains(&tid) {
            Some(LockMode::Shared)
        } else {
            None
        }
    }

    /// Counter bumped by every release. Read it before a lock attempt and hand it to
    /// [`LockManager::wait_for_release`] so a release in between is not missed.
    pub fn release_epoch(&self) -> u64 {
        *self.release_epoch.lock().unwrap()
    }

    /// Blocks until some lock was released after `epoch` was observed, or until the
    /// timeout elapsed. Returns whether a release happened.
    pub fn wait_for_release(&self, epoch: u64, timeout: Duration) -> bool {
        let current = self.release_epoch.lock().unwrap();
        let (current, _) = self
            .released
            .wait_timeout_while(current, timeout, |current| *current == epoch)
            .unwrap();
        *current != epoch
    }

    fn notify_release(&self) {
        let mut epoch = self.release_epoch.lock().unwrap();
        *epoch = epoch.wrapping_add(1);
        self.released.notify_all();
    }
}
