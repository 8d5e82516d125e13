use std::time::Duration;

use crate::common::{DEFAULT_PAGE_SIZE, DEFAULT_POOL_PAGES};

/// Tunables of a database instance. Fixed for the lifetime of the instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Bytes per page, for every table of the instance.
    pub page_size: usize,
    /// Maximum number of pages the buffer pool caches.
    pub pool_pages: usize,
    /// How often a denied lock request is retried before the transaction aborts.
    pub lock_retry_limit: u32,
    /// Upper bound of a single wait between two lock attempts.
    pub lock_retry_wait: Duration,
    /// Number of lock attempts after which the starvation check kicks in.
    pub starvation_threshold: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_pages: DEFAULT_POOL_PAGES,
            lock_retry_limit: 25,
            lock_retry_wait: Duration::from_millis(100),
            starvation_threshold: 100,
        }
    }
}

impl DatabaseConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_pool_pages(mut self, pool_pages: usize) -> Self {
        self.pool_pages = pool_pages;
        self
    }

    pub fn with_lock_retry_wait(mut self, wait: Duration) -> Self {
        self.lock_retry_wait = wait;
        self
    }

    pub fn with_lock_retry_limit(mut self, limit: u32) -> Self {
        self.lock_retry_limit = limit;
        self
    }

    pub fn with_starvation_threshold(mut self, threshold: u64) -> Self {
        self.starvation_threshold = threshold;
        self
    }
}
