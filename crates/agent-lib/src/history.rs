//! Bounded in-memory history
//!
//! A fixed-capacity FIFO shared between one writer and any number of readers.
//! Readers always receive owned copies, so they never hold a lock across an
//! await point or observe a write that happens after their read.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default number of retained entries (15 minutes at 1-second sampling)
pub const DEFAULT_HISTORY_CAPACITY: usize = 900;

/// Fixed-capacity FIFO history of `T`
///
/// Clones are handles onto the same buffer.
#[derive(Debug)]
pub struct HistoryBuffer<T> {
    entries: Arc<RwLock<VecDeque<T>>>,
    capacity: usize,
}

impl<T> Clone for HistoryBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            capacity: self.capacity,
        }
    }
}

impl<T: Clone> HistoryBuffer<T> {
    /// Create an empty buffer holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append `value` as the newest entry, evicting the oldest at capacity
    pub async fn append(&self, value: T) {
        let mut entries = self.entries.write().await;
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(value);
    }

    /// Copy of the current contents, oldest first
    pub async fn snapshot(&self) -> Vec<T> {
        self.entries.read().await.iter().cloned().collect()
    }

    /// Copy of the newest entry, if any
    pub async fn latest(&self) -> Option<T> {
        self.entries.read().await.back().cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Clone> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
