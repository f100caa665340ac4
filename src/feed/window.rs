//! Recent-items window used for in-process dedup.

use std::collections::{HashSet, VecDeque};

/// The last N dedup keys seen for one source.
///
/// Owned by a single poller task, so it needs no locking. It is not
/// persisted: a restarted process starts with an empty window.
#[derive(Debug, Clone)]
pub struct RecentItems {
    order: VecDeque<String>,
    seen: HashSet<String>,
    capacity: usize,
}

impl RecentItems {
    /// Create a window with the given initial capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Current capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Grow the capacity to fit a batch of `batch_len` items. Never shrinks.
    pub fn fit_batch(&mut self, batch_len: usize) {
        if batch_len > self.capacity {
            self.capacity = batch_len;
        }
    }

    /// Whether `key` was seen recently.
    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Record `key` as seen. Returns `false` if it already was.
    ///
    /// The window may exceed its capacity until [`truncate`](Self::truncate)
    /// is called, so that one batch never evicts its own keys.
    pub fn insert(&mut self, key: &str) -> bool {
        if !self.seen.insert(key.to_string()) {
            return false;
        }
        self.order.push_back(key.to_string());
        true
    }

    /// Drop the oldest keys until the window fits its capacity.
    pub fn truncate(&mut self) {
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut window = RecentItems::new(3);
        assert!(window.is_empty());
        assert!(window.insert("a"));
        assert!(!window.insert("a"));
        assert!(window.contains("a"));
        assert!(!window.contains("b"));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_truncate_drops_oldest() {
        let mut window = RecentItems::new(2);
        window.insert("a");
        window.insert("b");
        window.insert("c");
        assert_eq!(window.len(), 3);
        window.truncate();
        assert_eq!(window.len(), 2);
        assert!(!window.contains("a"));
        assert!(window.contains("b"));
        assert!(window.contains("c"));
    }

    #[test]
    fn test_fit_batch_is_monotonic() {
        let mut window = RecentItems::new(50);
        window.fit_batch(10);
        assert_eq!(window.capacity(), 50);
        window.fit_batch(80);
        assert_eq!(window.capacity(), 80);
        window.fit_batch(60);
        assert_eq!(window.capacity(), 80);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let window = RecentItems::new(0);
        assert_eq!(window.capacity(), 1);
    }
}
