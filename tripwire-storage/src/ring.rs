//! Bounded in-process QA feed

use parking_lot::Mutex;
use std::collections::VecDeque;
use tripwire_core::QaFeedItem;

/// Fixed-capacity ring; the oldest item is evicted when full.
///
/// Items are stored oldest-first and read newest-first.
#[derive(Debug)]
pub struct QaRing {
    items: Mutex<VecDeque<QaFeedItem>>,
    capacity: usize,
}

impl QaRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, item: QaFeedItem) {
        let mut items = self.items.lock();
        items.push_back(item);
        while items.len() > self.capacity {
            items.pop_front();
        }
    }

    /// Up to `limit` most recent items, newest first
    pub fn recent(&self, limit: usize) -> Vec<QaFeedItem> {
        self.items.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
