//! Backing store abstraction

use crate::error::StorageResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Shared key/value store with capped lists.
///
/// Values are opaque JSON strings; the schema beyond the logical keys is the
/// implementation's business.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    async fn set(&self, key: &str, value: String) -> StorageResult<()>;

    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Append to the list at `key`, then drop the oldest entries beyond `max_len`
    async fn push_capped(&self, key: &str, value: String, max_len: usize) -> StorageResult<()>;

    /// Up to `limit` entries of the list at `key`, newest first
    async fn list_recent(&self, key: &str, limit: usize) -> StorageResult<Vec<String>>;
}

/// Process-local backing store, mainly for tests and single-process setups
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    lists: Mutex<HashMap<String, VecDeque<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn set(&self, key: &str, value: String) -> StorageResult<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn push_capped(&self, key: &str, value: String, max_len: usize) -> StorageResult<()> {
        let mut lists = self.lists.lock();
        let list = lists.entry(key.to_string()).or_default();
        list.push_back(value);
        while list.len() > max_len {
            list.pop_front();
        }
        Ok(())
    }

    async fn list_recent(&self, key: &str, limit: usize) -> StorageResult<Vec<String>> {
        Ok(self
            .lists
            .lock()
            .get(key)
            .map(|list| list.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
