//! Storage facade

use crate::backend::BackingStore;
use crate::error::StorageResult;
use crate::ring::QaRing;
use crate::sql::SqlStore;
use crate::{QA_FEED_KEY, REPORT_KEY, STATUS_KEY};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tripwire_config::StorageConfig;
use tripwire_core::{QaFeedItem, Report, RunState};

/// Best-effort persistence for run status, reports and the QA feed.
///
/// Availability is decided once, at construction. An instance that could not
/// reach its backing store stays memory-only for its whole lifetime.
pub struct Storage {
    backend: Option<Arc<dyn BackingStore>>,
    ring: QaRing,
    qa_feed_max: usize,
}

impl Storage {
    /// Connect to the configured backing store.
    ///
    /// Never fails: a disabled or unreachable store yields a memory-only
    /// instance.
    pub async fn connect(config: &StorageConfig) -> Self {
        if !config.enabled {
            info!("Backing store disabled, running memory-only");
            return Self::memory_only(config.qa_feed_max);
        }

        match SqlStore::connect(&config.url, config.connect_timeout, config.operation_timeout)
            .await
        {
            Ok(store) => Self::with_backend(Arc::new(store), config.qa_feed_max),
            Err(e) => {
                warn!(
                    "Backing store unavailable ({}), degrading to memory-only: {}",
                    config.url, e
                );
                Self::memory_only(config.qa_feed_max)
            }
        }
    }

    pub fn memory_only(qa_feed_max: usize) -> Self {
        Self {
            backend: None,
            ring: QaRing::new(qa_feed_max),
            qa_feed_max,
        }
    }

    pub fn with_backend(backend: Arc<dyn BackingStore>, qa_feed_max: usize) -> Self {
        debug!("Storage using '{}' backing store", backend.name());
        Self {
            backend: Some(backend),
            ring: QaRing::new(qa_feed_max),
            qa_feed_max,
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Persist the current run state. Returns whether the write landed.
    pub async fn save_status(&self, state: &RunState) -> bool {
        self.save_json(STATUS_KEY, state).await
    }

    /// Persist a finished report. Returns whether the write landed.
    pub async fn save_report(&self, report: &Report) -> bool {
        self.save_json(REPORT_KEY, report).await
    }

    pub async fn load_status(&self) -> Option<RunState> {
        self.load_json(STATUS_KEY).await
    }

    pub async fn load_report(&self) -> Option<Report> {
        self.load_json(REPORT_KEY).await
    }

    /// Record a sampled request.
    ///
    /// The ring always receives the item, so this reports success even when
    /// the backing store write fails.
    pub async fn append_qa_feed(&self, item: QaFeedItem) -> bool {
        if let Some(backend) = &self.backend {
            if let Err(e) = push_item(backend.as_ref(), &item, self.qa_feed_max).await {
                warn!("Failed to append QA feed item to backing store: {}", e);
            }
        }
        self.ring.push(item);
        true
    }

    /// Up to `limit` most recent QA items, newest first
    pub async fn get_qa_feed(&self, limit: usize) -> Vec<QaFeedItem> {
        if let Some(backend) = &self.backend {
            match read_feed(backend.as_ref(), limit).await {
                Ok(items) => return items,
                Err(e) => warn!("Failed to read QA feed from backing store, using ring: {}", e),
            }
        }
        self.ring.recent(limit)
    }

    async fn save_json<T: serde::Serialize>(&self, key: &str, value: &T) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        match write_json(backend.as_ref(), key, value).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write '{}' to backing store: {}", key, e);
                false
            }
        }
    }

    async fn load_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.backend.as_ref()?;
        match read_json(backend.as_ref(), key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read '{}' from backing store: {}", key, e);
                None
            }
        }
    }
}

async fn write_json<T: serde::Serialize>(
    backend: &dyn BackingStore,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    backend.set(key, serde_json::to_string(value)?).await
}

async fn read_json<T: serde::de::DeserializeOwned>(
    backend: &dyn BackingStore,
    key: &str,
) -> StorageResult<Option<T>> {
    match backend.get(key).await? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

async fn push_item(backend: &dyn BackingStore, item: &QaFeedItem, max: usize) -> StorageResult<()> {
    backend
        .push_capped(QA_FEED_KEY, serde_json::to_string(item)?, max)
        .await
}

async fn read_feed(backend: &dyn BackingStore, limit: usize) -> StorageResult<Vec<QaFeedItem>> {
    backend
        .list_recent(QA_FEED_KEY, limit)
        .await?
        .iter()
        .map(|row| serde_json::from_str(row).map_err(Into::into))
        .collect()
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("available", &self.is_available())
            .field("qa_feed_max", &self.qa_feed_max)
            .field("ring_len", &self.ring.len())
            .finish()
    }
}
