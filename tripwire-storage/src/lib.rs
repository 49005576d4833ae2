//! Persistence for Tripwire
//!
//! [`Storage`] is the only component that talks to the backing store. It
//! degrades to memory-only when the store is disabled or unreachable, and
//! callers never see a storage failure as an error: saves report `false`,
//! reads fall back to the in-process QA ring.

pub mod backend;
pub mod error;
pub mod ring;
pub mod sql;
pub mod storage;

pub use backend::{BackingStore, MemoryStore};
pub use error::{StorageError, StorageResult};
pub use ring::QaRing;
pub use sql::SqlStore;
pub use storage::Storage;

/// Key holding the current run state
pub const STATUS_KEY: &str = "run:status";
/// Key holding the last report
pub const REPORT_KEY: &str = "run:report";
/// List key holding the capped QA feed
pub const QA_FEED_KEY: &str = "qa:feed";
