//! Point-in-time metric snapshots

use serde::{Deserialize, Serialize};

/// Immutable snapshot of a load generator's counters and latency percentiles.
///
/// Latencies are in milliseconds. A snapshot is replaced wholesale on every
/// tick and never patched field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub count: u64,
    pub qps: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
    pub errors: u64,
    pub error_rate: f64,
    /// Mean Recall@10 over requests that had ground truth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recall_at_10: Option<f64>,
}

impl Metrics {
    /// All-zero snapshot, used before any request completes
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
