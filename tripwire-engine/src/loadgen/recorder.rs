//! Request outcome accumulation

use parking_lot::Mutex;
use tokio::time::Instant;
use tripwire_core::Metrics;

/// Per-phase counters and latency samples.
///
/// Samples are kept in a sorted buffer plus an unsorted tail of new
/// arrivals. A snapshot sorts the tail and merges it in, so repeated
/// snapshots only pay for what arrived since the last one.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    inner: Mutex<RecorderState>,
}

#[derive(Debug, Default)]
struct RecorderState {
    sorted: Vec<f64>,
    pending: Vec<f64>,
    count: u64,
    errors: u64,
    recall_sum: f64,
    recall_samples: u64,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the throughput clock
    pub fn start(&self) {
        let mut state = self.inner.lock();
        state.started_at.get_or_insert_with(Instant::now);
    }

    /// Freeze the throughput clock
    pub fn finish(&self) {
        let mut state = self.inner.lock();
        state.finished_at.get_or_insert_with(Instant::now);
    }

    pub fn record_success(&self, latency_ms: f64, recall: Option<f64>) {
        let mut state = self.inner.lock();
        state.count += 1;
        state.pending.push(latency_ms);
        if let Some(recall) = recall {
            state.recall_sum += recall;
            state.recall_samples += 1;
        }
    }

    pub fn record_error(&self) {
        let mut state = self.inner.lock();
        state.count += 1;
        state.errors += 1;
    }

    pub fn count(&self) -> u64 {
        self.inner.lock().count
    }

    pub fn snapshot(&self) -> Metrics {
        let mut state = self.inner.lock();
        state.merge_pending();

        if state.count == 0 {
            return Metrics::empty();
        }

        let elapsed = match (state.started_at, state.finished_at) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Default::default(),
        }
        .as_secs_f64();

        let sorted = &state.sorted;
        Metrics {
            count: state.count,
            qps: if elapsed > 0.0 {
                state.count as f64 / elapsed
            } else {
                0.0
            },
            p50_ms: percentile(sorted, 50.0),
            p95_ms: percentile(sorted, 95.0),
            p99_ms: percentile(sorted, 99.0),
            max_ms: sorted.last().copied().unwrap_or(0.0),
            errors: state.errors,
            error_rate: state.errors as f64 / state.count as f64,
            recall_at_10: (state.recall_samples > 0)
                .then(|| state.recall_sum / state.recall_samples as f64),
        }
    }
}

impl RecorderState {
    fn merge_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut tail = std::mem::take(&mut self.pending);
        tail.sort_by(f64::total_cmp);

        let head = std::mem::take(&mut self.sorted);
        let mut merged = Vec::with_capacity(head.len() + tail.len());
        let (mut i, mut j) = (0, 0);
        while i < head.len() && j < tail.len() {
            if head[i].total_cmp(&tail[j]).is_le() {
                merged.push(head[i]);
                i += 1;
            } else {
                merged.push(tail[j]);
                j += 1;
            }
        }
        merged.extend_from_slice(&head[i..]);
        merged.extend_from_slice(&tail[j..]);
        self.sorted = merged;
    }
}

/// Nearest-rank percentile over ascending samples; 0 when empty
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
