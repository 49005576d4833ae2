//! Sampled request records for the QA feed

use crate::phase::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest query or answer text kept on a feed item, in characters
pub const QA_TEXT_LIMIT: usize = 200;

/// A single sampled request, kept for qualitative inspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaFeedItem {
    pub timestamp: DateTime<Utc>,
    pub phase: Phase,
    pub latency_ms: f64,
    /// Where the answer came from (`retrieval`, `mock`, `none`, or a
    /// source name reported by the target)
    pub source: String,
    pub query: String,
    pub answer: String,
}

impl QaFeedItem {
    /// Build a feed item, truncating query and answer text
    pub fn new(
        phase: Phase,
        latency_ms: f64,
        source: impl Into<String>,
        query: &str,
        answer: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            phase,
            latency_ms,
            source: source.into(),
            query: truncate(query, QA_TEXT_LIMIT),
            answer: truncate(answer, QA_TEXT_LIMIT),
        }
    }
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
