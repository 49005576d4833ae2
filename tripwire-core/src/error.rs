//! Run configuration errors

use crate::phase::Phase;
use thiserror::Error;

/// Result type for run configuration construction
pub type RunConfigResult<T> = Result<T, RunConfigError>;

/// Out-of-range values rejected when a [`crate::RunConfig`] is built
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunConfigError {
    #[error("{phase} duration must be between {min} and {max} seconds, got {value}")]
    InvalidDuration {
        phase: Phase,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("{phase} target QPS must be in (0, {max}], got {value}")]
    InvalidQps { phase: Phase, value: f64, max: f64 },

    #[error("Concurrency must be between {min} and {max}, got {value}")]
    InvalidConcurrency { value: u32, min: u32, max: u32 },

    #[error("Heavy override {field} must be between {min} and {max}, got {value}")]
    InvalidHeavyOverride {
        field: &'static str,
        value: u64,
        min: u32,
        max: u32,
    },

    #[error("rerank_top_k ({rerank_top_k}) cannot exceed candidate_k ({candidate_k})")]
    RerankExceedsCandidates { candidate_k: u32, rerank_top_k: u32 },
}
