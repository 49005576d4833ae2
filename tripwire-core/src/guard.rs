//! Guardrail and watchdog state carried on the run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Soft latency monitor; counts violations but never stops a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardrailState {
    pub enabled: bool,
    pub p95_threshold_ms: f64,
    pub violated: bool,
    pub violations: u64,
    pub last_violation_at: Option<DateTime<Utc>>,
}

impl GuardrailState {
    pub fn new(enabled: bool, p95_threshold_ms: f64) -> Self {
        Self {
            enabled,
            p95_threshold_ms,
            ..Default::default()
        }
    }
}

/// Stuck-run and emergency-latency monitor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchdogState {
    pub enabled: bool,
    pub no_progress_secs: u64,
    pub latency_threshold_ms: f64,
    pub triggered: bool,
    pub reason: Option<String>,
}

impl WatchdogState {
    pub fn new(enabled: bool, no_progress_secs: u64, latency_threshold_ms: f64) -> Self {
        Self {
            enabled,
            no_progress_secs,
            latency_threshold_ms,
            ..Default::default()
        }
    }
}
