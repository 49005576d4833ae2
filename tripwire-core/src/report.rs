//! Final run report

use crate::config::{Mode, RunConfig};
use crate::metrics::Metrics;
use crate::phase::Phase;
use crate::run::{PrecedenceEntry, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a finished load generator hands back for one phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub metrics: Metrics,
    /// Times the circuit breaker opened during the phase
    pub breaker_trips: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub duration_secs: f64,
    pub target_qps: f64,
    pub actual_qps: f64,
    pub metrics: Metrics,
    pub sample_count: u64,
    pub breaker_trips: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportTotals {
    pub requests: u64,
    pub errors: u64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardrailSummary {
    pub enabled: bool,
    pub p95_threshold_ms: f64,
    pub violations: u64,
    pub last_violation_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchdogSummary {
    pub enabled: bool,
    pub triggered: bool,
    pub reason: Option<String>,
}

/// Write-once document describing a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: RunId,
    pub mode: Mode,
    pub final_phase: Phase,
    pub status: String,
    pub error: Option<String>,
    pub config: RunConfig,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub phases: Vec<PhaseReport>,
    pub totals: ReportTotals,
    pub guardrail: GuardrailSummary,
    pub watchdog: WatchdogSummary,
    pub precedence_chain: Vec<PrecedenceEntry>,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }
}
