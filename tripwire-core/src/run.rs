//! Run identity and the run state aggregate

use crate::config::{Mode, RunConfig};
use crate::guard::{GuardrailState, WatchdogState};
use crate::metrics::Metrics;
use crate::phase::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque unique identifier of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Configuration layer that supplied a resolved parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideSource {
    Default,
    Mode,
    Run,
    Policy,
}

impl fmt::Display for OverrideSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideSource::Default => write!(f, "default"),
            OverrideSource::Mode => write!(f, "mode"),
            OverrideSource::Run => write!(f, "run"),
            OverrideSource::Policy => write!(f, "policy"),
        }
    }
}

/// Which layer won for one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecedenceEntry {
    pub parameter: String,
    pub source: OverrideSource,
    pub value: JsonValue,
}

/// Authoritative state of a run.
///
/// Only the run state manager mutates this; everyone else receives copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: RunId,
    pub mode: Mode,
    pub phase: Phase,
    /// Overall progress, 0 to 100
    pub progress: f64,
    pub eta_secs: f64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub phase_started_at: DateTime<Utc>,
    /// Observed seconds spent in each phase, recorded when the phase is left
    pub phase_timers: BTreeMap<Phase, f64>,
    pub metrics: Metrics,
    pub guardrail: GuardrailState,
    pub watchdog: WatchdogState,
    pub precedence_chain: Vec<PrecedenceEntry>,
    pub status: String,
    pub error: Option<String>,
}

impl RunState {
    /// Fresh state for a run entering warmup at `now`
    pub fn new(run_id: RunId, config: &RunConfig, now: DateTime<Utc>) -> Self {
        Self {
            run_id,
            mode: config.mode,
            phase: Phase::Warmup,
            progress: 0.0,
            eta_secs: config.total_duration_secs() as f64,
            started_at: now,
            updated_at: now,
            ended_at: None,
            phase_started_at: now,
            phase_timers: BTreeMap::new(),
            metrics: Metrics::empty(),
            guardrail: GuardrailState::default(),
            watchdog: WatchdogState::default(),
            precedence_chain: Vec::new(),
            status: "running".to_string(),
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Sum of all recorded phase durations, in seconds
    pub fn recorded_phase_secs(&self) -> f64 {
        self.phase_timers.values().sum()
    }
}
