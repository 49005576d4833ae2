//! Authoritative run state
//!
//! [`RunStateManager`] owns every [`RunState`] in a registry keyed by run id.
//! All mutation goes through one async lock, and each successful mutation is
//! mirrored to storage before the lock is released, so the persisted status
//! never runs ahead of or behind the in-memory one.

use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use tripwire_core::{
    GuardrailState, Metrics, Phase, PrecedenceEntry, Report, RunConfig, RunId, RunState,
    WatchdogState,
};
use tripwire_storage::Storage;

/// Partial update of a run; unset fields are left alone
#[derive(Debug, Clone, Default)]
pub struct RunStatePatch {
    pub phase: Option<Phase>,
    pub progress: Option<f64>,
    pub eta_secs: Option<f64>,
    pub metrics: Option<Metrics>,
    pub guardrail: Option<GuardrailState>,
    pub watchdog: Option<WatchdogState>,
    pub precedence_chain: Option<Vec<PrecedenceEntry>>,
    pub status: Option<String>,
    pub error: Option<String>,
}

impl RunStatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn eta_secs(mut self, eta_secs: f64) -> Self {
        self.eta_secs = Some(eta_secs);
        self
    }

    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn guardrail(mut self, guardrail: GuardrailState) -> Self {
        self.guardrail = Some(guardrail);
        self
    }

    pub fn watchdog(mut self, watchdog: WatchdogState) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    pub fn precedence_chain(mut self, chain: Vec<PrecedenceEntry>) -> Self {
        self.precedence_chain = Some(chain);
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

struct RunEntry {
    state: RunState,
    config: RunConfig,
    report: Option<Report>,
}

#[derive(Default)]
struct Registry {
    runs: HashMap<RunId, RunEntry>,
    latest: Option<RunId>,
    latest_report: Option<RunId>,
}

impl Registry {
    fn active(&self) -> Option<RunId> {
        self.latest
            .and_then(|id| self.runs.get(&id))
            .filter(|entry| !entry.state.is_terminal())
            .map(|entry| entry.state.run_id)
    }
}

pub struct RunStateManager {
    registry: Mutex<Registry>,
    storage: Arc<Storage>,
}

impl RunStateManager {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            storage,
        }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Allocate a new run in warmup.
    ///
    /// Rejected while another run is still active; nothing is created then.
    pub async fn start_run(&self, config: RunConfig) -> EngineResult<RunId> {
        let mut registry = self.registry.lock().await;
        if let Some(active) = registry.active() {
            return Err(EngineError::RunActive(active));
        }

        let run_id = RunId::new();
        let state = RunState::new(run_id, &config, Utc::now());
        info!("Starting run {} in {} mode", run_id, config.mode);

        self.mirror(&state).await;
        registry.runs.insert(
            run_id,
            RunEntry {
                state,
                config,
                report: None,
            },
        );
        registry.latest = Some(run_id);
        Ok(run_id)
    }

    /// Apply a patch atomically. Returns false for unknown or finished runs
    /// and for illegal phase transitions, leaving the state untouched.
    pub async fn update(&self, run_id: RunId, patch: RunStatePatch) -> bool {
        let mut registry = self.registry.lock().await;
        let Some(entry) = registry.runs.get_mut(&run_id) else {
            warn!("Update for unknown run {}", run_id);
            return false;
        };
        let state = &mut entry.state;
        if state.is_terminal() {
            debug!("Ignoring update for finished run {}", run_id);
            return false;
        }

        let now = Utc::now();
        let mut phase_changed = false;
        if let Some(next) = patch.phase.filter(|p| *p != state.phase) {
            if !state.phase.can_transition_to(next) {
                warn!(
                    "Rejected transition {} -> {} for run {}",
                    state.phase, next, run_id
                );
                return false;
            }
            let spent = seconds_between(state.phase_started_at, now);
            state.phase_timers.insert(state.phase, spent);
            info!("Run {} phase {} -> {} after {:.2}s", run_id, state.phase, next, spent);
            state.phase = next;
            state.phase_started_at = now;
            if next.is_terminal() {
                state.ended_at.get_or_insert(now);
            }
            phase_changed = true;
        }

        if let Some(progress) = patch.progress.filter(|p| !p.is_nan()) {
            let progress = progress.clamp(0.0, 100.0);
            state.progress = if phase_changed {
                progress
            } else {
                state.progress.max(progress)
            };
        }
        if let Some(eta) = patch.eta_secs.filter(|e| !e.is_nan()) {
            state.eta_secs = eta.max(0.0);
        }
        if let Some(metrics) = patch.metrics {
            state.metrics = metrics;
        }
        if let Some(guardrail) = patch.guardrail {
            state.guardrail = guardrail;
        }
        if let Some(watchdog) = patch.watchdog {
            state.watchdog = watchdog;
        }
        if let Some(chain) = patch.precedence_chain {
            state.precedence_chain = chain;
        }
        if let Some(status) = patch.status {
            state.status = status;
        }
        if let Some(error) = patch.error {
            state.error = Some(error);
        }
        state.updated_at = now;

        let snapshot = state.clone();
        self.mirror(&snapshot).await;
        true
    }

    pub async fn complete(&self, run_id: RunId) -> bool {
        let patch = RunStatePatch::new()
            .phase(Phase::Complete)
            .progress(100.0)
            .eta_secs(0.0)
            .status("complete");
        let done = self.update(run_id, patch).await;
        if done {
            info!("Run {} complete", run_id);
        }
        done
    }

    pub async fn cancel(&self, run_id: RunId, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let patch = RunStatePatch::new()
            .phase(Phase::Canceled)
            .eta_secs(0.0)
            .status("canceled")
            .error(reason.clone());
        let done = self.update(run_id, patch).await;
        if done {
            info!("Run {} canceled: {}", run_id, reason);
        }
        done
    }

    pub async fn fail(&self, run_id: RunId, message: impl Into<String>) -> bool {
        let message = message.into();
        let patch = RunStatePatch::new()
            .phase(Phase::Error)
            .eta_secs(0.0)
            .status("error")
            .error(message.clone());
        let done = self.update(run_id, patch).await;
        if done {
            tracing::error!("Run {} failed: {}", run_id, message);
        }
        done
    }

    /// State of the most recently started run
    pub async fn current_state(&self) -> Option<RunState> {
        let registry = self.registry.lock().await;
        registry
            .latest
            .and_then(|id| registry.runs.get(&id))
            .map(|entry| entry.state.clone())
    }

    pub async fn state(&self, run_id: RunId) -> Option<RunState> {
        let registry = self.registry.lock().await;
        registry.runs.get(&run_id).map(|entry| entry.state.clone())
    }

    pub async fn active_run(&self) -> Option<RunId> {
        self.registry.lock().await.active()
    }

    pub async fn get_config(&self, run_id: RunId) -> Option<RunConfig> {
        let registry = self.registry.lock().await;
        registry.runs.get(&run_id).map(|entry| entry.config.clone())
    }

    /// Keep a finished run's report. A report is written once; later
    /// attempts return false.
    pub async fn attach_report(&self, run_id: RunId, report: Report) -> bool {
        let mut registry = self.registry.lock().await;
        let Some(entry) = registry.runs.get_mut(&run_id) else {
            return false;
        };
        if entry.report.is_some() {
            warn!("Report for run {} already attached", run_id);
            return false;
        }
        entry.report = Some(report);
        registry.latest_report = Some(run_id);
        true
    }

    pub async fn report(&self, run_id: RunId) -> Option<Report> {
        let registry = self.registry.lock().await;
        registry.runs.get(&run_id).and_then(|entry| entry.report.clone())
    }

    /// Most recently attached report
    pub async fn last_report(&self) -> Option<Report> {
        let registry = self.registry.lock().await;
        registry
            .latest_report
            .and_then(|id| registry.runs.get(&id))
            .and_then(|entry| entry.report.clone())
    }

    async fn mirror(&self, state: &RunState) {
        if self.storage.is_available() && !self.storage.save_status(state).await {
            warn!("Run {} state not mirrored to storage", state.run_id);
        }
    }
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start)
        .num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or(0.0)
        .max(0.0)
}
