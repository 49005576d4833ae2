//! Guardrail and watchdog monitoring
//!
//! [`Guards`] is driven by the runner: once on every phase change and once
//! per metric tick. It keeps the guardrail and watchdog state that ends up on
//! the run, and defers every intervention decision to a [`GuardHooks`]
//! implementation.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, warn};
use tripwire_config::GuardsConfig;
use tripwire_core::{GuardrailState, Metrics, Phase, RunId, WatchdogState};

/// Extension points for guard events.
///
/// Every method has a no-op default. `on_watchdog_trip` is the only one with
/// a decision: return `true` to have the runner stop the run.
pub trait GuardHooks: Send + Sync {
    fn on_phase_change(&self, _run_id: RunId, _from: Phase, _to: Phase) {}

    fn on_metric_tick(&self, _run_id: RunId, _phase: Phase, _metrics: &Metrics) {}

    fn on_guardrail_violation(&self, _run_id: RunId, _metrics: &Metrics, _threshold_ms: f64) {}

    fn on_watchdog_trip(&self, _run_id: RunId, _reason: &str) -> bool {
        false
    }
}

/// Hooks that observe nothing and never abort
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl GuardHooks for NoopHooks {}

pub struct Guards {
    run_id: RunId,
    hooks: Arc<dyn GuardHooks>,
    guardrail: GuardrailState,
    watchdog: WatchdogState,
    last_progress: Option<(f64, Instant)>,
}

impl Guards {
    pub fn new(run_id: RunId, config: &GuardsConfig, hooks: Arc<dyn GuardHooks>) -> Self {
        Self {
            run_id,
            hooks,
            guardrail: GuardrailState::new(
                config.guardrail.enabled,
                config.guardrail.p95_threshold_ms,
            ),
            watchdog: WatchdogState::new(
                config.watchdog.enabled,
                config.watchdog.no_progress_secs,
                config.watchdog.latency_threshold_ms,
            ),
            last_progress: None,
        }
    }

    pub fn guardrail(&self) -> &GuardrailState {
        &self.guardrail
    }

    pub fn watchdog(&self) -> &WatchdogState {
        &self.watchdog
    }

    pub fn on_phase_change(&mut self, from: Phase, to: Phase) {
        self.hooks.on_phase_change(self.run_id, from, to);
    }

    /// Feed the latest snapshot.
    ///
    /// Updates guardrail counters and returns a watchdog reason when p95 is
    /// past the emergency threshold.
    pub fn on_metric_tick(
        &mut self,
        phase: Phase,
        metrics: &Metrics,
        now: DateTime<Utc>,
    ) -> Option<String> {
        self.hooks.on_metric_tick(self.run_id, phase, metrics);

        if metrics.is_empty() {
            return None;
        }

        if self.guardrail.enabled {
            let violated = metrics.p95_ms > self.guardrail.p95_threshold_ms;
            self.guardrail.violated = violated;
            if violated {
                self.guardrail.violations += 1;
                self.guardrail.last_violation_at = Some(now);
                warn!(
                    "Guardrail violation in {}: p95 {:.1}ms > {:.1}ms ({} so far)",
                    phase, metrics.p95_ms, self.guardrail.p95_threshold_ms, self.guardrail.violations
                );
                self.hooks
                    .on_guardrail_violation(self.run_id, metrics, self.guardrail.p95_threshold_ms);
            }
        }

        if self.watchdog.enabled && metrics.p95_ms > self.watchdog.latency_threshold_ms {
            return Some(format!(
                "p95 latency {:.1}ms exceeded emergency threshold {:.1}ms during {}",
                metrics.p95_ms, self.watchdog.latency_threshold_ms, phase
            ));
        }
        None
    }

    /// Record progress; `false` once it has stalled past the no-progress
    /// threshold.
    pub fn check_progress(&mut self, progress: f64, now: Instant) -> bool {
        let advanced = match self.last_progress {
            Some((last, _)) => progress > last,
            None => true,
        };
        if advanced {
            self.last_progress = Some((progress, now));
            return true;
        }
        if !self.watchdog.enabled {
            return true;
        }
        let stalled_for = self
            .last_progress
            .map(|(_, at)| now.saturating_duration_since(at))
            .unwrap_or_default();
        stalled_for <= Duration::from_secs(self.watchdog.no_progress_secs)
    }

    /// Mark the watchdog as tripped and ask the hooks whether to abort
    pub fn trip_watchdog(&mut self, reason: &str) -> bool {
        if !self.watchdog.triggered {
            error!("Watchdog tripped for run {}: {}", self.run_id, reason);
        }
        self.watchdog.triggered = true;
        self.watchdog.reason = Some(reason.to_string());
        self.hooks.on_watchdog_trip(self.run_id, reason)
    }
}
