//! Report assembly

use chrono::Utc;
use std::collections::BTreeMap;
use tracing::warn;
use tripwire_core::{
    GuardrailSummary, Phase, PhaseReport, PhaseResult, Report, ReportTotals, RunConfig, RunState,
    WatchdogSummary,
};
use tripwire_storage::Storage;

pub struct Reporter;

impl Reporter {
    /// Build the final report from the finished state and per-phase results.
    ///
    /// Phases without a result (a run stopped early) are left out. Phase
    /// duration is the observed time when recorded, else the configured one.
    pub fn build_report(
        state: &RunState,
        config: &RunConfig,
        phase_results: &BTreeMap<Phase, PhaseResult>,
    ) -> Report {
        let phases: Vec<PhaseReport> = Phase::ACTIVE
            .iter()
            .filter_map(|phase| {
                let result = phase_results.get(phase)?;
                let settings = config.phase(*phase)?;
                Some(PhaseReport {
                    phase: *phase,
                    duration_secs: state
                        .phase_timers
                        .get(phase)
                        .copied()
                        .unwrap_or(settings.duration_secs as f64),
                    target_qps: settings.target_qps,
                    actual_qps: result.metrics.qps,
                    metrics: result.metrics.clone(),
                    sample_count: result.metrics.count,
                    breaker_trips: result.breaker_trips,
                })
            })
            .collect();

        let requests: u64 = phases.iter().map(|p| p.metrics.count).sum();
        let errors: u64 = phases.iter().map(|p| p.metrics.errors).sum();
        let totals = ReportTotals {
            requests,
            errors,
            error_rate: if requests > 0 {
                errors as f64 / requests as f64
            } else {
                0.0
            },
        };

        Report {
            run_id: state.run_id,
            mode: state.mode,
            final_phase: state.phase,
            status: state.status.clone(),
            error: state.error.clone(),
            config: config.clone(),
            started_at: state.started_at,
            ended_at: state.ended_at,
            phases,
            totals,
            guardrail: GuardrailSummary {
                enabled: state.guardrail.enabled,
                p95_threshold_ms: state.guardrail.p95_threshold_ms,
                violations: state.guardrail.violations,
                last_violation_at: state.guardrail.last_violation_at,
            },
            watchdog: WatchdogSummary {
                enabled: state.watchdog.enabled,
                triggered: state.watchdog.triggered,
                reason: state.watchdog.reason.clone(),
            },
            precedence_chain: state.precedence_chain.clone(),
            generated_at: Utc::now(),
        }
    }

    /// Persist a report; a `false` return is not fatal
    pub async fn save_report(storage: &Storage, report: &Report) -> bool {
        let saved = storage.save_report(report).await;
        if !saved && storage.is_available() {
            warn!("Report for run {} was not persisted", report.run_id);
        }
        saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripwire_core::{Metrics, Mode, RunId};

    fn result(count: u64, errors: u64, qps: f64) -> PhaseResult {
        PhaseResult {
            metrics: Metrics {
                count,
                errors,
                qps,
                error_rate: errors as f64 / count as f64,
                ..Metrics::empty()
            },
            breaker_trips: errors / 10,
        }
    }

    #[test]
    fn test_totals_sum_across_phases() {
        let config = RunConfig::builder(Mode::Burst).build().unwrap();
        let mut state = RunState::new(RunId::new(), &config, Utc::now());
        state.phase = Phase::Complete;
        state.status = "complete".to_string();
        state.phase_timers.insert(Phase::Warmup, 30.5);

        let mut results = BTreeMap::new();
        results.insert(Phase::Warmup, result(150, 0, 5.0));
        results.insert(Phase::Baseline, result(600, 6, 10.0));
        results.insert(Phase::Trip, result(3000, 30, 50.0));
        results.insert(Phase::Recovery, result(600, 4, 10.0));

        let report = Reporter::build_report(&state, &config, &results);
        assert_eq!(report.phases.len(), 4);
        assert_eq!(report.totals.requests, 4350);
        assert_eq!(report.totals.errors, 40);
        assert!((report.totals.error_rate - 40.0 / 4350.0).abs() < 1e-12);

        let warmup = report.phase(Phase::Warmup).unwrap();
        assert_eq!(warmup.duration_secs, 30.5);
        assert_eq!(warmup.target_qps, 5.0);
        assert_eq!(warmup.sample_count, 150);

        let trip = report.phase(Phase::Trip).unwrap();
        assert_eq!(trip.duration_secs, 60.0);
        assert_eq!(trip.actual_qps, 50.0);
        assert_eq!(trip.breaker_trips, 3);
    }

    #[test]
    fn test_partial_run_reports_ran_phases_only() {
        let config = RunConfig::builder(Mode::Heavy).build().unwrap();
        let state = RunState::new(RunId::new(), &config, Utc::now());
        let mut results = BTreeMap::new();
        results.insert(Phase::Warmup, result(10, 0, 5.0));

        let report = Reporter::build_report(&state, &config, &results);
        assert_eq!(report.phases.len(), 1);
        assert!(report.phase(Phase::Trip).is_none());
        assert_eq!(report.totals.error_rate, 0.0);
    }
}
