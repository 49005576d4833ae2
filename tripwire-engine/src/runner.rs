//! Run lifecycle orchestration
//!
//! A [`Runner`] executes one run: it resolves request parameters, then walks
//! the four active phases with a fresh [`LoadGenerator`] each. Once per tick
//! it publishes progress, ETA and metrics to the state manager, feeds the
//! guards and acts on the watchdog. The run ends complete, canceled (stop
//! request or watchdog abort) or errored, and always with a report.

use crate::error::{EngineError, EngineResult};
use crate::ground_truth::GroundTruth;
use crate::guards::{GuardHooks, Guards, NoopHooks};
use crate::loadgen::{LoadGenerator, LoadGeneratorConfig};
use crate::overrides::resolve_overrides;
use crate::query_bank::QueryBank;
use crate::reporter::Reporter;
use crate::signal::StopSignal;
use crate::state::{RunStateManager, RunStatePatch};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tripwire_config::{GuardsConfig, OverridePolicy, QueryBankConfig, TripwireConfig};
use tripwire_core::{Phase, PhaseResult, Report, RunConfig, RunId};
use tripwire_http::{HttpTargetClient, TargetClient, TargetClientConfig};
use tripwire_resilience::CircuitBreakerConfig;
use tripwire_storage::Storage;

/// Collaborators shared by every run of an engine instance
#[derive(Clone)]
pub struct RunnerContext {
    pub manager: Arc<RunStateManager>,
    pub storage: Arc<Storage>,
    pub client: Arc<dyn TargetClient>,
    pub ground_truth: Option<Arc<GroundTruth>>,
    pub query_bank: QueryBankConfig,
    pub guards: GuardsConfig,
    pub hooks: Arc<dyn GuardHooks>,
    pub policy: OverridePolicy,
    pub default_top_k: u32,
    pub breaker: CircuitBreakerConfig,
    /// Interval of the progress loop
    pub tick: Duration,
}

impl RunnerContext {
    /// Minimal context around an existing client and storage
    pub fn new(client: Arc<dyn TargetClient>, storage: Arc<Storage>) -> Self {
        Self {
            manager: Arc::new(RunStateManager::new(storage.clone())),
            storage,
            client,
            ground_truth: None,
            query_bank: QueryBankConfig::default(),
            guards: GuardsConfig::default(),
            hooks: Arc::new(NoopHooks),
            policy: OverridePolicy::default(),
            default_top_k: 10,
            breaker: CircuitBreakerConfig::default(),
            tick: Duration::from_secs(1),
        }
    }

    /// Wire everything up from service configuration.
    ///
    /// Storage never fails here; it degrades to memory-only instead.
    pub async fn from_config(config: &TripwireConfig) -> EngineResult<Self> {
        config.validate_all()?;

        let storage = Arc::new(Storage::connect(&config.storage).await);
        let client = HttpTargetClient::new(TargetClientConfig::from(&config.target))?;

        let mut ctx = Self::new(Arc::new(client), storage);
        ctx.ground_truth = GroundTruth::from_config(&config.query_bank).map(Arc::new);
        ctx.query_bank = config.query_bank.clone();
        ctx.guards = config.guards.clone();
        ctx.breaker = config.breaker.clone();
        ctx.policy = config.overrides.clone();
        ctx.default_top_k = config.target.top_k;
        Ok(ctx)
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn GuardHooks>) -> Self {
        self.hooks = hooks;
        self
    }
}

pub struct Runner {
    ctx: RunnerContext,
    stop: StopSignal,
    active: Mutex<Option<Arc<LoadGenerator>>>,
}

impl Runner {
    pub fn new(ctx: RunnerContext) -> Self {
        Self {
            ctx,
            stop: StopSignal::new(),
            active: Mutex::new(None),
        }
    }

    /// Allocate a run and execute it to the end.
    ///
    /// A stop requested for an earlier run does not carry over.
    pub async fn run(&self, config: RunConfig) -> EngineResult<Report> {
        let run_id = self.ctx.manager.start_run(config).await?;
        self.stop.reset();
        self.execute(run_id).await
    }

    /// Execute a run already allocated by the state manager.
    ///
    /// Orchestration failures mark the run as errored and are returned as
    /// [`EngineError::Orchestration`].
    pub async fn execute(&self, run_id: RunId) -> EngineResult<Report> {
        match self.drive(run_id).await {
            Ok(report) => Ok(report),
            Err(e) => {
                let message = match e {
                    EngineError::Orchestration(message) => message,
                    other => other.to_string(),
                };
                self.ctx.manager.fail(run_id, message.clone()).await;
                Err(EngineError::Orchestration(message))
            }
        }
    }

    /// Request a cooperative stop; the run ends as canceled once the active
    /// phase has drained
    pub fn stop(&self) {
        info!("Stop requested");
        self.stop.trigger();
        if let Some(lg) = self.active.lock().as_ref() {
            lg.stop();
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.is_triggered()
    }

    async fn drive(&self, run_id: RunId) -> EngineResult<Report> {
        let ctx = &self.ctx;
        let manager = &ctx.manager;
        let config = manager
            .get_config(run_id)
            .await
            .ok_or(EngineError::RunNotFound(run_id))?;

        let (params, chain) = resolve_overrides(&config, ctx.default_top_k, &ctx.policy);
        let mut guards = Guards::new(run_id, &ctx.guards, ctx.hooks.clone());
        manager
            .update(
                run_id,
                RunStatePatch::new()
                    .precedence_chain(chain)
                    .guardrail(guards.guardrail().clone())
                    .watchdog(guards.watchdog().clone()),
            )
            .await;

        let queries = Arc::new(QueryBank::load(
            &ctx.query_bank,
            ctx.ground_truth.as_deref(),
            config.query_diversity,
        ));
        info!(
            "Run {}: {} mode, {}s total, {} queries",
            run_id,
            config.mode,
            config.total_duration_secs(),
            queries.len()
        );

        let mut results: BTreeMap<Phase, PhaseResult> = BTreeMap::new();
        let mut cancel_reason: Option<String> = None;
        let mut current = Phase::Warmup;

        for phase in Phase::ACTIVE {
            if self.stop.is_triggered() {
                cancel_reason = Some("stop requested".to_string());
                break;
            }
            if phase != current {
                if !manager.update(run_id, RunStatePatch::new().phase(phase)).await {
                    return Err(EngineError::Orchestration(format!(
                        "run {} could not enter {}",
                        run_id, phase
                    )));
                }
                guards.on_phase_change(current, phase);
                current = phase;
            }

            let mut lg_config = LoadGeneratorConfig::for_phase(&config, &params, phase)
                .ok_or_else(|| {
                    EngineError::Orchestration(format!("no settings for phase {}", phase))
                })?;
            lg_config.breaker = ctx.breaker.clone();

            let lg = Arc::new(LoadGenerator::new(
                lg_config,
                ctx.client.clone(),
                queries.clone(),
                ctx.ground_truth.clone(),
                ctx.storage.clone(),
            ));
            *self.active.lock() = Some(lg.clone());
            let (result, abort) = self.run_phase(run_id, &config, &lg, &mut guards).await;
            *self.active.lock() = None;

            results.insert(phase, result);
            if abort.is_some() {
                cancel_reason = abort;
                break;
            }
        }

        match cancel_reason {
            Some(reason) => {
                guards.on_phase_change(current, Phase::Canceled);
                if !manager.cancel(run_id, reason).await {
                    return Err(EngineError::Orchestration(format!(
                        "run {} could not be canceled",
                        run_id
                    )));
                }
            }
            None => {
                guards.on_phase_change(current, Phase::Complete);
                if !manager.complete(run_id).await {
                    return Err(EngineError::Orchestration(format!(
                        "run {} could not be completed",
                        run_id
                    )));
                }
            }
        }

        let state = manager
            .state(run_id)
            .await
            .ok_or(EngineError::RunNotFound(run_id))?;
        let report = Reporter::build_report(&state, &config, &results);
        Reporter::save_report(&ctx.storage, &report).await;
        manager.attach_report(run_id, report.clone()).await;
        info!(
            "Run {} finished as {}: {} requests, {} errors",
            run_id, report.final_phase, report.totals.requests, report.totals.errors
        );
        Ok(report)
    }

    /// Run one phase's generator under the progress loop.
    ///
    /// Returns the phase result and, when the phase was cut short, why.
    async fn run_phase(
        &self,
        run_id: RunId,
        config: &RunConfig,
        lg: &LoadGenerator,
        guards: &mut Guards,
    ) -> (PhaseResult, Option<String>) {
        let manager = &self.ctx.manager;
        let phase = lg.config().phase;
        let total = config.total_duration_secs().max(1) as f64;
        let offset = config.offset_secs(phase) as f64;
        let phase_secs = lg.config().duration.as_secs_f64();

        let mut abort: Option<String> = None;
        let started = Instant::now();
        let mut ticker = tokio::time::interval_at(started + self.ctx.tick, self.ctx.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let generation = lg.run();
        tokio::pin!(generation);

        let result = loop {
            tokio::select! {
                result = &mut generation => break result,
                _ = ticker.tick() => {
                    if self.stop.is_triggered() && abort.is_none() {
                        lg.stop();
                        abort = Some("stop requested".to_string());
                    }

                    let elapsed = started.elapsed().as_secs_f64().min(phase_secs);
                    let progress = (offset + elapsed) / total * 100.0;
                    let eta = total - offset - elapsed;
                    let metrics = lg.get_metrics();

                    let latency_trip = guards.on_metric_tick(phase, &metrics, Utc::now());
                    let stalled = !guards.check_progress(progress, Instant::now());
                    let reason = latency_trip.or_else(|| {
                        stalled.then(|| {
                            format!(
                                "no progress for over {}s during {}",
                                guards.watchdog().no_progress_secs, phase
                            )
                        })
                    });
                    if let Some(reason) = reason {
                        if guards.trip_watchdog(&reason) && abort.is_none() {
                            warn!("Watchdog hook aborted run {}: {}", run_id, reason);
                            lg.stop();
                            abort = Some(format!("watchdog: {}", reason));
                        }
                    }

                    let patch = RunStatePatch::new()
                        .progress(progress)
                        .eta_secs(eta)
                        .metrics(metrics)
                        .guardrail(guards.guardrail().clone())
                        .watchdog(guards.watchdog().clone());
                    if !manager.update(run_id, patch).await {
                        debug!("Progress update for run {} not applied", run_id);
                    }
                }
            }
        };

        if abort.is_none() && self.stop.is_triggered() {
            abort = Some("stop requested".to_string());
        }
        manager
            .update(
                run_id,
                RunStatePatch::new()
                    .metrics(result.metrics.clone())
                    .guardrail(guards.guardrail().clone())
                    .watchdog(guards.watchdog().clone()),
            )
            .await;
        (result, abort)
    }
}
