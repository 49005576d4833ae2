//! Front-end facade over the engine

use crate::error::{EngineError, EngineResult};
use crate::runner::{Runner, RunnerContext};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tripwire_config::TripwireConfig;
use tripwire_core::{QaFeedItem, Report, RunConfig, RunId, RunState};

struct ActiveRun {
    run_id: RunId,
    runner: Arc<Runner>,
    handle: Option<JoinHandle<EngineResult<Report>>>,
}

/// Operations exposed to REST or CLI layers.
///
/// `start` returns as soon as the run is allocated; the run itself executes
/// in a background task that `wait` can join.
pub struct Controller {
    ctx: RunnerContext,
    current: Mutex<Option<ActiveRun>>,
}

impl Controller {
    pub fn new(ctx: RunnerContext) -> Self {
        Self {
            ctx,
            current: Mutex::new(None),
        }
    }

    pub async fn from_config(config: &TripwireConfig) -> EngineResult<Self> {
        Ok(Self::new(RunnerContext::from_config(config).await?))
    }

    pub fn context(&self) -> &RunnerContext {
        &self.ctx
    }

    /// Start a run; rejected while another run is active
    pub async fn start(&self, config: RunConfig) -> EngineResult<RunId> {
        let mut current = self.current.lock().await;
        let run_id = self.ctx.manager.start_run(config).await?;

        let runner = Arc::new(Runner::new(self.ctx.clone()));
        let handle = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.execute(run_id).await })
        };
        *current = Some(ActiveRun {
            run_id,
            runner,
            handle: Some(handle),
        });
        Ok(run_id)
    }

    /// State of the most recent run
    pub async fn status(&self) -> Option<RunState> {
        self.ctx.manager.current_state().await
    }

    /// Last finished report, from memory or else the backing store
    pub async fn report(&self) -> Option<Report> {
        match self.ctx.manager.last_report().await {
            Some(report) => Some(report),
            None => self.ctx.storage.load_report().await,
        }
    }

    pub async fn qa_feed(&self, limit: usize) -> Vec<QaFeedItem> {
        self.ctx.storage.get_qa_feed(limit).await
    }

    /// Ask the active run to stop. Returns false when nothing is running.
    pub async fn stop(&self) -> bool {
        let current = self.current.lock().await;
        let Some(active) = current.as_ref() else {
            return false;
        };
        if self.ctx.manager.active_run().await != Some(active.run_id) {
            return false;
        }
        info!("Stopping run {}", active.run_id);
        active.runner.stop();
        true
    }

    /// Wait for the background run to finish. `None` when no run was started
    /// or it has already been joined.
    pub async fn wait(&self) -> Option<EngineResult<Report>> {
        let handle = {
            let mut current = self.current.lock().await;
            current.as_mut().and_then(|active| active.handle.take())
        }?;
        Some(match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Run task ended abnormally: {}", e);
                Err(EngineError::Orchestration(format!("run task failed: {}", e)))
            }
        })
    }
}
