//! Rate-controlled, concurrency-bounded load generation
//!
//! A dispatcher ticks at the target rate and hands tickets to a fixed set of
//! workers over a bounded channel. Each worker holds a semaphore permit for
//! the duration of its request, so in-flight work never exceeds the
//! concurrency ceiling. When the channel is full the ticket is dropped: the
//! target is already saturated at the ceiling.

mod config;
mod recorder;

pub use config::{LoadGeneratorConfig, DEFAULT_SAMPLE_RATE};
pub use recorder::{percentile, MetricsRecorder};

use crate::ground_truth::GroundTruth;
use crate::query_bank::QueryBank;
use crate::signal::StopSignal;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use tripwire_core::{Metrics, PhaseResult, QaFeedItem};
use tripwire_http::TargetClient;
use tripwire_resilience::CircuitBreaker;
use tripwire_storage::Storage;
use uuid::Uuid;

struct Shared {
    config: LoadGeneratorConfig,
    client: Arc<dyn TargetClient>,
    queries: Arc<QueryBank>,
    ground_truth: Option<Arc<GroundTruth>>,
    storage: Arc<Storage>,
    breaker: CircuitBreaker,
    recorder: MetricsRecorder,
    permits: Semaphore,
    shed: AtomicU64,
}

/// Load generator for a single phase.
///
/// `run` drives traffic until the phase duration elapses or `stop` is
/// called, then waits for in-flight requests to finish.
pub struct LoadGenerator {
    shared: Arc<Shared>,
    stop: StopSignal,
    started: AtomicBool,
}

impl LoadGenerator {
    pub fn new(
        config: LoadGeneratorConfig,
        client: Arc<dyn TargetClient>,
        queries: Arc<QueryBank>,
        ground_truth: Option<Arc<GroundTruth>>,
        storage: Arc<Storage>,
    ) -> Self {
        let breaker = CircuitBreaker::new(config.breaker.clone());
        let permits = Semaphore::new(config.concurrency.max(1) as usize);
        Self {
            shared: Arc::new(Shared {
                config,
                client,
                queries,
                ground_truth,
                storage,
                breaker,
                recorder: MetricsRecorder::new(),
                permits,
                shed: AtomicU64::new(0),
            }),
            stop: StopSignal::new(),
            started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &LoadGeneratorConfig {
        &self.shared.config
    }

    pub fn get_metrics(&self) -> Metrics {
        self.shared.recorder.snapshot()
    }

    /// Times the circuit breaker has opened
    pub fn breaker_trips(&self) -> u64 {
        self.shared.breaker.times_opened()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.shared.breaker
    }

    /// Ask the generator to wind down; in-flight requests still complete
    pub fn stop(&self) {
        self.stop.trigger();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_triggered()
    }

    /// Drive the phase to completion and return its final numbers.
    ///
    /// A generator runs once; later calls return the existing result.
    pub async fn run(&self) -> PhaseResult {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Load generator for {} already ran", self.shared.config.phase);
            return self.result();
        }

        let config = &self.shared.config;
        let workers = config.worker_count();
        let (interval, batch) = config.dispatch_plan();
        info!(
            "Starting {} load: {:.1} qps for {:?}, {} workers, ceiling {}",
            config.phase, config.target_qps, config.duration, workers, config.concurrency
        );

        // Stops dispatch and idle workers, for both deadline and external stop
        let done = StopSignal::new();
        let (tx, rx) = mpsc::channel::<()>(workers * 2 + batch as usize);
        let rx = Arc::new(Mutex::new(rx));

        self.shared.recorder.start();

        let mut handles = Vec::with_capacity(workers + 1);
        handles.push(tokio::spawn(dispatch(
            self.shared.clone(),
            tx,
            interval,
            batch,
            done.clone(),
        )));
        for id in 0..workers {
            handles.push(tokio::spawn(worker(
                id,
                self.shared.clone(),
                rx.clone(),
                done.clone(),
            )));
        }

        tokio::select! {
            _ = tokio::time::sleep(config.duration) => {
                debug!("{} duration elapsed", config.phase);
            }
            _ = self.stop.triggered() => {
                info!("{} load generator stopped early", config.phase);
            }
        }
        done.trigger();

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                warn!("Load generator task failed: {}", e);
            }
        }
        self.shared.recorder.finish();

        let result = self.result();
        let shed = self.shared.shed.load(Ordering::Relaxed);
        info!(
            "Finished {}: {} requests, {} errors, p95 {:.1}ms, breaker opened {} times, {} dispatches shed",
            config.phase,
            result.metrics.count,
            result.metrics.errors,
            result.metrics.p95_ms,
            result.breaker_trips,
            shed
        );
        result
    }

    fn result(&self) -> PhaseResult {
        PhaseResult {
            metrics: self.get_metrics(),
            breaker_trips: self.breaker_trips(),
        }
    }
}

async fn dispatch(
    shared: Arc<Shared>,
    tx: mpsc::Sender<()>,
    every: std::time::Duration,
    batch: u32,
    done: StopSignal,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = done.triggered() => break,
            _ = ticker.tick() => {
                for _ in 0..batch {
                    match tx.try_send(()) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(())) => {
                            shared.shed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(mpsc::error::TrySendError::Closed(())) => return,
                    }
                }
            }
        }
    }
}

async fn worker(
    id: usize,
    shared: Arc<Shared>,
    tickets: Arc<Mutex<mpsc::Receiver<()>>>,
    done: StopSignal,
) {
    trace!("worker {} started", id);
    loop {
        let ticket = tokio::select! {
            biased;
            _ = done.triggered() => None,
            ticket = next_ticket(&tickets) => ticket,
        };
        if ticket.is_none() {
            break;
        }

        if done.is_triggered() {
            break;
        }

        // Hold work while the breaker is open or its half-open trial is out
        let mut deferred = false;
        while let Some(wait) = shared.breaker.try_acquire() {
            if !deferred {
                shared.breaker.record_deferral();
                deferred = true;
            }
            trace!("worker {} deferring for {:?}", id, wait);
            tokio::select! {
                _ = done.triggered() => return,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        let Ok(_permit) = shared.permits.acquire().await else {
            break;
        };
        execute(&shared).await;
    }
    trace!("worker {} exiting", id);
}

async fn next_ticket(tickets: &Mutex<mpsc::Receiver<()>>) -> Option<()> {
    tickets.lock().await.recv().await
}

async fn execute(shared: &Shared) {
    let config = &shared.config;
    let request = config.request_for(shared.queries.next());
    let cache_bust = config.cache_bypass.then(|| Uuid::new_v4().to_string());

    let started = Instant::now();
    if !config.network_delay.is_zero() {
        tokio::time::sleep(config.network_delay).await;
    }
    let outcome = shared.client.search(&request, cache_bust.as_deref()).await;
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    match outcome {
        Ok(response) => {
            shared.breaker.record_success();
            let recall = shared
                .ground_truth
                .as_ref()
                .and_then(|gt| gt.recall_for(&request.query, response.doc_ids()));
            shared.recorder.record_success(latency_ms, recall);

            if fastrand::f64() < config.sample_rate {
                let answer = response.answers.first().map(String::as_str).unwrap_or("");
                let item = QaFeedItem::new(
                    config.phase,
                    latency_ms,
                    response.hit_source(),
                    &request.query,
                    answer,
                );
                shared.storage.append_qa_feed(item).await;
            }
        }
        Err(e) => {
            shared.breaker.record_failure();
            shared.recorder.record_error();
            debug!("{} request failed after {:.1}ms: {}", config.phase, latency_ms, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tripwire_core::{Phase, PhaseSettings};
    use tripwire_http::{SearchRequest, SearchResponse, TargetError};
    use tripwire_resilience::CircuitBreakerConfig;

    #[derive(Default)]
    struct StubTarget {
        fail: bool,
        /// Fail this many calls, then succeed
        fail_first: usize,
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl TargetClient for StubTarget {
        async fn search(
            &self,
            request: &SearchRequest,
            _cache_bust: Option<&str>,
        ) -> Result<SearchResponse, TargetError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail || call < self.fail_first {
                return Err(TargetError::Status { status: 500 });
            }
            Ok(SearchResponse {
                answers: vec![format!("answer to {}", request.query)],
                doc_ids: Some(vec!["d1".to_string()]),
                ..Default::default()
            })
        }
    }

    fn generator(config: LoadGeneratorConfig, target: Arc<StubTarget>) -> LoadGenerator {
        LoadGenerator::new(
            config,
            target,
            Arc::new(QueryBank::synthetic(false)),
            None,
            Arc::new(Storage::memory_only(200)),
        )
    }

    #[tokio::test]
    async fn test_paced_run_hits_target_rate() {
        let target = Arc::new(StubTarget::default());
        let config = LoadGeneratorConfig::new(Phase::Baseline, PhaseSettings::new(1, 20.0), 4, 10);
        let lg = generator(config, target.clone());

        let result = lg.run().await;
        let count = result.metrics.count;
        assert!((16..=24).contains(&count), "count was {}", count);
        assert_eq!(result.metrics.errors, 0);
        assert_eq!(count as usize, target.calls.load(Ordering::SeqCst));
        assert_eq!(result.breaker_trips, 0);
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_ceiling() {
        let target = Arc::new(StubTarget {
            delay: Duration::from_millis(200),
            ..Default::default()
        });
        let config = LoadGeneratorConfig::new(Phase::Trip, PhaseSettings::new(1, 100.0), 3, 10);
        let lg = generator(config, target.clone());

        lg.run().await;
        assert!(target.peak.load(Ordering::SeqCst) <= 3);
        assert!(target.calls.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn test_stop_ends_run_early() {
        let target = Arc::new(StubTarget::default());
        let config = LoadGeneratorConfig::new(Phase::Warmup, PhaseSettings::new(30, 10.0), 2, 10);
        let lg = Arc::new(generator(config, target));

        let runner = {
            let lg = lg.clone();
            tokio::spawn(async move { lg.run().await })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        lg.stop();

        let result = tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .unwrap()
            .unwrap();
        assert!(lg.is_stopped());
        assert!(result.metrics.count < 30 * 10);
    }

    #[tokio::test]
    async fn test_failing_target_opens_breaker_and_defers() {
        let target = Arc::new(StubTarget {
            fail: true,
            ..Default::default()
        });
        let mut config = LoadGeneratorConfig::new(Phase::Trip, PhaseSettings::new(1, 50.0), 4, 10);
        config.breaker = CircuitBreakerConfig {
            failure_threshold: 10,
            cooldown: Duration::from_millis(400),
        };
        let lg = generator(config, target.clone());

        let result = lg.run().await;
        assert!(result.breaker_trips >= 1);
        assert_eq!(result.metrics.errors, result.metrics.count);
        // Deferred dispatches are not sent while the breaker is open
        assert!(result.metrics.count < 50);
        assert!(lg.breaker().metrics().total_deferred > 0);
    }

    #[tokio::test]
    async fn test_half_open_sends_one_request_per_window() {
        let target = Arc::new(StubTarget {
            fail: true,
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let mut config =
            LoadGeneratorConfig::new(Phase::Trip, PhaseSettings::new(2, 100.0), 16, 10);
        config.breaker = CircuitBreakerConfig {
            failure_threshold: 10,
            cooldown: Duration::from_millis(700),
        };
        assert_eq!(config.worker_count(), 16);
        let lg = generator(config, target.clone());

        let result = lg.run().await;
        let calls = target.calls.load(Ordering::SeqCst) as u64;
        assert!(result.breaker_trips >= 2, "opened {}", result.breaker_trips);

        // Every reopen after the first is caused by exactly one trial call
        let before_first_open = calls - (result.breaker_trips - 1);
        assert!(
            (10..=10 + 16).contains(&before_first_open),
            "calls={} opened={}",
            calls,
            result.breaker_trips
        );
    }

    #[tokio::test]
    async fn test_breaker_closes_after_target_recovers() {
        let target = Arc::new(StubTarget {
            fail_first: 10,
            ..Default::default()
        });
        let mut config =
            LoadGeneratorConfig::new(Phase::Trip, PhaseSettings::new(1, 40.0), 4, 10);
        config.breaker = CircuitBreakerConfig {
            failure_threshold: 10,
            cooldown: Duration::from_millis(300),
        };
        let lg = generator(config, target.clone());

        let result = lg.run().await;
        assert_eq!(result.breaker_trips, 1);
        assert_eq!(result.metrics.errors, 10);
        assert!(result.metrics.count > 10);
        assert_eq!(lg.breaker().state(), tripwire_resilience::CircuitState::Closed);
        assert_eq!(lg.breaker().consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_sampling_feeds_qa() {
        let target = Arc::new(StubTarget::default());
        let mut config = LoadGeneratorConfig::new(Phase::Baseline, PhaseSettings::new(1, 10.0), 2, 10);
        config.sample_rate = 1.0;
        let storage = Arc::new(Storage::memory_only(200));
        let lg = LoadGenerator::new(
            config,
            target,
            Arc::new(QueryBank::synthetic(false)),
            None,
            storage.clone(),
        );

        let result = lg.run().await;
        let feed = storage.get_qa_feed(500).await;
        assert_eq!(feed.len() as u64, result.metrics.count);
        assert_eq!(feed[0].source, "retrieval");
        assert!(feed[0].answer.starts_with("answer to"));
    }

    #[tokio::test]
    async fn test_recall_is_recorded_with_ground_truth() {
        let target = Arc::new(StubTarget::default());
        let gt = GroundTruth::parse("q1\tonly query\n", "q1\td1\nq1\td2\n");
        let config = LoadGeneratorConfig::new(Phase::Baseline, PhaseSettings::new(1, 10.0), 2, 10);
        let lg = LoadGenerator::new(
            config,
            target,
            Arc::new(QueryBank::new(gt.query_texts(), false)),
            Some(Arc::new(gt)),
            Arc::new(Storage::memory_only(200)),
        );

        let result = lg.run().await;
        assert_eq!(result.metrics.recall_at_10, Some(0.5));
    }
}
