use crate::overrides::ResolvedParams;
use std::time::Duration;
use tripwire_core::{Mode, Phase, PhaseSettings, RunConfig};
use tripwire_http::SearchRequest;
use tripwire_resilience::CircuitBreakerConfig;

/// Fraction of successful requests copied into the QA feed
pub const DEFAULT_SAMPLE_RATE: f64 = 0.05;

/// Everything one phase's load generator needs to know
#[derive(Debug, Clone)]
pub struct LoadGeneratorConfig {
    pub phase: Phase,
    pub duration: Duration,
    pub target_qps: f64,
    /// Ceiling on in-flight requests
    pub concurrency: u32,
    pub top_k: u32,
    pub candidate_k: Option<u32>,
    pub rerank_top_k: Option<u32>,
    /// Client-side delay before each request, counted in its latency
    pub network_delay: Duration,
    /// Requests released per dispatch; 1 means evenly paced
    pub burst_size: u32,
    pub cache_bypass: bool,
    pub sample_rate: f64,
    pub breaker: CircuitBreakerConfig,
}

impl LoadGeneratorConfig {
    /// Evenly paced base-payload traffic
    pub fn new(phase: Phase, settings: PhaseSettings, concurrency: u32, top_k: u32) -> Self {
        Self {
            phase,
            duration: settings.duration(),
            target_qps: settings.target_qps,
            concurrency,
            top_k,
            candidate_k: None,
            rerank_top_k: None,
            network_delay: Duration::ZERO,
            burst_size: 1,
            cache_bypass: false,
            sample_rate: DEFAULT_SAMPLE_RATE,
            breaker: CircuitBreakerConfig::default(),
        }
    }

    /// Configuration for `phase` of a run. Mode-specific shaping only
    /// applies to the trip phase. Returns `None` for terminal phases.
    pub fn for_phase(config: &RunConfig, params: &ResolvedParams, phase: Phase) -> Option<Self> {
        let settings = *config.phase(phase)?;
        let mut lg = Self::new(phase, settings, config.concurrency, params.top_k);
        lg.cache_bypass = config.cache_bypass;

        if phase == Phase::Trip {
            match config.mode {
                Mode::Burst => lg.burst_size = params.burst_size,
                Mode::Heavy => {
                    lg.candidate_k = params.candidate_k;
                    lg.rerank_top_k = params.rerank_top_k;
                }
                Mode::NetworkDelay => lg.network_delay = params.network_delay,
            }
        }
        Some(lg)
    }

    pub fn request_for(&self, query: &str) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            top_k: self.top_k,
            candidate_k: self.candidate_k,
            rerank_top_k: self.rerank_top_k,
        }
    }

    /// Workers scale with the rate, one per requested QPS, up to the
    /// concurrency ceiling
    pub fn worker_count(&self) -> usize {
        let wanted = self.target_qps.ceil().max(1.0) as usize;
        wanted.min(self.concurrency.max(1) as usize)
    }

    /// Interval between dispatches and requests released per dispatch
    pub fn dispatch_plan(&self) -> (Duration, u32) {
        let burst = self.burst_size.max(1);
        let qps = if self.target_qps > 0.0 { self.target_qps } else { 1.0 };
        (Duration::from_secs_f64(f64::from(burst) / qps), burst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripwire_config::OverridePolicy;

    #[test]
    fn test_mode_shaping_applies_to_trip_only() {
        let config = RunConfig::builder(Mode::Heavy).build().unwrap();
        let (params, _) = crate::overrides::resolve_overrides(&config, 10, &OverridePolicy::new());

        let baseline = LoadGeneratorConfig::for_phase(&config, &params, Phase::Baseline).unwrap();
        assert_eq!(baseline.request_for("q").candidate_k, None);

        let trip = LoadGeneratorConfig::for_phase(&config, &params, Phase::Trip).unwrap();
        let request = trip.request_for("q");
        assert_eq!(request.candidate_k, Some(400));
        assert_eq!(request.rerank_top_k, Some(100));

        assert!(LoadGeneratorConfig::for_phase(&config, &params, Phase::Complete).is_none());
    }

    #[test]
    fn test_worker_count_and_dispatch() {
        let mut lg = LoadGeneratorConfig::new(Phase::Trip, PhaseSettings::new(10, 50.0), 8, 10);
        assert_eq!(lg.worker_count(), 8);
        assert_eq!(lg.dispatch_plan(), (Duration::from_millis(20), 1));

        lg.target_qps = 0.5;
        assert_eq!(lg.worker_count(), 1);

        lg.target_qps = 20.0;
        lg.burst_size = 10;
        assert_eq!(lg.dispatch_plan(), (Duration::from_millis(500), 10));
    }
}
