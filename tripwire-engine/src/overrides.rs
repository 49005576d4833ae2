//! Layered parameter resolution
//!
//! Each tunable request parameter is resolved through four layers, later
//! layers winning: built-in default, mode default, the run's own values and
//! the global override policy. The winning layer per parameter is recorded
//! so a report can explain where every value came from.

use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;
use tripwire_config::OverridePolicy;
use tripwire_core::config::{MAX_CANDIDATE_K, MAX_RERANK_TOP_K};
use tripwire_core::{Mode, OverrideSource, PrecedenceEntry, RunConfig};

pub const DEFAULT_HEAVY_CANDIDATE_K: u32 = 400;
pub const DEFAULT_HEAVY_RERANK_TOP_K: u32 = 100;
pub const DEFAULT_NETWORK_DELAY_MS: u64 = 250;
pub const DEFAULT_BURST_SIZE: u32 = 10;

/// Parameter values after resolution.
///
/// `top_k` applies to every phase; the rest shape trip-phase traffic only.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParams {
    pub top_k: u32,
    pub candidate_k: Option<u32>,
    pub rerank_top_k: Option<u32>,
    pub network_delay: Duration,
    pub burst_size: u32,
}

struct Layered {
    name: &'static str,
    value: Option<u64>,
    source: OverrideSource,
}

impl Layered {
    fn new(name: &'static str, default: Option<u64>) -> Self {
        Self {
            name,
            value: default,
            source: OverrideSource::Default,
        }
    }

    fn apply(&mut self, source: OverrideSource, value: Option<u64>) {
        if let Some(value) = value {
            self.value = Some(value);
            self.source = source;
        }
    }

    fn clamp(&mut self, min: u64, max: u64) {
        if let Some(value) = self.value {
            let bounded = value.clamp(min, max);
            if bounded != value {
                warn!(
                    "Clamping {} from {} ({} layer) to {}",
                    self.name, value, self.source, bounded
                );
                self.value = Some(bounded);
            }
        }
    }

    fn entry(&self) -> PrecedenceEntry {
        PrecedenceEntry {
            parameter: self.name.to_string(),
            source: self.source,
            value: self.value.map(JsonValue::from).unwrap_or(JsonValue::Null),
        }
    }
}

/// Resolve request parameters for a run.
///
/// Returns the values plus one precedence entry per parameter, ordered by
/// parameter name.
pub fn resolve_overrides(
    config: &RunConfig,
    default_top_k: u32,
    policy: &OverridePolicy,
) -> (ResolvedParams, Vec<PrecedenceEntry>) {
    let mut burst_size = Layered::new("burst_size", Some(1));
    let mut candidate_k = Layered::new("candidate_k", None);
    let mut network_delay_ms = Layered::new("network_delay_ms", Some(0));
    let mut rerank_top_k = Layered::new("rerank_top_k", None);
    let top_k = Layered::new("top_k", Some(u64::from(default_top_k)));

    match config.mode {
        Mode::Burst => burst_size.apply(OverrideSource::Mode, Some(u64::from(DEFAULT_BURST_SIZE))),
        Mode::Heavy => {
            candidate_k.apply(OverrideSource::Mode, Some(u64::from(DEFAULT_HEAVY_CANDIDATE_K)));
            rerank_top_k.apply(OverrideSource::Mode, Some(u64::from(DEFAULT_HEAVY_RERANK_TOP_K)));
        }
        Mode::NetworkDelay => {
            network_delay_ms.apply(OverrideSource::Mode, Some(DEFAULT_NETWORK_DELAY_MS))
        }
    }

    candidate_k.apply(OverrideSource::Run, config.heavy.candidate_k.map(u64::from));
    rerank_top_k.apply(OverrideSource::Run, config.heavy.rerank_top_k.map(u64::from));

    let mut layers = [
        burst_size,
        candidate_k,
        network_delay_ms,
        rerank_top_k,
        top_k,
    ];

    for layer in layers.iter_mut() {
        layer.apply(
            OverrideSource::Run,
            numeric(config.params.get(layer.name), layer.name, "run params"),
        );
    }
    for layer in layers.iter_mut() {
        layer.apply(
            OverrideSource::Policy,
            numeric(policy.get(layer.name), layer.name, "override policy"),
        );
    }

    // Layers are validated on their own; the combination may still disagree
    {
        let [_, candidate_k, _, rerank_top_k, _] = &mut layers;
        candidate_k.clamp(1, u64::from(MAX_CANDIDATE_K));
        rerank_top_k.clamp(1, u64::from(MAX_RERANK_TOP_K));
        if let Some(candidates) = candidate_k.value {
            rerank_top_k.clamp(1, candidates);
        }
    }

    let chain = layers.iter().map(Layered::entry).collect();
    let [burst_size, candidate_k, network_delay_ms, rerank_top_k, top_k] = layers;

    let params = ResolvedParams {
        top_k: to_u32(top_k.value).unwrap_or(default_top_k).max(1),
        candidate_k: to_u32(candidate_k.value),
        rerank_top_k: to_u32(rerank_top_k.value),
        network_delay: Duration::from_millis(network_delay_ms.value.unwrap_or(0)),
        burst_size: to_u32(burst_size.value).unwrap_or(1).max(1),
    };
    (params, chain)
}

fn numeric(value: Option<&JsonValue>, name: &str, layer: &str) -> Option<u64> {
    let value = value?;
    match value.as_u64() {
        Some(n) => Some(n),
        None => {
            warn!("Ignoring non-numeric {} value in {}: {}", name, layer, value);
            None
        }
    }
}

fn to_u32(value: Option<u64>) -> Option<u32> {
    value.map(|v| u32::try_from(v).unwrap_or(u32::MAX))
}
