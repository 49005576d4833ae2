//! Run configuration
//!
//! A [`RunConfig`] can only be obtained through [`RunConfigBuilder::build`]
//! or deserialization, and both paths run the same range validation, so an
//! out-of-range run is rejected before anything starts.

use crate::error::{RunConfigError, RunConfigResult};
use crate::phase::Phase;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub const MIN_PHASE_DURATION_SECS: u64 = 1;
pub const MAX_PHASE_DURATION_SECS: u64 = 3600;
pub const MAX_TARGET_QPS: f64 = 1000.0;
pub const MIN_CONCURRENCY: u32 = 1;
pub const MAX_CONCURRENCY: u32 = 512;
pub const MAX_CANDIDATE_K: u32 = 5000;
pub const MAX_RERANK_TOP_K: u32 = 1000;

/// Stress pattern applied during the trip phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Requests arrive in bursts at the same average rate
    Burst,
    /// Requests carry expensive retrieval parameters
    Heavy,
    /// Requests are delayed client-side to emulate a slow network
    NetworkDelay,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Burst => "burst",
            Mode::Heavy => "heavy",
            Mode::NetworkDelay => "network_delay",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Duration and target rate of a single phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseSettings {
    pub duration_secs: u64,
    pub target_qps: f64,
}

impl PhaseSettings {
    pub fn new(duration_secs: u64, target_qps: f64) -> Self {
        Self {
            duration_secs,
            target_qps,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Requests a perfectly paced phase would issue
    pub fn expected_requests(&self) -> f64 {
        self.duration_secs as f64 * self.target_qps
    }
}

/// Optional knobs that raise the cost of each request in heavy mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeavyOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_top_k: Option<u32>,
}

/// Validated configuration of a single run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRunConfig")]
pub struct RunConfig {
    pub mode: Mode,
    pub warmup: PhaseSettings,
    pub baseline: PhaseSettings,
    pub trip: PhaseSettings,
    pub recovery: PhaseSettings,
    /// Upper bound on in-flight requests
    pub concurrency: u32,
    /// Pick queries at random instead of round-robin
    pub query_diversity: bool,
    /// Attach a unique cache-busting parameter to every request
    pub cache_bypass: bool,
    pub heavy: HeavyOverrides,
    /// Free-form parameters, consulted by override resolution
    pub params: BTreeMap<String, JsonValue>,
}

impl RunConfig {
    /// Start building a configuration for the given mode
    pub fn builder(mode: Mode) -> RunConfigBuilder {
        RunConfigBuilder::new(mode)
    }

    /// Settings for an active phase; `None` for terminal phases
    pub fn phase(&self, phase: Phase) -> Option<&PhaseSettings> {
        match phase {
            Phase::Warmup => Some(&self.warmup),
            Phase::Baseline => Some(&self.baseline),
            Phase::Trip => Some(&self.trip),
            Phase::Recovery => Some(&self.recovery),
            Phase::Complete | Phase::Error | Phase::Canceled => None,
        }
    }

    pub fn total_duration_secs(&self) -> u64 {
        Phase::ACTIVE
            .iter()
            .filter_map(|p| self.phase(*p))
            .map(|s| s.duration_secs)
            .sum()
    }

    /// Seconds of scheduled phase time before `phase` begins
    pub fn offset_secs(&self, phase: Phase) -> u64 {
        Phase::ACTIVE
            .iter()
            .take_while(|p| **p != phase)
            .filter_map(|p| self.phase(*p))
            .map(|s| s.duration_secs)
            .sum()
    }
}

/// Unvalidated wire form of [`RunConfig`]
#[derive(Debug, Clone, Deserialize)]
struct RawRunConfig {
    mode: Mode,
    #[serde(default = "default_warmup")]
    warmup: PhaseSettings,
    #[serde(default = "default_baseline")]
    baseline: PhaseSettings,
    #[serde(default = "default_trip")]
    trip: PhaseSettings,
    #[serde(default = "default_recovery")]
    recovery: PhaseSettings,
    #[serde(default = "default_concurrency")]
    concurrency: u32,
    #[serde(default)]
    query_diversity: bool,
    #[serde(default)]
    cache_bypass: bool,
    #[serde(default)]
    heavy: HeavyOverrides,
    #[serde(default)]
    params: BTreeMap<String, JsonValue>,
}

impl TryFrom<RawRunConfig> for RunConfig {
    type Error = RunConfigError;

    fn try_from(raw: RawRunConfig) -> RunConfigResult<Self> {
        let config = RunConfig {
            mode: raw.mode,
            warmup: raw.warmup,
            baseline: raw.baseline,
            trip: raw.trip,
            recovery: raw.recovery,
            concurrency: raw.concurrency,
            query_diversity: raw.query_diversity,
            cache_bypass: raw.cache_bypass,
            heavy: raw.heavy,
            params: raw.params,
        };
        validate(&config)?;
        Ok(config)
    }
}

fn validate(config: &RunConfig) -> RunConfigResult<()> {
    for phase in Phase::ACTIVE {
        let Some(settings) = config.phase(phase) else {
            continue;
        };
        if !(MIN_PHASE_DURATION_SECS..=MAX_PHASE_DURATION_SECS).contains(&settings.duration_secs) {
            return Err(RunConfigError::InvalidDuration {
                phase,
                value: settings.duration_secs,
                min: MIN_PHASE_DURATION_SECS,
                max: MAX_PHASE_DURATION_SECS,
            });
        }
        // NaN fails both comparisons and is rejected here too
        if !(settings.target_qps > 0.0 && settings.target_qps <= MAX_TARGET_QPS) {
            return Err(RunConfigError::InvalidQps {
                phase,
                value: settings.target_qps,
                max: MAX_TARGET_QPS,
            });
        }
    }

    if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&config.concurrency) {
        return Err(RunConfigError::InvalidConcurrency {
            value: config.concurrency,
            min: MIN_CONCURRENCY,
            max: MAX_CONCURRENCY,
        });
    }

    let candidate_k =
        heavy_knob(config, "candidate_k", config.heavy.candidate_k, MAX_CANDIDATE_K)?;
    let rerank_top_k =
        heavy_knob(config, "rerank_top_k", config.heavy.rerank_top_k, MAX_RERANK_TOP_K)?;
    check_rerank_within_candidates(candidate_k, rerank_top_k)
}

/// Range-check a heavy knob given as a typed override and/or a numeric param.
///
/// Returns the value the run layer resolves to: a numeric param wins over the
/// typed override. Non-numeric params are left for resolution to ignore.
fn heavy_knob(
    config: &RunConfig,
    field: &'static str,
    typed: Option<u32>,
    max: u32,
) -> RunConfigResult<Option<u32>> {
    if let Some(value) = typed {
        check_heavy(field, u64::from(value), max)?;
    }
    match config.params.get(field).and_then(JsonValue::as_u64) {
        Some(value) => check_heavy(field, value, max).map(Some),
        None => Ok(typed),
    }
}

/// Checks `1..=max` and narrows to `u32`
pub fn check_heavy(field: &'static str, value: u64, max: u32) -> RunConfigResult<u32> {
    match u32::try_from(value) {
        Ok(narrow) if (1..=max).contains(&narrow) => Ok(narrow),
        _ => Err(RunConfigError::InvalidHeavyOverride {
            field,
            value,
            min: 1,
            max,
        }),
    }
}

pub fn check_rerank_within_candidates(
    candidate_k: Option<u32>,
    rerank_top_k: Option<u32>,
) -> RunConfigResult<()> {
    if let (Some(candidate_k), Some(rerank_top_k)) = (candidate_k, rerank_top_k) {
        if rerank_top_k > candidate_k {
            return Err(RunConfigError::RerankExceedsCandidates {
                candidate_k,
                rerank_top_k,
            });
        }
    }
    Ok(())
}

fn default_warmup() -> PhaseSettings {
    PhaseSettings::new(30, 5.0)
}

fn default_baseline() -> PhaseSettings {
    PhaseSettings::new(60, 10.0)
}

fn default_trip() -> PhaseSettings {
    PhaseSettings::new(60, 50.0)
}

fn default_recovery() -> PhaseSettings {
    PhaseSettings::new(60, 10.0)
}

fn default_concurrency() -> u32 {
    32
}

/// Builder for [`RunConfig`]
#[derive(Debug, Clone)]
pub struct RunConfigBuilder {
    raw: RawRunConfig,
}

impl RunConfigBuilder {
    pub fn new(mode: Mode) -> Self {
        Self {
            raw: RawRunConfig {
                mode,
                warmup: default_warmup(),
                baseline: default_baseline(),
                trip: default_trip(),
                recovery: default_recovery(),
                concurrency: default_concurrency(),
                query_diversity: false,
                cache_bypass: false,
                heavy: HeavyOverrides::default(),
                params: BTreeMap::new(),
            },
        }
    }

    pub fn warmup(mut self, duration_secs: u64, target_qps: f64) -> Self {
        self.raw.warmup = PhaseSettings::new(duration_secs, target_qps);
        self
    }

    pub fn baseline(mut self, duration_secs: u64, target_qps: f64) -> Self {
        self.raw.baseline = PhaseSettings::new(duration_secs, target_qps);
        self
    }

    pub fn trip(mut self, duration_secs: u64, target_qps: f64) -> Self {
        self.raw.trip = PhaseSettings::new(duration_secs, target_qps);
        self
    }

    pub fn recovery(mut self, duration_secs: u64, target_qps: f64) -> Self {
        self.raw.recovery = PhaseSettings::new(duration_secs, target_qps);
        self
    }

    pub fn concurrency(mut self, concurrency: u32) -> Self {
        self.raw.concurrency = concurrency;
        self
    }

    pub fn query_diversity(mut self, enabled: bool) -> Self {
        self.raw.query_diversity = enabled;
        self
    }

    pub fn cache_bypass(mut self, enabled: bool) -> Self {
        self.raw.cache_bypass = enabled;
        self
    }

    pub fn candidate_k(mut self, candidate_k: u32) -> Self {
        self.raw.heavy.candidate_k = Some(candidate_k);
        self
    }

    pub fn rerank_top_k(mut self, rerank_top_k: u32) -> Self {
        self.raw.heavy.rerank_top_k = Some(rerank_top_k);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.raw.params.insert(key.into(), value);
        self
    }

    /// Validate and produce the configuration
    pub fn build(self) -> RunConfigResult<RunConfig> {
        RunConfig::try_from(self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_defaults_are_valid() {
        let config = RunConfig::builder(Mode::Burst).build().unwrap();
        assert_eq!(config.concurrency, 32);
        assert_eq!(config.total_duration_secs(), 210);
        assert_eq!(config.offset_secs(Phase::Trip), 90);
        assert!(config.phase(Phase::Complete).is_none());
    }

    #[test]
    fn test_out_of_range_values_fail_fast() {
        let err = RunConfig::builder(Mode::Heavy)
            .trip(0, 10.0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RunConfigError::InvalidDuration {
                phase: Phase::Trip,
                ..
            }
        ));

        let err = RunConfig::builder(Mode::Heavy)
            .baseline(10, 0.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, RunConfigError::InvalidQps { .. }));

        let err = RunConfig::builder(Mode::Heavy)
            .warmup(10, f64::NAN)
            .build()
            .unwrap_err();
        assert!(matches!(err, RunConfigError::InvalidQps { .. }));

        let err = RunConfig::builder(Mode::Heavy)
            .concurrency(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, RunConfigError::InvalidConcurrency { .. }));

        let err = RunConfig::builder(Mode::Heavy)
            .candidate_k(50)
            .rerank_top_k(80)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RunConfigError::RerankExceedsCandidates {
                candidate_k: 50,
                rerank_top_k: 80
            }
        );
    }

    #[test]
    fn test_heavy_params_are_range_checked() {
        let err = RunConfig::builder(Mode::Heavy)
            .param("candidate_k", json!(100000))
            .param("rerank_top_k", json!(90000))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RunConfigError::InvalidHeavyOverride {
                field: "candidate_k",
                value: 100000,
                min: 1,
                max: MAX_CANDIDATE_K
            }
        );

        let err = RunConfig::builder(Mode::Heavy)
            .param("rerank_top_k", json!(0))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RunConfigError::InvalidHeavyOverride {
                field: "rerank_top_k",
                ..
            }
        ));

        // A param beats the typed override, and the pair is checked as resolved
        let err = RunConfig::builder(Mode::Heavy)
            .candidate_k(800)
            .param("candidate_k", json!(60))
            .rerank_top_k(100)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RunConfigError::RerankExceedsCandidates {
                candidate_k: 60,
                rerank_top_k: 100
            }
        );

        let ok = RunConfig::builder(Mode::Heavy)
            .param("candidate_k", json!(1200))
            .param("rerank_top_k", json!(300))
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_deserialization_validates() {
        let ok: RunConfig = serde_json::from_value(json!({
            "mode": "network_delay",
            "warmup": {"duration_secs": 2, "target_qps": 5.0},
            "concurrency": 4,
            "params": {"network_delay_ms": 50}
        }))
        .unwrap();
        assert_eq!(ok.mode, Mode::NetworkDelay);
        assert_eq!(ok.warmup.duration_secs, 2);
        assert_eq!(ok.params.get("network_delay_ms"), Some(&json!(50)));

        let bad = serde_json::from_value::<RunConfig>(json!({
            "mode": "burst",
            "concurrency": 10000
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_serialized_config_reloads() {
        let config = RunConfig::builder(Mode::Heavy)
            .candidate_k(300)
            .param("top_k", json!(20))
            .build()
            .unwrap();
        let text = serde_json::to_string(&config).unwrap();
        let reloaded: RunConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(reloaded, config);
    }
}
