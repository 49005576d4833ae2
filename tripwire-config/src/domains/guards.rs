//! Guardrail and watchdog thresholds

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardsConfig {
    pub guardrail: GuardrailConfig,
    pub watchdog: WatchdogConfig,
}

/// Soft p95 threshold; violations are counted, never fatal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    #[serde(default = "crate::domains::utils::default_true")]
    pub enabled: bool,
    pub p95_threshold_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    #[serde(default = "crate::domains::utils::default_true")]
    pub enabled: bool,
    /// Seconds without progress before the watchdog trips
    pub no_progress_secs: u64,
    /// Emergency p95 bound
    pub latency_threshold_ms: f64,
}

impl Default for GuardsConfig {
    fn default() -> Self {
        Self {
            guardrail: GuardrailConfig::default(),
            watchdog: WatchdogConfig::default(),
        }
    }
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            p95_threshold_ms: 1000.0,
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            no_progress_secs: 30,
            latency_threshold_ms: 5000.0,
        }
    }
}

impl Validatable for GuardsConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.guardrail.p95_threshold_ms,
            "guardrail.p95_threshold_ms",
            self.domain_name(),
        )?;
        validate_positive(
            self.watchdog.no_progress_secs,
            "watchdog.no_progress_secs",
            self.domain_name(),
        )?;
        validate_positive(
            self.watchdog.latency_threshold_ms,
            "watchdog.latency_threshold_ms",
            self.domain_name(),
        )?;
        if self.watchdog.latency_threshold_ms < self.guardrail.p95_threshold_ms {
            return Err(self.validation_error(
                "watchdog.latency_threshold_ms must not be below guardrail.p95_threshold_ms",
            ));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "guards"
    }
}
