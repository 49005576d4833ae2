//! Domain-specific configuration modules

pub mod breaker;
pub mod guards;
pub mod logging;
pub mod overrides;
pub mod query_bank;
pub mod storage;
pub mod target;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Tripwire configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TripwireConfig {
    /// Service under test
    pub target: target::TargetConfig,

    /// Backing store for status, report and QA feed
    pub storage: storage::StorageConfig,

    /// Query sources
    pub query_bank: query_bank::QueryBankConfig,

    /// Guardrail and watchdog thresholds
    pub guards: guards::GuardsConfig,

    /// Consecutive-error breaker used by every phase's load generator
    pub breaker: breaker::CircuitBreakerConfig,

    /// Logging configuration
    pub logging: logging::LoggingConfig,

    /// Global parameter overrides that win over run-supplied values
    pub overrides: overrides::OverridePolicy,
}

impl TripwireConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.target.validate()?;
        self.storage.validate()?;
        self.query_bank.validate()?;
        self.guards.validate()?;
        self.breaker.validate()?;
        self.logging.validate()?;
        self.overrides.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = TripwireConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
