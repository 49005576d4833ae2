//! Backing store configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backing store connection settings.
///
/// When `enabled` is false the engine runs memory-only from the start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub enabled: bool,

    /// Connection string, e.g. `sqlite://tripwire.db?mode=rwc`
    pub url: String,

    #[serde(with = "crate::domains::utils::serde_duration_ms")]
    pub connect_timeout: Duration,

    #[serde(with = "crate::domains::utils::serde_duration_ms")]
    pub operation_timeout: Duration,

    /// Maximum QA feed length, in both the backing store and the ring buffer
    pub qa_feed_max: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "sqlite://tripwire.db?mode=rwc".to_string(),
            connect_timeout: Duration::from_secs(2),
            operation_timeout: Duration::from_secs(2),
            qa_feed_max: 200,
        }
    }
}

impl StorageConfig {
    /// Memory-only configuration
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

impl Validatable for StorageConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.enabled {
            validate_required_string(&self.url, "url", self.domain_name())?;
        }
        validate_positive(
            self.connect_timeout.as_millis(),
            "connect_timeout",
            self.domain_name(),
        )?;
        validate_positive(
            self.operation_timeout.as_millis(),
            "operation_timeout",
            self.domain_name(),
        )?;
        validate_positive(self.qa_feed_max, "qa_feed_max", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "storage"
    }
}
