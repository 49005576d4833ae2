//! Target client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tripwire_config::TargetConfig;

/// Target client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetClientConfig {
    pub url: String,

    /// Request timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Idle connections kept per host; sized to the run's concurrency cap
    pub pool_max_idle_per_host: usize,
}

impl TargetClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

impl Default for TargetClientConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000/query".to_string(),
            timeout: Duration::from_secs(10),
            user_agent: "Tripwire/0.1".to_string(),
            pool_max_idle_per_host: 32,
        }
    }
}

impl From<&TargetConfig> for TargetClientConfig {
    fn from(config: &TargetConfig) -> Self {
        Self {
            url: config.url.clone(),
            timeout: config.timeout,
            user_agent: config.user_agent.clone(),
            ..Default::default()
        }
    }
}
