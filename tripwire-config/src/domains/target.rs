//! Target service configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where and how to reach the service under test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Query endpoint, receives JSON POSTs
    pub url: String,

    /// Per-request timeout
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Base number of answers requested per query
    pub top_k: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout: Duration::from_secs(10),
            user_agent: "Tripwire/0.1".to_string(),
            top_k: 10,
        }
    }
}

impl Validatable for TargetConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.url, "url", self.domain_name())?;
        validate_positive(self.timeout.as_secs(), "timeout", self.domain_name())?;
        validate_required_string(&self.user_agent, "user_agent", self.domain_name())?;
        validate_positive(self.top_k, "top_k", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "target"
    }
}

fn default_url() -> String {
    "http://127.0.0.1:8000/query".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_config_defaults() {
        let config = TargetConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.top_k, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_target_config_validation() {
        let mut config = TargetConfig::default();
        config.timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());

        config = TargetConfig::default();
        config.url = "localhost:8000".to_string();
        assert!(config.validate().is_err());
    }
}
