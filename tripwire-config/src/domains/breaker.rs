//! Circuit breaker section
//!
//! ```yaml
//! breaker:
//!   failure_threshold: 10
//!   cooldown: 10s
//! ```

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
pub use tripwire_resilience::CircuitBreakerConfig;

impl Validatable for CircuitBreakerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.failure_threshold, "failure_threshold", self.domain_name())?;
        if self.cooldown.is_zero() {
            return Err(self.validation_error("cooldown must be longer than zero"));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "breaker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_breaker_section_parses_humantime() {
        let config: CircuitBreakerConfig =
            serde_yaml::from_str("failure_threshold: 4\ncooldown: 1500ms\n").unwrap();
        assert_eq!(config.failure_threshold, 4);
        assert_eq!(config.cooldown, Duration::from_millis(1500));
        assert!(config.validate().is_ok());

        let partial: CircuitBreakerConfig = serde_yaml::from_str("cooldown: 2s\n").unwrap();
        assert_eq!(partial.failure_threshold, 10);

        let zero: CircuitBreakerConfig = serde_yaml::from_str("failure_threshold: 0\n").unwrap();
        assert!(zero.validate().is_err());
    }
}
