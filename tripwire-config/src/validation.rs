//! Field checks shared by the configuration domains

use crate::error::{ConfigError, ConfigResult};
use std::fmt::Display;

/// Implemented by every configuration domain
pub trait Validatable {
    fn validate(&self) -> ConfigResult<()>;

    /// Section name used in error messages
    fn domain_name(&self) -> &'static str;

    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::domain(self.domain_name(), message)
    }
}

pub fn validate_required_string(value: &str, field: &str, domain: &'static str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::domain(domain, format!("{} must not be blank", field)));
    }
    Ok(())
}

/// Rejects zero and negatives
pub fn validate_positive<T>(value: T, field: &str, domain: &'static str) -> ConfigResult<()>
where
    T: PartialOrd + Default + Display,
{
    if value > T::default() {
        Ok(())
    } else {
        Err(ConfigError::domain(
            domain,
            format!("{} must be positive (got {})", field, value),
        ))
    }
}

/// The target endpoint must be plain http or https
pub fn validate_url(value: &str, field: &str, domain: &'static str) -> ConfigResult<()> {
    validate_required_string(value, field, domain)?;
    let url = url::Url::parse(value)
        .map_err(|e| ConfigError::domain(domain, format!("{} '{}': {}", field, value, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::domain(
            domain,
            format!("{} must use http or https, not {}", field, url.scheme()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_strings_rejected() {
        assert!(validate_required_string("sqlite::memory:", "url", "storage").is_ok());
        assert!(validate_required_string("", "url", "storage").is_err());
        assert!(validate_required_string(" \t", "url", "storage").is_err());
    }

    #[test]
    fn test_positive() {
        assert!(validate_positive(1u32, "top_k", "target").is_ok());
        assert!(validate_positive(0.5f64, "p95", "guards").is_ok());
        let err = validate_positive(0u64, "timeout", "target").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid target configuration: timeout must be positive (got 0)"
        );
    }

    #[test]
    fn test_target_url_schemes() {
        assert!(validate_url("http://127.0.0.1:8000/query", "url", "target").is_ok());
        assert!(validate_url("https://search.internal/query", "url", "target").is_ok());
        assert!(validate_url("redis://127.0.0.1:6379", "url", "target").is_err());
        assert!(validate_url("query", "url", "target").is_err());
    }
}
