//! Errors raised while loading or validating configuration

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `TRIPWIRE_*` variable held a value that does not parse
    #[error("bad environment override: {0}")]
    Env(String),

    #[error("invalid {domain} configuration: {message}")]
    Domain {
        domain: &'static str,
        message: String,
    },
}

impl ConfigError {
    pub fn domain(domain: &'static str, message: impl Into<String>) -> Self {
        ConfigError::Domain {
            domain,
            message: message.into(),
        }
    }
}
