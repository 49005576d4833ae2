//! YAML loading with `TRIPWIRE_*` environment overrides
//!
//! Sources are applied in order: built-in defaults, then the YAML file (if
//! any), then environment variables. Validation runs once at the end.

use crate::domains::TripwireConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub struct ConfigLoader {
    prefix: String,
}

impl ConfigLoader {
    /// Loader reading `TRIPWIRE_*` variables
    pub fn new() -> Self {
        Self::with_prefix("TRIPWIRE")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<TripwireConfig> {
        let content = std::fs::read_to_string(path)?;
        self.from_yaml_str(&content)
    }

    pub fn from_yaml_str(&self, content: &str) -> ConfigResult<TripwireConfig> {
        self.finish(serde_yaml::from_str(content)?)
    }

    /// Defaults plus environment only
    pub fn from_env(&self) -> ConfigResult<TripwireConfig> {
        self.finish(TripwireConfig::default())
    }

    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<TripwireConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn finish(&self, mut config: TripwireConfig) -> ConfigResult<TripwireConfig> {
        self.apply_env(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    fn apply_env(&self, config: &mut TripwireConfig) -> ConfigResult<()> {
        if let Some(url) = self.var("TARGET_URL") {
            config.target.url = url;
        }
        if let Some(secs) = self.parsed::<u64>("TARGET_TIMEOUT")? {
            config.target.timeout = Duration::from_secs(secs);
        }

        if let Some(url) = self.var("STORAGE_URL") {
            config.storage.url = url;
        }
        if let Some(enabled) = self.parsed::<bool>("STORAGE_ENABLED")? {
            config.storage.enabled = enabled;
        }

        if let Some(path) = self.var("QUERY_BANK") {
            config.query_bank.path = Some(PathBuf::from(path));
        }

        if let Some(level) = self.parsed("LOG_LEVEL")? {
            config.logging.level = level;
        }
        if let Some(format) = self.parsed("LOG_FORMAT")? {
            config.logging.format = format;
        }
        Ok(())
    }

    fn var(&self, name: &str) -> Option<String> {
        std::env::var(format!("{}_{}", self.prefix, name)).ok()
    }

    fn parsed<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.var(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| {
                    ConfigError::Env(format!("{}_{}={:?}: {}", self.prefix, name, raw, e))
                })
            })
            .transpose()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
