//! Engine error types

use thiserror::Error;
use tripwire_config::ConfigError;
use tripwire_core::{RunConfigError, RunId};
use tripwire_http::TargetError;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A run is still in an active phase
    #[error("Run {0} is still active")]
    RunActive(RunId),

    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    /// Fatal failure while driving a run; the run is marked as errored
    #[error("Orchestration failed: {0}")]
    Orchestration(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid run configuration: {0}")]
    RunConfig(#[from] RunConfigError),

    #[error("Target client error: {0}")]
    Target(#[from] TargetError),
}
