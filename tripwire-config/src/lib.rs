//! Domain-driven configuration for Tripwire
//!
//! Configuration is split by functional domain (target service, storage,
//! query bank, guards, circuit breaker, logging, override policy), each
//! validated on load, with YAML files and `TRIPWIRE_*` environment variables
//! as sources.

pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    breaker::CircuitBreakerConfig, guards::GuardsConfig, logging::LoggingConfig,
    overrides::OverridePolicy, query_bank::QueryBankConfig, storage::StorageConfig, target::TargetConfig, TripwireConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration;
