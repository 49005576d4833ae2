//! Resilience patterns for Tripwire
//!
//! Currently a consecutive-error circuit breaker with a fixed cooldown,
//! used by the load generator to stop hammering a target that keeps failing.

pub mod circuit_breaker;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitMetrics, CircuitState, TRIAL_POLL,
};
