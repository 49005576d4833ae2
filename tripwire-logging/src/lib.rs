//! Logging infrastructure for Tripwire
//!
//! Library crates log through `tracing` (or `log`, which the subscriber
//! bridges); binaries and tests call one of the init functions here once.

pub mod init;

pub use init::{init_logging_from_config, init_simple_tracing};
