//! Core data model for Tripwire
//!
//! This crate contains the value types shared by every other Tripwire
//! crate: run phases, run configuration, metric snapshots, guard state,
//! the run state aggregate and the final report. It has minimal
//! dependencies and defines the domain language of the engine.

pub mod config;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod phase;
pub mod qa;
pub mod report;
pub mod run;

// Re-export commonly used types at the crate root
pub use config::{HeavyOverrides, Mode, PhaseSettings, RunConfig, RunConfigBuilder};
pub use error::{RunConfigError, RunConfigResult};
pub use guard::{GuardrailState, WatchdogState};
pub use metrics::Metrics;
pub use phase::Phase;
pub use qa::QaFeedItem;
pub use report::{GuardrailSummary, PhaseReport, PhaseResult, Report, ReportTotals, WatchdogSummary};
pub use run::{OverrideSource, PrecedenceEntry, RunId, RunState};
