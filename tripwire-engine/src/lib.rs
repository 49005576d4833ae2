//! Orchestration engine for Tripwire
//!
//! The [`Runner`] drives a run through warmup, baseline, trip and recovery,
//! one [`LoadGenerator`] per phase, while the [`RunStateManager`] holds the
//! authoritative state and [`Guards`] watch latency and progress. The
//! [`Controller`] is the facade that front ends call.

pub mod controller;
pub mod error;
pub mod ground_truth;
pub mod guards;
pub mod loadgen;
pub mod overrides;
pub mod query_bank;
pub mod reporter;
pub mod runner;
pub mod signal;
pub mod state;

pub use controller::Controller;
pub use error::{EngineError, EngineResult};
pub use ground_truth::GroundTruth;
pub use guards::{GuardHooks, Guards, NoopHooks};
pub use loadgen::{LoadGenerator, LoadGeneratorConfig, MetricsRecorder};
pub use overrides::{resolve_overrides, ResolvedParams};
pub use query_bank::QueryBank;
pub use reporter::Reporter;
pub use runner::{Runner, RunnerContext};
pub use signal::StopSignal;
pub use state::{RunStateManager, RunStatePatch};
