//! Client for the service under test
//!
//! The target is consumed through a minimal contract: a JSON POST carrying
//! the query and retrieval knobs, answered by a JSON list of answers and
//! optional document ids. Anything other than a 200 is an error.

pub mod client;
pub mod config;
pub mod errors;
pub mod types;

// Re-export main types for convenience
pub use client::{HttpTargetClient, TargetClient};
pub use config::TargetClientConfig;
pub use errors::TargetError;
pub use types::{SearchRequest, SearchResponse};
