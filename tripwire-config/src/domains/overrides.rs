//! Global override policy
//!
//! Values listed here win over anything a run supplies. The engine records
//! the winning layer for every parameter in the run's precedence chain.

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tripwire_core::config::{
    check_heavy, check_rerank_within_candidates, MAX_CANDIDATE_K, MAX_RERANK_TOP_K,
};

/// Parameters that the override policy may pin
pub const OVERRIDABLE_PARAMETERS: [&str; 5] = [
    "burst_size",
    "candidate_k",
    "network_delay_ms",
    "rerank_top_k",
    "top_k",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverridePolicy {
    values: BTreeMap<String, JsonValue>,
}

impl OverridePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin a parameter value
    pub fn with(mut self, parameter: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.values.insert(parameter.into(), value.into());
        self
    }

    pub fn get(&self, parameter: &str) -> Option<&JsonValue> {
        self.values.get(parameter)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Validatable for OverridePolicy {
    fn validate(&self) -> ConfigResult<()> {
        for (key, value) in &self.values {
            if !OVERRIDABLE_PARAMETERS.contains(&key.as_str()) {
                return Err(self.validation_error(format!(
                    "unknown override parameter '{}' (expected one of {})",
                    key,
                    OVERRIDABLE_PARAMETERS.join(", ")
                )));
            }
            // network_delay_ms may be pinned to zero; the rest must be positive
            let valid = match value.as_u64() {
                Some(0) => key == "network_delay_ms",
                Some(_) => true,
                None => false,
            };
            if !valid {
                return Err(self.validation_error(format!(
                    "override '{}' must be a non-negative integer, got {}",
                    key, value
                )));
            }
        }

        let knob = |field: &'static str, max: u32| {
            self.get(field)
                .and_then(JsonValue::as_u64)
                .map(|value| check_heavy(field, value, max))
                .transpose()
                .map_err(|e| self.validation_error(e.to_string()))
        };
        let candidate_k = knob("candidate_k", MAX_CANDIDATE_K)?;
        let rerank_top_k = knob("rerank_top_k", MAX_RERANK_TOP_K)?;
        check_rerank_within_candidates(candidate_k, rerank_top_k)
            .map_err(|e| self.validation_error(e.to_string()))
    }

    fn domain_name(&self) -> &'static str {
        "overrides"
    }
}
