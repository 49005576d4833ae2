//! Query source configuration

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryBankConfig {
    /// One query per line; synthetic queries are used when missing or empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// `qid<TAB>text` per line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_truth_queries: Option<PathBuf>,

    /// `qid<TAB>doc_id` or TREC `qid iter doc_id rel` per line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_truth_qrels: Option<PathBuf>,

    /// Replace the query bank with ground-truth queries when they load
    pub prefer_ground_truth: bool,
}

impl Default for QueryBankConfig {
    fn default() -> Self {
        Self {
            path: None,
            ground_truth_queries: None,
            ground_truth_qrels: None,
            prefer_ground_truth: true,
        }
    }
}

impl Validatable for QueryBankConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.ground_truth_queries.is_some() != self.ground_truth_qrels.is_some() {
            return Err(self.validation_error(
                "ground_truth_queries and ground_truth_qrels must be set together",
            ));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "query_bank"
    }
}
