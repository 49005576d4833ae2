//! Request and response bodies of the target contract

use serde::{Deserialize, Serialize};

/// JSON body POSTed to the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_top_k: Option<u32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, top_k: u32) -> Self {
        Self {
            query: query.into(),
            top_k,
            candidate_k: None,
            rerank_top_k: None,
        }
    }
}

/// JSON body returned by the target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub answers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_mode: Option<bool>,
    /// Retrieval source reported by the target, when it reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SearchResponse {
    pub fn doc_ids(&self) -> &[String] {
        self.doc_ids.as_deref().unwrap_or_default()
    }

    /// Label for where the answer came from
    pub fn hit_source(&self) -> String {
        if let Some(source) = self.source.as_deref().filter(|s| !s.is_empty()) {
            return source.to_string();
        }
        if self.mock_mode.unwrap_or(false) {
            "mock".to_string()
        } else if !self.doc_ids().is_empty() {
            "retrieval".to_string()
        } else {
            "none".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_unset_knobs() {
        let body = serde_json::to_value(SearchRequest::new("what is raft", 10)).unwrap();
        assert_eq!(body, json!({"query": "what is raft", "top_k": 10}));
    }

    #[test]
    fn test_response_tolerates_missing_fields() {
        let response: SearchResponse = serde_json::from_value(json!({"answers": []})).unwrap();
        assert!(response.doc_ids().is_empty());
        assert_eq!(response.hit_source(), "none");

        let response: SearchResponse =
            serde_json::from_value(json!({"answers": ["a"], "doc_ids": ["d1"], "mock_mode": false}))
                .unwrap();
        assert_eq!(response.hit_source(), "retrieval");

        let response: SearchResponse =
            serde_json::from_value(json!({"answers": ["a"], "mock_mode": true})).unwrap();
        assert_eq!(response.hit_source(), "mock");
    }
}
