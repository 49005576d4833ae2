//! HTTP client implementation

use crate::config::TargetClientConfig;
use crate::errors::TargetError;
use crate::types::{SearchRequest, SearchResponse};
use reqwest::{Client, StatusCode};
use tracing::{debug, trace};

/// Query parameter carrying the cache-busting token
pub const CACHE_BUST_PARAM: &str = "nocache";

/// Client trait for issuing queries against the target
#[async_trait::async_trait]
pub trait TargetClient: Send + Sync {
    /// Send one query. `cache_bust`, when present, is attached as a query
    /// parameter so the target cannot serve the answer from cache.
    async fn search(
        &self,
        request: &SearchRequest,
        cache_bust: Option<&str>,
    ) -> Result<SearchResponse, TargetError>;
}

/// reqwest-backed target client.
///
/// One underlying connection pool is shared by every worker of a run.
#[derive(Debug, Clone)]
pub struct HttpTargetClient {
    client: Client,
    config: TargetClientConfig,
}

impl HttpTargetClient {
    /// Create a client with the given configuration
    pub fn new(config: TargetClientConfig) -> Result<Self, TargetError> {
        debug!(
            "Creating target client for {} with timeout: {:?}",
            config.url, config.timeout
        );
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|e| TargetError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TargetClientConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl TargetClient for HttpTargetClient {
    async fn search(
        &self,
        request: &SearchRequest,
        cache_bust: Option<&str>,
    ) -> Result<SearchResponse, TargetError> {
        trace!("POST {} query={:?}", self.config.url, request.query);

        let mut builder = self.client.post(&self.config.url).json(request);
        if let Some(token) = cache_bust {
            builder = builder.query(&[(CACHE_BUST_PARAM, token)]);
        }

        let response = builder.send().await.map_err(TargetError::from_transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!("Target responded with {}", status);
            return Err(TargetError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(TargetError::from_transport)?;
        serde_json::from_slice::<SearchResponse>(&body)
            .map_err(|e| TargetError::InvalidBody(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::time::Duration;

    async fn spawn_target(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/query", addr)
    }

    #[tokio::test]
    async fn test_search_round_trip_with_cache_bust() {
        let app = Router::new().route(
            "/query",
            post(
                |Query(params): Query<HashMap<String, String>>, Json(body): Json<Value>| async move {
                    Json(json!({
                        "answers": [format!("echo: {}", body["query"].as_str().unwrap_or(""))],
                        "doc_ids": [params.get("nocache").cloned().unwrap_or_default()],
                    }))
                },
            ),
        );
        let url = spawn_target(app).await;
        let client = HttpTargetClient::new(TargetClientConfig::new(url)).unwrap();

        let response = client
            .search(&SearchRequest::new("hello", 5), Some("token-1"))
            .await
            .unwrap();
        assert_eq!(response.answers, vec!["echo: hello".to_string()]);
        assert_eq!(response.doc_ids(), &["token-1".to_string()]);
    }

    #[tokio::test]
    async fn test_non_200_is_an_error() {
        let app = Router::new().route(
            "/query",
            post(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let url = spawn_target(app).await;
        let client = HttpTargetClient::new(TargetClientConfig::new(url)).unwrap();

        let err = client
            .search(&SearchRequest::new("hello", 5), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TargetError::Status { status: 500 }));
    }

    #[tokio::test]
    async fn test_unreachable_target_is_an_error() {
        let mut config = TargetClientConfig::new("http://127.0.0.1:9/query");
        config.timeout = Duration::from_millis(500);
        let client = HttpTargetClient::new(config).unwrap();

        assert!(client
            .search(&SearchRequest::new("hello", 5), None)
            .await
            .is_err());
    }
}
