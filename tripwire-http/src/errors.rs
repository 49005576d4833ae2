//! Target client error types

/// Error type for requests against the target
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected status {status}")]
    Status { status: u16 },

    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl TargetError {
    /// Map a reqwest failure, separating timeouts from other transport errors
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TargetError::Timeout
        } else {
            TargetError::NetworkError(err)
        }
    }
}
