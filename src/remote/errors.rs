//! Remote Error Types
//!
//! Per-request failures against the remote site. Mapped from HTTP status
//! codes so callers can log something meaningful before skipping the item.

/// Remote request error types
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Unauthorized: session cookie missing or rejected")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({0}): {1}")]
    Server(u16, String),

    #[error("Request timeout")]
    Timeout,

    #[error("Request error: {0}")]
    Request(String),
}

impl RemoteError {
    /// Create a RemoteError from an HTTP status code and the requested URL
    pub fn from_status(status: u16, url: &str) -> Self {
        match status {
            401 => RemoteError::Unauthorized,
            403 => RemoteError::Forbidden(url.to_string()),
            404 | 410 => RemoteError::NotFound(url.to_string()),
            408 => RemoteError::Timeout,
            429 => RemoteError::RateLimited,
            500..=599 => RemoteError::Server(status, url.to_string()),
            _ => RemoteError::Request(format!("HTTP {}: {}", status, url)),
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout
        } else if let Some(status) = e.status() {
            let url = e.url().map(|u| u.to_string()).unwrap_or_default();
            RemoteError::from_status(status.as_u16(), &url)
        } else if e.is_connect() || e.is_request() || e.is_body() {
            RemoteError::Network(e.to_string())
        } else {
            RemoteError::Request(e.to_string())
        }
    }
}
