//! Error types for feed operations.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching market data.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if err.is_decode() {
            FeedError::ParseError(err.to_string())
        } else if err.is_builder() {
            FeedError::Client(err.to_string())
        } else {
            FeedError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

impl FeedError {
    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16, url: impl Into<String>) -> Self {
        match status {
            429 => FeedError::RateLimitExceeded,
            401 | 403 => FeedError::AuthenticationFailed(format!("HTTP {}", status)),
            _ => FeedError::HttpStatus {
                status,
                url: url.into(),
            },
        }
    }

    /// Returns true if this error is transient and likely to succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::ConnectionFailed(_) | FeedError::Timeout(_) | FeedError::RateLimitExceeded => {
                true
            }
            FeedError::HttpStatus { status, .. } => *status >= 500,
            FeedError::ParseError(_) | FeedError::AuthenticationFailed(_) | FeedError::Client(_) => {
                false
            }
        }
    }

    /// Returns a suggested retry delay for this error type, if applicable.
    /// Returns None for errors that should not be retried.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            FeedError::RateLimitExceeded => Some(Duration::from_secs(60)),
            FeedError::ConnectionFailed(_) => Some(Duration::from_secs(5)),
            FeedError::Timeout(_) => Some(Duration::from_secs(2)),
            FeedError::HttpStatus { status, .. } if *status >= 500 => Some(Duration::from_secs(5)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            FeedError::from_status(429, "u"),
            FeedError::RateLimitExceeded
        ));
        assert!(matches!(
            FeedError::from_status(403, "u"),
            FeedError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            FeedError::from_status(502, "u"),
            FeedError::HttpStatus { status: 502, .. }
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(FeedError::Timeout("slow".into()).is_transient());
        assert!(FeedError::from_status(503, "u").is_transient());
        assert!(!FeedError::from_status(404, "u").is_transient());
        assert!(!FeedError::ParseError("bad json".into()).is_transient());
        assert!(!FeedError::AuthenticationFailed("key".into()).is_transient());
    }

    #[test]
    fn test_suggested_retry_delay() {
        assert_eq!(
            FeedError::RateLimitExceeded.suggested_retry_delay(),
            Some(Duration::from_secs(60))
        );
        assert_eq!(FeedError::from_status(404, "u").suggested_retry_delay(), None);
        assert_eq!(FeedError::ParseError("x".into()).suggested_retry_delay(), None);
    }

    #[test]
    fn test_error_display() {
        let err = FeedError::from_status(500, "https://api.example.com/1/liquidity/tokens");
        assert_eq!(
            err.to_string(),
            "HTTP 500 for https://api.example.com/1/liquidity/tokens"
        );
    }
}
