//! Upstream API client error types.

use std::sync::Arc;

use sitecache_core::Error;

/// Errors from the upstream API client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// No bearer credential configured.
    #[error("missing API token: SITE_CACHE_UPSTREAM_TOKEN not set")]
    MissingToken,

    /// Base URL could not be combined with the identifier.
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    /// Authentication failed (invalid or revoked token).
    #[error("authentication failed: HTTP {status}")]
    AuthError { status: u16 },

    /// Rate limited by the upstream API.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// Any other non-success response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response body was not JSON.
    #[error("parse error: {0}")]
    Parse(String),
}

impl ApiError {
    /// HTTP status the upstream answered with, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthError { status } | ApiError::HttpError { status } => Some(*status),
            ApiError::RateLimited => Some(429),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { ApiError::Timeout } else { ApiError::Network(Arc::new(err.without_url())) }
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        match err.status() {
            Some(status) => Error::upstream_status(status, err.to_string()),
            None => Error::upstream_transport(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ApiError::MissingToken;
        assert!(err.to_string().contains("API token"));

        let err = ApiError::HttpError { status: 502 };
        assert_eq!(err.to_string(), "HTTP error: 502");
    }

    #[test]
    fn test_into_core_error_keeps_status() {
        let err: Error = ApiError::RateLimited.into();
        assert_eq!(err.upstream_code(), Some(429));

        let err: Error = ApiError::AuthError { status: 401 }.into();
        assert_eq!(err.upstream_code(), Some(401));

        let err: Error = ApiError::Timeout.into();
        assert!(matches!(err, Error::UpstreamUnavailable { status: None, .. }));
    }
}
