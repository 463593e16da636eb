//! Unified error types for site-cache.
//!
//! Only `UpstreamUnavailable` on a genuine miss ever reaches a caller; the
//! other cache variants are logged and absorbed where they occur.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Unified error types for the site cache.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty path).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Resource identifier could not be normalized.
    #[error("INVALID_IDENTIFIER: {0}")]
    InvalidIdentifier(String),

    /// No cache entry found for the given identifier.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Upstream transport failure, timeout, or non-success status.
    ///
    /// `status` is the upstream HTTP status when one was received.
    #[error("UPSTREAM_UNAVAILABLE: {message}")]
    UpstreamUnavailable { status: Option<u16>, message: String },

    /// Payload lacks the record collection a merge needs.
    #[error("MALFORMED_PAYLOAD: {0}")]
    MalformedPayload(String),

    /// Snapshot artifact missing, unreadable, or unparseable.
    #[error("SNAPSHOT_UNAVAILABLE: {0}")]
    SnapshotUnavailable(String),

    /// Snapshot could not be written to disk.
    #[error("SNAPSHOT_WRITE_FAILED: {0}")]
    SnapshotWrite(String),
}

impl Error {
    /// Build an upstream error from a status code.
    pub fn upstream_status(status: u16, message: impl Into<String>) -> Self {
        Error::UpstreamUnavailable { status: Some(status), message: message.into() }
    }

    /// Build an upstream error for failures that never produced a response.
    pub fn upstream_transport(message: impl Into<String>) -> Self {
        Error::UpstreamUnavailable { status: None, message: message.into() }
    }

    /// Upstream HTTP status carried by this error, if any.
    pub fn upstream_code(&self) -> Option<u16> {
        match self {
            Error::UpstreamUnavailable { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidIdentifier(msg) => (-32602, msg.clone()),
            Error::CacheMiss(msg) => (-32001, msg.clone()),
            Error::UpstreamUnavailable { message, .. } => (-32008, message.clone()),
            Error::MalformedPayload(msg) => (-32000, msg.clone()),
            Error::SnapshotUnavailable(msg) => (-32002, msg.clone()),
            Error::SnapshotWrite(msg) => (-32002, msg.clone()),
        };

        let data = err.upstream_code().map(|status| serde_json::json!({ "upstream_status": status }));

        McpError { code: ErrorCode(code), message: message.into(), data }
    }
}
