//! Boundary to the remote API.

use serde_json::Value;

use crate::Error;

/// Fetches a resource identifier from the upstream API.
///
/// Implementations carry the credential and base address; the cache only
/// ever sees identifiers and payloads. Any transport failure or non-success
/// status must be reported as [`Error::UpstreamUnavailable`].
#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch(&self, identifier: &str) -> Result<Value, Error>;
}
