//! cache_get tool implementation.
//!
//! Reads a stored entry without contacting upstream.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sitecache_client::{normalize_identifier, site_slug};
use sitecache_core::{AppConfig, Error, SiteCache};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Site slug.
    pub site: String,
    /// Resource path and query, normalized the same way api_fetch does.
    pub path: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub site: String,
    pub identifier: String,
    /// RFC 3339 time the entry was last written.
    pub last_updated: String,
    pub payload: Value,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(
    cache: &SiteCache, config: &AppConfig, params: CacheGetParams,
) -> Result<CallToolResult, McpError> {
    let site = site_slug(Some(&params.site), None);
    let identifier = normalize_identifier(&params.path, &config.control_params).map_err(Error::from)?;

    let entry = cache
        .entry(&site, &identifier)
        .await
        .ok_or_else(|| Error::CacheMiss(format!("{site}:{identifier}")))?;

    let output = CacheGetOutput { site, identifier, last_updated: entry.last_updated.to_rfc3339(), payload: entry.payload };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize entry: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{StaticUpstream, cache_in, output};
    use serde_json::json;

    #[tokio::test]
    async fn test_get_impl_missing() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = StaticUpstream::with(&[("/t", json!({"records": []}))]);
        let cache = cache_in(dir.path(), upstream.clone());
        let params = CacheGetParams { site: "example".to_string(), path: "/t".to_string() };

        let err = get_impl(&cache, &AppConfig::default(), params).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
        assert_eq!(upstream.call_count(), 0);
    }

    #[tokio::test]
    async fn test_get_impl_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), StaticUpstream::with(&[("/t?view=Grid", json!({"records": [1]}))]));
        cache.fetch("example", "/t?view=Grid", false).await.unwrap();

        let params = CacheGetParams { site: "Example".to_string(), path: "/t?view=Grid&refresh=1".to_string() };
        let out: CacheGetOutput = output(&get_impl(&cache, &AppConfig::default(), params).await.unwrap());

        assert_eq!(out.site, "example");
        assert_eq!(out.identifier, "/t?view=Grid");
        assert_eq!(out.payload, json!({"records": [1]}));
        assert!(chrono::DateTime::parse_from_rfc3339(&out.last_updated).is_ok());
    }
}
