//! cache_purge tool implementation.
//!
//! Runs the merge and forgetting passes on one site immediately.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_client::site_slug;
use sitecache_core::{Error, SiteCache};

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Site slug.
    pub site: String,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    pub site: String,
    /// Number of pagination fragments folded into their heads.
    pub merged: usize,
    /// Identifiers deleted for being older than the forget interval.
    pub forgotten: Vec<String>,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(cache: &SiteCache, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.site.trim().is_empty() {
        return Err(Error::InvalidInput("site cannot be empty".to_string()).into());
    }

    let site = site_slug(Some(&params.site), None);
    let report = cache.purge(&site).await;
    tracing::info!(site = %site, merged = report.merged, forgotten = report.forgotten.len(), "cache purged");

    let output = CachePurgeOutput { site, merged: report.merged, forgotten: report.forgotten };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{StaticUpstream, cache_in, output};
    use chrono::{TimeDelta, Utc};
    use serde_json::json;
    use sitecache_core::Entry;

    #[tokio::test]
    async fn test_purge_merges_and_forgets() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), StaticUpstream::with(&[]));

        let site = cache.site("example").await;
        site.store().put("/t", Entry::fresh(json!({"records": ["a"], "offset": "T1"})));
        site.store().put("/t?offset=T1", Entry::fresh(json!({"records": ["b"]})));
        site.store().put(
            "/old",
            Entry::new(json!({"records": []}), Utc::now() - TimeDelta::days(8)),
        );

        let out: CachePurgeOutput =
            output(&purge_impl(&cache, CachePurgeParams { site: "example".into() }).await.unwrap());

        assert_eq!(out.merged, 1);
        assert_eq!(out.forgotten, vec!["/old".to_string()]);
        assert_eq!(cache.site_keys("example").await.into_iter().collect::<Vec<_>>(), vec!["/t".to_string()]);
        assert!(dir.path().join("example.js").exists());
    }

    #[tokio::test]
    async fn test_purge_no_site() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), StaticUpstream::with(&[]));

        let result = purge_impl(&cache, CachePurgeParams { site: " ".into() }).await;
        assert!(result.is_err());
    }
}
