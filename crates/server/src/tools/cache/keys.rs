//! cache_keys tool implementation.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_client::site_slug;
use sitecache_core::{Error, SiteCache};

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// Site slug.
    pub site: String,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    pub site: String,
    /// Stored identifiers, sorted.
    pub keys: Vec<String>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(cache: &SiteCache, params: CacheKeysParams) -> Result<CallToolResult, McpError> {
    let site = site_slug(Some(&params.site), None);
    let keys = cache.site_keys(&site).await.into_iter().collect();

    let output = CacheKeysOutput { site, keys };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
