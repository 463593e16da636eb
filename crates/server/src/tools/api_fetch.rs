//! api_fetch tool implementation.
//!
//! Serves an upstream API resource through the site cache.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sitecache_client::{force_refresh_requested, normalize_identifier, site_requested, site_slug};
use sitecache_core::{AppConfig, Error, SiteCache};

/// Input parameters for the api_fetch tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ApiFetchParams {
    /// Resource path and query on the upstream API, e.g. `/v0/app/Table?view=Grid`.
    pub path: String,

    /// Site the request belongs to. Falls back to a `site` query parameter, then to `origin`.
    #[serde(default)]
    pub site: Option<String>,

    /// Origin of the calling page; its host names the site when `site` is absent.
    #[serde(default)]
    pub origin: Option<String>,

    /// Fetch from upstream even when a cached entry exists.
    #[serde(default)]
    pub force_refresh: Option<bool>,
}

/// Output structure for the api_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiFetchOutput {
    /// Resolved site slug.
    pub site: String,
    /// Normalized resource identifier the entry is stored under.
    pub identifier: String,
    /// Whether the payload came from the cache.
    pub served_from_cache: bool,
    /// The upstream JSON payload.
    pub payload: Value,
}

/// Implementation of the api_fetch tool.
pub async fn fetch_impl(
    cache: &SiteCache, config: &AppConfig, params: ApiFetchParams,
) -> Result<CallToolResult, McpError> {
    if params.path.trim().is_empty() {
        return Err(Error::InvalidInput("path cannot be empty".into()).into());
    }

    let identifier = normalize_identifier(&params.path, &config.control_params).map_err(Error::from)?;

    let query_site = site_requested(&params.path, &config.control_params);
    let site = site_slug(params.site.as_deref().or(query_site.as_deref()), params.origin.as_deref());

    let force_refresh =
        params.force_refresh.unwrap_or(false) || force_refresh_requested(&params.path, &config.control_params);

    let outcome = cache.fetch(&site, &identifier, force_refresh).await?;
    tracing::info!(
        site = %site,
        identifier = %identifier,
        served_from_cache = outcome.served_from_cache,
        "api_fetch"
    );

    let output =
        ApiFetchOutput { site, identifier, served_from_cache: outcome.served_from_cache, payload: outcome.payload };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
