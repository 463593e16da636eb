//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{ApiFetchParams, fetch_impl};
use crate::tools::cache::{CacheGetParams, CacheKeysParams, CachePurgeParams, get_impl, keys_impl, purge_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use sitecache_core::{AppConfig, SiteCache};

/// The main MCP server handler for the site cache.
#[derive(Clone)]
pub struct SiteCacheServer {
    cache: SiteCache,
    config: Arc<AppConfig>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SiteCacheServer {
    /// Create a new server handler.
    pub fn new(cache: SiteCache, config: Arc<AppConfig>) -> Self {
        Self { cache, config, tool_router: Self::tool_router() }
    }

    /// Fetch an upstream API resource through the site cache.
    ///
    /// Cached entries are returned immediately; stale ones are refreshed in the background.
    #[tool(
        description = "Fetch a paginated REST API resource through the per-site cache. Returns the JSON payload and whether it was served from cache."
    )]
    async fn api_fetch(&self, params: Parameters<ApiFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.cache, &self.config, params.0).await
    }

    /// Read a stored entry without contacting upstream.
    #[tool(description = "Read a cached entry (payload and last_updated) for a site without contacting the upstream API.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.cache, &self.config, params.0).await
    }

    /// List the identifiers stored for a site.
    #[tool(description = "List the resource identifiers cached for a site.")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        keys_impl(&self.cache, params.0).await
    }

    /// Run the merge and forgetting passes on a site now.
    #[tool(
        description = "Merge cached pagination fragments and forget entries older than the forget interval for a site."
    )]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.cache, params.0).await
    }
}

impl ServerHandler for SiteCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "site-cache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
