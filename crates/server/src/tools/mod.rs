//! MCP tool implementations.
//!
//! This module contains all tools exposed by the site-cache server.

pub mod api_fetch;
pub mod cache;

pub use api_fetch::{ApiFetchParams, fetch_impl};

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use rmcp::model::CallToolResult;
    use serde::de::DeserializeOwned;
    use serde_json::Value;
    use sitecache_core::cache::SnapshotStore;
    use sitecache_core::{CachePolicy, Error, PaginationShape, SiteCache, Upstream};

    /// Upstream answering from a fixed map; anything else is a 404.
    #[derive(Default)]
    pub(crate) struct StaticUpstream {
        pub(crate) responses: Mutex<HashMap<String, Value>>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl StaticUpstream {
        pub(crate) fn with(responses: &[(&str, Value)]) -> Arc<Self> {
            let map = responses.iter().map(|(id, v)| (id.to_string(), v.clone())).collect();
            Arc::new(Self { responses: Mutex::new(map), calls: Mutex::default() })
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl Upstream for StaticUpstream {
        async fn fetch(&self, identifier: &str) -> Result<Value, Error> {
            self.calls.lock().unwrap().push(identifier.to_string());
            self.responses
                .lock()
                .unwrap()
                .get(identifier)
                .cloned()
                .ok_or_else(|| Error::upstream_status(404, format!("HTTP 404 for {identifier}")))
        }
    }

    pub(crate) fn cache_in(dir: &std::path::Path, upstream: Arc<StaticUpstream>) -> SiteCache {
        SiteCache::new(upstream, SnapshotStore::new(dir), CachePolicy::default(), PaginationShape::default())
    }

    /// Decode the JSON text content of a tool result.
    pub(crate) fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
        let content = serde_json::to_value(&result.content[0]).unwrap();
        let text = content
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
