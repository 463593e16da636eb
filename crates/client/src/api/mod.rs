//! Upstream REST API client.
//!
//! Fetches resource identifiers (`/path?query`) from the paginated upstream
//! API on behalf of the cache.
//!
//! ### Protocol
//!
//! - **Request**: `GET {base_url}{identifier}`
//! - **Authentication**: `Authorization: Bearer <token>`.
//! - **Status mapping**:
//!   - 401/403 are authentication failures.
//!   - 429 is rate limiting.
//!   - Any other non-2xx status is reported with its code.
//! - **Body**: must be JSON; anything else is a parse error.

pub mod error;

pub use error::ApiError;

use std::fmt;
use std::time::{Duration, Instant};

use reqwest::{Url, header};
use serde_json::Value;
use sitecache_core::{AppConfig, Upstream};

/// Default base URL for the upstream API.
const DEFAULT_BASE_URL: &str = "https://api.airtable.com";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "site-cache/0.1";

/// Upstream API client configuration.
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL identifiers are appended to.
    pub base_url: String,
    /// Bearer credential.
    pub token: Option<String>,
    /// Request timeout (default: 20s).
    pub timeout: Duration,
    /// User-agent string.
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl From<&AppConfig> for ApiConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.upstream_base_url.clone(),
            token: config.require_upstream_token().ok().map(str::to_string),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Upstream API client.
///
/// A missing token is only reported when a request is attempted, so a
/// server without credentials can still answer from its snapshots.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        Url::parse(&config.base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { http, config })
    }

    /// Absolute request URL for an identifier.
    pub fn request_url(&self, identifier: &str) -> Result<Url, ApiError> {
        let base = self.config.base_url.trim_end_matches('/');
        let path = if identifier.starts_with('/') { identifier.to_string() } else { format!("/{identifier}") };
        Url::parse(&format!("{base}{path}")).map_err(|e| ApiError::InvalidUrl(e.to_string()))
    }

    /// GET one identifier and parse the body as JSON.
    pub async fn get(&self, identifier: &str) -> Result<Value, ApiError> {
        let token = self.config.token.as_deref().ok_or(ApiError::MissingToken)?;
        let url = self.request_url(identifier)?;

        let start = Instant::now();
        tracing::debug!(identifier = %identifier, "fetching from upstream");

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(
            identifier = %identifier,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "upstream responded"
        );

        if status == 401 || status == 403 {
            return Err(ApiError::AuthError { status: status.as_u16() });
        }

        if status == 429 {
            return Err(ApiError::RateLimited);
        }

        if !status.is_success() {
            return Err(ApiError::HttpError { status: status.as_u16() });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Upstream for ApiClient {
    async fn fetch(&self, identifier: &str) -> Result<Value, sitecache_core::Error> {
        self.get(identifier).await.map_err(|e| {
            tracing::warn!(identifier = %identifier, error = %e, "upstream request failed");
            e.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client_for(server: &mockito::Server, token: Option<&str>) -> ApiClient {
        ApiClient::new(ApiConfig {
            base_url: server.url(),
            token: token.map(str::to_string),
            timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = ApiConfig { token: Some("key-secret".to_string()), ..Default::default() };
        let debug = format!("{config:?}");
        assert!(!debug.contains("key-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_config_from_app_config() {
        let app = AppConfig { upstream_token: Some("  ".to_string()), ..Default::default() };
        let config = ApiConfig::from(&app);
        assert_eq!(config.base_url, app.upstream_base_url);
        assert!(config.token.is_none());
        assert_eq!(config.timeout, app.timeout());
    }

    #[test]
    fn test_new_rejects_bad_base_url() {
        let config = ApiConfig { base_url: "not a url".to_string(), ..Default::default() };
        assert!(matches!(ApiClient::new(config), Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_request_url_joins_identifier() {
        let client = ApiClient::new(ApiConfig {
            base_url: "https://api.example.com/".to_string(),
            ..Default::default()
        })
        .unwrap();

        let url = client.request_url("/v0/app/Table?view=Grid").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v0/app/Table?view=Grid");
    }

    #[tokio::test]
    async fn test_get_sends_bearer_and_parses_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v0/app/Table")
            .match_header("authorization", "Bearer key-test")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"records":[{"id":"rec1"}],"offset":"T1"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server, Some("key-test"));
        let payload = client.get("/v0/app/Table").await.unwrap();

        assert_eq!(payload, json!({"records": [{"id": "rec1"}], "offset": "T1"}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_maps_statuses() {
        let mut server = mockito::Server::new_async().await;
        let _auth = server.mock("GET", "/auth").with_status(401).create_async().await;
        let _limited = server.mock("GET", "/limited").with_status(429).create_async().await;
        let _broken = server.mock("GET", "/broken").with_status(503).create_async().await;

        let client = client_for(&server, Some("key-test"));

        assert!(matches!(client.get("/auth").await, Err(ApiError::AuthError { status: 401 })));
        assert!(matches!(client.get("/limited").await, Err(ApiError::RateLimited)));
        assert!(matches!(client.get("/broken").await, Err(ApiError::HttpError { status: 503 })));
    }

    #[tokio::test]
    async fn test_get_rejects_non_json_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/html")
            .with_status(200)
            .with_body("<html></html>")
            .create_async()
            .await;

        let client = client_for(&server, Some("key-test"));
        assert!(matches!(client.get("/html").await, Err(ApiError::Parse(_))));
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/t").expect(0).create_async().await;

        let client = client_for(&server, None);
        assert!(matches!(client.get("/t").await, Err(ApiError::MissingToken)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_trait_surfaces_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/missing").with_status(404).create_async().await;

        let client = client_for(&server, Some("key-test"));
        let err = Upstream::fetch(&client, "/missing").await.unwrap_err();
        assert_eq!(err.upstream_code(), Some(404));
    }
}
