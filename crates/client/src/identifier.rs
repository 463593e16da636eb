//! Resolution of inbound requests into cache keys.
//!
//! A request names an upstream resource as `path?query`, optionally with
//! control parameters (`site`, `refresh`) that steer the cache and are never
//! forwarded upstream.

use sitecache_core::Error;
use sitecache_core::cache::{UNKNOWN_SITE, sanitize_slug};
use url::form_urlencoded;

/// Control parameter that forces a synchronous refetch.
pub const REFRESH_PARAM: &str = "refresh";

/// Control parameter that names the site.
pub const SITE_PARAM: &str = "site";

/// Error type for identifier resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum IdentifierError {
    #[error("empty identifier")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid identifier: {0}")]
    Invalid(String),
}

impl From<IdentifierError> for Error {
    fn from(err: IdentifierError) -> Self {
        Error::InvalidIdentifier(err.to_string())
    }
}

/// Split a raw request target into path and optional query.
///
/// Accepts either a path (`/v0/app/Table?view=Grid`) or an absolute http(s)
/// URL whose path and query are used.
fn split_target(raw: &str) -> Result<(String, Option<String>), IdentifierError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(IdentifierError::Empty);
    }

    if trimmed.contains("://") {
        let parsed = url::Url::parse(trimmed).map_err(|e| IdentifierError::Invalid(e.to_string()))?;
        return match parsed.scheme() {
            "http" | "https" => Ok((parsed.path().to_string(), parsed.query().map(str::to_string))),
            scheme => Err(IdentifierError::UnsupportedScheme(scheme.to_string())),
        };
    }

    let without_fragment = trimmed.split('#').next().unwrap_or_default();
    let (path, query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query.to_string())),
        None => (without_fragment, None),
    };

    if path.chars().any(char::is_whitespace) {
        return Err(IdentifierError::Invalid(format!("whitespace in path: {path:?}")));
    }

    let path = if path.starts_with('/') { path.to_string() } else { format!("/{path}") };
    Ok((path, query))
}

/// Normalize a request target into a cache identifier.
///
/// Normalization steps:
/// 1. Trim whitespace, reject empty input and non-http(s) absolute URLs
/// 2. Ensure a leading `/`, drop any fragment
/// 3. Remove `control_params` from the query, keeping the order of the rest
/// 4. Render `path?query`, or just `path` when nothing is left
pub fn normalize_identifier(raw: &str, control_params: &[String]) -> Result<String, IdentifierError> {
    let (path, query) = split_target(raw)?;

    let Some(query) = query else {
        return Ok(path);
    };

    let kept: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .filter(|(name, _)| !control_params.iter().any(|c| c == name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        return Ok(path);
    }

    let rendered = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(kept)
        .finish();
    Ok(format!("{path}?{rendered}"))
}

/// Value of a control parameter in a raw request target.
pub fn control_value(raw: &str, name: &str) -> Option<String> {
    let (_, query) = split_target(raw).ok()?;
    form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Value of `name` when it is one of `control_params`.
///
/// A parameter that is not a control parameter belongs to the upstream
/// request and steers nothing here.
pub fn control_param(raw: &str, name: &str, control_params: &[String]) -> Option<String> {
    if !control_params.iter().any(|c| c == name) {
        return None;
    }
    control_value(raw, name)
}

/// Site named by a `site` control parameter.
pub fn site_requested(raw: &str, control_params: &[String]) -> Option<String> {
    control_param(raw, SITE_PARAM, control_params)
}

/// Whether the request carries a truthy `refresh` control parameter.
pub fn force_refresh_requested(raw: &str, control_params: &[String]) -> bool {
    control_param(raw, REFRESH_PARAM, control_params).is_some_and(|value| {
        matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
    })
}

/// Resolve the site slug for a request.
///
/// An explicit non-blank value wins; otherwise the host of `origin` is used;
/// otherwise the request belongs to the `unknown` site.
pub fn site_slug(explicit: Option<&str>, origin: Option<&str>) -> String {
    if let Some(explicit) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
        return sanitize_slug(explicit);
    }

    origin
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(origin_host)
        .map(|host| sanitize_slug(&host))
        .unwrap_or_else(|| UNKNOWN_SITE.to_string())
}

fn origin_host(origin: &str) -> Option<String> {
    let with_scheme = if origin.contains("://") { origin.to_string() } else { format!("https://{origin}") };
    url::Url::parse(&with_scheme)
        .ok()?
        .host_str()
        .map(str::to_lowercase)
}
