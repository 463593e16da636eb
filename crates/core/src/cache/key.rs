//! Resource identifier and pagination helpers.
//!
//! Identifiers are `path?query` strings. A continuation token travels in the
//! query of a fragment identifier and in a payload field of a head entry;
//! [`PaginationShape`] names both.

use serde_json::Value;
use url::form_urlencoded;

/// Slug used when no site can be resolved from the request.
pub const UNKNOWN_SITE: &str = "unknown";

/// Field and parameter names that describe upstream pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationShape {
    /// Payload field holding the record collection.
    pub records_field: String,
    /// Payload field holding the continuation token.
    pub token_field: String,
    /// Query parameter carrying a continuation token.
    pub token_param: String,
}

impl Default for PaginationShape {
    fn default() -> Self {
        Self { records_field: "records".into(), token_field: "offset".into(), token_param: "offset".into() }
    }
}

impl PaginationShape {
    /// Continuation token carried by a payload, if more pages exist upstream.
    ///
    /// Strings must be non-empty; numeric tokens are rendered as strings.
    /// `null` or a missing field means the chain is exhausted.
    pub fn payload_token(&self, payload: &Value) -> Option<String> {
        match payload.get(&self.token_field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Continuation token carried in an identifier's query.
    pub fn fragment_token(&self, identifier: &str) -> Option<String> {
        let (_, query) = split_query(identifier);
        form_urlencoded::parse(query?.as_bytes())
            .find(|(k, _)| k == self.token_param.as_str())
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    }

    /// Whether the identifier names a continuation page of another entry.
    pub fn is_fragment(&self, identifier: &str) -> bool {
        self.fragment_token(identifier).is_some()
    }

    /// Whether the payload has a record collection a merge can extend.
    pub fn has_records(&self, payload: &Value) -> bool {
        payload.get(&self.records_field).is_some_and(Value::is_array)
    }

    /// Identifier of the next page: `identifier` with the continuation
    /// parameter replaced by `token`.
    pub fn next_page(&self, identifier: &str, token: &str) -> String {
        let (path, mut serializer) = self.without_token(identifier);
        serializer.append_pair(&self.token_param, token);
        format!("{path}?{}", serializer.finish())
    }

    /// Identifier of the head a fragment continues: `identifier` with the
    /// continuation parameter removed.
    ///
    /// For any head `h`, `head_identifier(&next_page(h, t))` equals
    /// `head_identifier(h)`.
    pub fn head_identifier(&self, identifier: &str) -> String {
        let (path, mut serializer) = self.without_token(identifier);
        let query = serializer.finish();
        if query.is_empty() { path.to_string() } else { format!("{path}?{query}") }
    }

    fn without_token<'a>(&self, identifier: &'a str) -> (&'a str, form_urlencoded::Serializer<'static, String>) {
        let (path, query) = split_query(identifier);
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        if let Some(query) = query {
            for (k, v) in form_urlencoded::parse(query.as_bytes()) {
                if k != self.token_param.as_str() {
                    serializer.append_pair(&k, &v);
                }
            }
        }
        (path, serializer)
    }
}

fn split_query(identifier: &str) -> (&str, Option<&str>) {
    match identifier.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (identifier, None),
    }
}

/// Restrict a slug to `[a-z0-9._-]` so it is safe as a file stem.
///
/// Blank input, or input made only of dots, yields [`UNKNOWN_SITE`].
pub fn sanitize_slug(raw: &str) -> String {
    let slug: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '-' })
        .collect();

    if slug.is_empty() || slug.chars().all(|c| c == '.') { UNKNOWN_SITE.to_string() } else { slug }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_token() {
        let shape = PaginationShape::default();
        assert_eq!(shape.payload_token(&json!({"records": [], "offset": "T1"})), Some("T1".into()));
        assert_eq!(shape.payload_token(&json!({"records": [], "offset": 40})), Some("40".into()));
        assert_eq!(shape.payload_token(&json!({"records": [], "offset": null})), None);
        assert_eq!(shape.payload_token(&json!({"records": [], "offset": ""})), None);
        assert_eq!(shape.payload_token(&json!({"records": []})), None);
        assert_eq!(shape.payload_token(&json!([1, 2])), None);
    }

    #[test]
    fn test_fragment_token() {
        let shape = PaginationShape::default();
        assert_eq!(shape.fragment_token("/v0/app/Table?view=Grid&offset=T1"), Some("T1".into()));
        assert_eq!(shape.fragment_token("/v0/app/Table?offset=itr1%2Frec2"), Some("itr1/rec2".into()));
        assert_eq!(shape.fragment_token("/v0/app/Table?offset="), None);
        assert_eq!(shape.fragment_token("/v0/app/Table?view=Grid"), None);
        assert_eq!(shape.fragment_token("/v0/app/Table"), None);
        assert!(!shape.is_fragment("/v0/app/Table?pageOffset=3"));
    }

    #[test]
    fn test_next_page_appends_token() {
        let shape = PaginationShape::default();
        assert_eq!(shape.next_page("/v0/app/Table", "T1"), "/v0/app/Table?offset=T1");
        assert_eq!(shape.next_page("/v0/app/Table?view=Grid", "T1"), "/v0/app/Table?view=Grid&offset=T1");
    }

    #[test]
    fn test_head_identifier_strips_token() {
        let shape = PaginationShape::default();
        assert_eq!(shape.head_identifier("/v0/app/Table?offset=T1"), "/v0/app/Table");
        assert_eq!(shape.head_identifier("/v0/app/Table?view=Grid&offset=100"), "/v0/app/Table?view=Grid");
        assert_eq!(shape.head_identifier("/v0/app/Table?view=Grid"), "/v0/app/Table?view=Grid");

        let head = "/v0/app/Table?view=Grid";
        assert_eq!(shape.head_identifier(&shape.next_page(head, "itr/rec")), head);
    }

    #[test]
    fn test_next_page_replaces_token() {
        let shape = PaginationShape::default();
        let next = shape.next_page("/v0/app/Table?offset=T1&view=Grid", "itr/rec");
        assert_eq!(next, "/v0/app/Table?view=Grid&offset=itr%2Frec");
        assert_eq!(shape.fragment_token(&next), Some("itr/rec".into()));
    }

    #[test]
    fn test_has_records() {
        let shape = PaginationShape::default();
        assert!(shape.has_records(&json!({"records": []})));
        assert!(!shape.has_records(&json!({"records": {}})));
        assert!(!shape.has_records(&json!({"offset": "T1"})));
    }

    #[test]
    fn test_sanitize_slug() {
        assert_eq!(sanitize_slug("Example.COM"), "example.com");
        assert_eq!(sanitize_slug("../etc/passwd"), "..-etc-passwd");
        assert_eq!(sanitize_slug("my site"), "my-site");
        assert_eq!(sanitize_slug("  "), UNKNOWN_SITE);
        assert_eq!(sanitize_slug(".."), UNKNOWN_SITE);
    }
}
