//! Target URL extraction from an inbound clone request.
//!
//! The JSON body field `url` wins; the query-string parameter `url` is the
//! fallback. A body that is empty or not a JSON object simply contributes
//! nothing.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::relay::error::RelayError;

/// Tag objects injected by the backend before it renders the page,
/// e.g. `{"url": "https://cdn/x.js"}` or `{"content": "body { ... }"}`.
pub type InjectionTag = Map<String, Value>;

/// Optional script/style injections forwarded to the backend as its JSON body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Injections {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_script_tag: Vec<InjectionTag>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_style_tag: Vec<InjectionTag>,
}

impl Injections {
    pub fn is_empty(&self) -> bool {
        self.add_script_tag.is_empty() && self.add_style_tag.is_empty()
    }
}

/// A validated clone request, ready to forward.
#[derive(Debug, Clone, PartialEq)]
pub struct CloneRequest {
    /// Page the backend should clone.
    pub url: String,
    pub injections: Injections,
}

/// Build a [`CloneRequest`] from the raw query string and body bytes.
pub fn clone_request(query: Option<&str>, body: &[u8]) -> Result<CloneRequest, RelayError> {
    let body = parse_body(body);

    let url = body
        .as_ref()
        .and_then(|object| object.get("url"))
        .and_then(Value::as_str)
        .and_then(non_blank)
        .or_else(|| query.and_then(query_url))
        .ok_or(RelayError::MissingUrl)?;

    let injections = body
        .as_ref()
        .map(|object| Injections {
            add_script_tag: tags(object.get("add_script_tag")),
            add_style_tag: tags(object.get("add_style_tag")),
        })
        .unwrap_or_default();

    Ok(CloneRequest { url, injections })
}

fn parse_body(body: &[u8]) -> Option<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => Some(object),
        Ok(_) => {
            tracing::debug!("Request body is JSON but not an object, ignoring");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "Request body is not JSON, ignoring");
            None
        }
    }
}

fn query_url(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "url")
        .and_then(|(_, value)| non_blank(&value))
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// Keep only objects with at least one meaningful value.
fn tags(value: Option<&Value>) -> Vec<InjectionTag> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(tag) if tag.values().any(is_meaningful) => Some(tag.clone()),
            _ => None,
        })
        .collect()
}

fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
