// Transport-neutral request/response types.
//
// The engine describes *what* to send with these types; a `Transport`
// decides how the bytes go over the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// HTTP method of an action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Methods that carry the payload in the request body.
    /// Everything else sends it as query parameters.
    pub fn carries_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch | Self::Delete)
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Encoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Serialized as JSON.
    Json(Value),
    /// Serialized as `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
}

impl Body {
    /// Pick the body encoding for a payload based on the content type.
    ///
    /// Anything mentioning `application/json` is sent as JSON; all other
    /// content types (including none) fall back to form encoding.
    pub fn encode(payload: &Map<String, Value>, content_type: Option<&str>) -> Self {
        if content_type.is_some_and(|ct| ct.contains("application/json")) {
            Self::Json(Value::Object(payload.clone()))
        } else {
            Self::Form(encode_pairs(payload))
        }
    }
}

/// A fully resolved request, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL, or a route relative to the transport's base URL.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Body>,
    pub content_type: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            content_type: None,
        }
    }

    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Decoded body. `Null` for empty bodies, a JSON string for non-JSON text.
    pub data: Value,
}

impl HttpResponse {
    pub fn new(status: u16, data: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            data,
        }
    }
}

// ── Query / form encoding ────────────────────────────────────────────

/// Flatten a record into `key=value` pairs using bracket notation for
/// nesting: `{a: {b: 1}}` → `a[b]=1`, `{a: [1, 2]}` → `a[]=1&a[]=2`.
pub fn encode_pairs(record: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in record {
        push_pairs(&mut pairs, key, value);
    }
    pairs
}

fn push_pairs(pairs: &mut Vec<(String, String)>, prefix: &str, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                push_pairs(pairs, &format!("{prefix}[{key}]"), nested);
            }
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                // Scalars use `a[]`; nested containers need an index to stay unambiguous.
                if item.is_object() || item.is_array() {
                    push_pairs(pairs, &format!("{prefix}[{idx}]"), item);
                } else {
                    push_pairs(pairs, &format!("{prefix}[]"), item);
                }
            }
        }
        Value::Null => pairs.push((prefix.to_owned(), String::new())),
        Value::String(s) => pairs.push((prefix.to_owned(), s.clone())),
        other => pairs.push((prefix.to_owned(), other.to_string())),
    }
}
