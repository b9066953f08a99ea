//! CDN edge event shapes.
//!
//! Requests and responses use the edge runtime's record format: header
//! names are lower-cased map keys, each holding a list of `{key, value}`
//! entries where `key` keeps the original casing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cookies::SetCookie;

/// One header value with its original-case name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    /// Header name as sent on the wire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Header value
    pub value: String,
}

/// Lower-cased header map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, Vec<HeaderEntry>>);

impl Headers {
    /// Creates an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// First value of a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(&name.to_ascii_lowercase())
            .and_then(|entries| entries.first())
            .map(|entry| entry.value.as_str())
    }

    /// Every value of a header, in order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .get(&name.to_ascii_lowercase())
            .into_iter()
            .flatten()
            .map(|entry| entry.value.as_str())
    }

    /// Replaces all values of a header with a single value.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(
            name.to_ascii_lowercase(),
            vec![HeaderEntry {
                key: Some(name.to_string()),
                value: value.into(),
            }],
        );
    }

    /// Adds a value, keeping existing ones.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(HeaderEntry {
                key: Some(name.to_string()),
                value: value.into(),
            });
    }

    /// Removes a header entirely.
    pub fn remove(&mut self, name: &str) -> Option<Vec<HeaderEntry>> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    /// Whether the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    /// Keeps only headers whose lower-cased name satisfies the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|name, _| keep(name));
    }

    /// Lower-cased header names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Inbound viewer request as seen at the edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRequest {
    /// HTTP method
    pub method: String,
    /// Path component, always starting with `/`
    pub uri: String,
    /// Raw query string without the leading `?`
    #[serde(default)]
    pub querystring: String,
    /// Request headers
    #[serde(default)]
    pub headers: Headers,
    /// Viewer address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
}

impl EdgeRequest {
    /// Creates a request with no headers or query string.
    #[must_use]
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            querystring: String::new(),
            headers: Headers::new(),
            client_ip: None,
        }
    }

    /// Adds a header (builder style).
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the query string (builder style).
    #[must_use]
    pub fn with_querystring(mut self, querystring: impl Into<String>) -> Self {
        self.querystring = querystring.into();
        self
    }

    /// Host the viewer addressed.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.headers.get("host")
    }

    /// All `cookie` header values joined the way a single header would carry them.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        let joined = self.headers.get_all("cookie").collect::<Vec<_>>().join("; ");
        if joined.trim().is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

/// Response generated at the edge instead of going to the origin, or an
/// origin response passing back through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeResponse {
    /// Status code as a decimal string
    pub status: String,
    /// Reason phrase
    #[serde(default)]
    pub status_description: String,
    /// Response headers
    #[serde(default)]
    pub headers: Headers,
}

impl EdgeResponse {
    /// Creates a response with the given status.
    #[must_use]
    pub fn new(status: u16, description: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            status_description: description.into(),
            headers: Headers::new(),
        }
    }

    /// Uncacheable `302 Found` to `location`.
    #[must_use]
    pub fn redirect(location: &str) -> Self {
        let mut response = Self::new(302, "Found");
        response.headers.insert("Location", location);
        response
            .headers
            .insert("Cache-Control", "no-cache, no-store, max-age=0, must-revalidate");
        response
    }

    /// Appends one `set-cookie` header per cookie.
    #[must_use]
    pub fn with_set_cookies(mut self, cookies: &[SetCookie]) -> Self {
        for cookie in cookies {
            self.headers.append("Set-Cookie", cookie.to_header_value());
        }
        self
    }

    /// Numeric status, if the status string is well formed.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status.parse().ok()
    }

    /// `location` header, for redirects.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers.get("location")
    }
}
