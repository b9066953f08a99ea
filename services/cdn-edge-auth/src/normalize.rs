//! Request normalization and response shaping.
//!
//! Path canonicalization, the origin header allow-list, sign-out and the
//! security headers added to every viewer response.

use url::Url;

use crate::cookies::{CookieCodec, SetCookie};
use crate::edge::{EdgeRequest, EdgeResponse, Headers};

/// Headers added to every viewer response.
pub const SECURITY_HEADERS: &[(&str, &str)] = &[
    (
        "Strict-Transport-Security",
        "max-age=63072000; includeSubDomains; preload",
    ),
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "DENY"),
    ("Referrer-Policy", "same-origin"),
];

/// Canonical path: every trailing slash is stripped in one step and a
/// missing leading slash is added, so `/admin///` and `admin/` both become
/// `/admin`. An empty or all-slash path becomes `/`.
///
/// Idempotent: `normalize_path(normalize_path(p)) == normalize_path(p)`.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Shapes what crosses the edge in either direction.
#[derive(Debug, Clone)]
pub struct RequestNormalizer {
    allowed_headers: Vec<String>,
    post_sign_out_url: Url,
}

impl RequestNormalizer {
    /// Creates a normalizer forwarding only `allowed_headers`.
    #[must_use]
    pub fn new(allowed_headers: &[String], post_sign_out_url: Url) -> Self {
        Self {
            allowed_headers: allowed_headers.iter().map(|h| h.to_ascii_lowercase()).collect(),
            post_sign_out_url,
        }
    }

    /// Whether a header may be forwarded to the origin.
    #[must_use]
    pub fn is_forwarded(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.allowed_headers.iter().any(|allowed| *allowed == name)
    }

    /// Copies the allow-listed headers.
    ///
    /// `cookie` and `authorization` only pass when allow-listed explicitly.
    #[must_use]
    pub fn shape_headers(&self, headers: &Headers) -> Headers {
        let mut shaped = headers.clone();
        shaped.retain(|name| self.is_forwarded(name));
        shaped
    }

    /// Builds the origin-bound request for `path`, keeping the query string.
    #[must_use]
    pub fn forwarded_request(&self, request: &EdgeRequest, path: &str) -> EdgeRequest {
        EdgeRequest {
            method: request.method.clone(),
            uri: path.to_string(),
            querystring: request.querystring.clone(),
            headers: self.shape_headers(&request.headers),
            client_ip: request.client_ip.clone(),
        }
    }

    /// Redirect to the post-sign-out location clearing the session cookies
    /// of the user named in the request's `LastAuthUser` cookie.
    #[must_use]
    pub fn sign_out(&self, codec: &CookieCodec, request: &EdgeRequest) -> EdgeResponse {
        let user = request
            .cookie_header()
            .and_then(|header| codec.last_auth_user(&header));
        EdgeResponse::redirect(self.post_sign_out_url.as_str()).with_set_cookies(&codec.clear(user.as_deref()))
    }

    /// Adds the security headers and any pending session cookies.
    #[must_use]
    pub fn shape_response(&self, mut response: EdgeResponse, cookies: &[SetCookie]) -> EdgeResponse {
        for (name, value) in SECURITY_HEADERS {
            response.headers.insert(name, *value);
        }
        response.with_set_cookies(cookies)
    }
}
