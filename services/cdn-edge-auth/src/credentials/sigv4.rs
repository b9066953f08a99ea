//! AWS Signature Version 4 for forwarded origin requests.
//!
//! Edge requests carry no body toward the origin, so the payload hash is
//! always the hash of the empty string. The signed header set is fixed:
//! `host`, `x-amz-date` and `x-amz-security-token`.

use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use ring::hmac;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::credentials::exchanger::TemporaryCredential;
use crate::edge::EdgeRequest;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const EMPTY_PAYLOAD_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// RFC 3986 unreserved characters stay literal.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same as [`UNRESERVED`] but keeps path separators.
const PATH: &AsciiSet = &UNRESERVED.remove(b'/');

/// Signs requests for one region and service.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    region: String,
    service: String,
}

impl RequestSigner {
    /// Creates a signer, e.g. for `("us-east-1", "execute-api")`.
    #[must_use]
    pub fn new(region: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            service: service.into(),
        }
    }

    /// Adds `host`, `x-amz-date`, `x-amz-security-token` and
    /// `authorization` to the request.
    pub fn sign(
        &self,
        request: &mut EdgeRequest,
        host: &str,
        credential: &TemporaryCredential,
        now: DateTime<Utc>,
    ) {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let headers = BTreeMap::from([
            ("host".to_string(), host.to_string()),
            ("x-amz-date".to_string(), amz_date.clone()),
            (
                "x-amz-security-token".to_string(),
                credential.session_token().to_string(),
            ),
        ]);

        let canonical = canonical_request(
            &request.method,
            &request.uri,
            &request.querystring,
            &headers,
            EMPTY_PAYLOAD_SHA256,
        );
        let scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let key = signing_key(credential.secret_access_key(), &date, &self.region, &self.service);
        let signature = hex::encode(hmac::sign(
            &key,
            string_to_sign(&amz_date, &scope, &canonical).as_bytes(),
        ));

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
            credential.access_key_id(),
            signed_header_names(&headers),
        );

        request.headers.insert("Host", host);
        request.headers.insert("X-Amz-Date", amz_date);
        request
            .headers
            .insert("X-Amz-Security-Token", credential.session_token());
        request.headers.insert("Authorization", authorization);
    }
}

fn signed_header_names(headers: &BTreeMap<String, String>) -> String {
    headers.keys().map(String::as_str).collect::<Vec<_>>().join(";")
}

fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    utf8_percent_encode(path, PATH).to_string()
}

fn canonical_query(query: &str) -> String {
    let decode = |s: &str| {
        let spaced = s.replace('+', " ");
        percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
    };
    let mut pairs: Vec<(String, String)> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (
                utf8_percent_encode(&decode(k), UNRESERVED).to_string(),
                utf8_percent_encode(&decode(v), UNRESERVED).to_string(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn canonical_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn canonical_request(
    method: &str,
    path: &str,
    query: &str,
    headers: &BTreeMap<String, String>,
    payload_hash: &str,
) -> String {
    let mut out = String::new();
    out.push_str(&method.to_ascii_uppercase());
    out.push('\n');
    out.push_str(&canonical_uri(path));
    out.push('\n');
    out.push_str(&canonical_query(query));
    out.push('\n');
    for (name, value) in headers {
        out.push_str(name);
        out.push(':');
        out.push_str(&canonical_header_value(value));
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&signed_header_names(headers));
    out.push('\n');
    out.push_str(payload_hash);
    out
}

fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    )
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> hmac::Key {
    let step = |key: &[u8], data: &str| {
        hmac::sign(&hmac::Key::new(hmac::HMAC_SHA256, key), data.as_bytes())
    };
    let k_date = step(format!("AWS4{secret}").as_bytes(), date);
    let k_region = step(k_date.as_ref(), region);
    let k_service = step(k_region.as_ref(), service);
    let k_signing = step(k_service.as_ref(), "aws4_request");
    hmac::Key::new(hmac::HMAC_SHA256, k_signing.as_ref())
}
