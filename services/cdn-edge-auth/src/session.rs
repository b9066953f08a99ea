//! Session token set carried in the viewer's cookies.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

/// The three tokens making up a signed-in session, and the user they were
/// issued to.
///
/// A refresh produces a new set; an existing set is never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokenSet {
    user: String,
    access_token: String,
    id_token: String,
    refresh_token: String,
}

impl SessionTokenSet {
    /// Creates a token set.
    #[must_use]
    pub fn new(
        user: impl Into<String>,
        access_token: impl Into<String>,
        id_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            access_token: access_token.into(),
            id_token: id_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Last authenticated user, the middle segment of the token cookie names.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// ID token, the one the pipeline validates.
    #[must_use]
    pub fn id_token(&self) -> &str {
        &self.id_token
    }

    /// Refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Expiry of the ID token, read without verifying it.
    ///
    /// Only for comparing a refreshed set against the one it replaces;
    /// never an authorization input.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        peek_expiry(&self.id_token)
    }
}

impl fmt::Debug for SessionTokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokenSet")
            .field("user", &self.user)
            .field("access_token", &"[REDACTED]")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

/// Reads the `exp` claim of a compact JWT without checking its signature.
#[must_use]
pub fn peek_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => payload,
        _ => return None,
    };
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claim: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claim.exp, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned_token(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_peek_expiry_reads_exp() {
        let token = unsigned_token(r#"{"sub":"u-1","exp":1700000000}"#);
        let expiry = peek_expiry(&token).unwrap();
        assert_eq!(expiry.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_peek_expiry_rejects_garbage() {
        assert!(peek_expiry("not-a-jwt").is_none());
        assert!(peek_expiry("a.b").is_none());
        assert!(peek_expiry(&unsigned_token(r#"{"sub":"u-1"}"#)).is_none());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let set = SessionTokenSet::new("alice", "access-secret", "id-secret", "refresh-secret");
        let rendered = format!("{set:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
