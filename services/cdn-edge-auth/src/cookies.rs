//! Session cookie codec.
//!
//! The hosted sign-in UI stores the session under the app client:
//! `<prefix>.<clientId>.LastAuthUser` names the user, and the tokens live
//! at `<prefix>.<clientId>.<user>.{accessToken,idToken,refreshToken}`.
//! Every write sets the same attributes on all four cookies so the browser
//! expires them together.

use chrono::{DateTime, Duration, Utc};
use cookie::time::{Duration as CookieDuration, OffsetDateTime};
use cookie::{Cookie, Expiration};
use std::collections::HashMap;

pub use cookie::SameSite;

use crate::error::EdgeAuthError;
use crate::session::SessionTokenSet;

const COOKIE_NAME_PREFIX: &str = "CognitoIdentityServiceProvider";

/// Parses a `SameSite` attribute value, case-insensitively.
#[must_use]
pub fn parse_same_site(value: &str) -> Option<SameSite> {
    match value.trim().to_ascii_lowercase().as_str() {
        "strict" => Some(SameSite::Strict),
        "lax" => Some(SameSite::Lax),
        "none" => Some(SameSite::None),
        _ => None,
    }
}

/// Attributes shared by every session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    /// `Path` attribute
    pub path: String,
    /// `Domain` attribute, host-only when unset
    pub domain: Option<String>,
    /// Lifetime written as both `Max-Age` and `Expires`
    pub max_age: Duration,
    /// `SameSite` attribute
    pub same_site: SameSite,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            max_age: Duration::days(30),
            same_site: SameSite::Lax,
        }
    }
}

/// Session cookie names for one app client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieNames {
    client_prefix: String,
}

impl CookieNames {
    /// Hosted-UI cookie names for an app client.
    #[must_use]
    pub fn for_client(client_id: &str) -> Self {
        Self {
            client_prefix: format!("{COOKIE_NAME_PREFIX}.{client_id}"),
        }
    }

    /// Cookie naming the last authenticated user.
    #[must_use]
    pub fn last_auth_user(&self) -> String {
        format!("{}.LastAuthUser", self.client_prefix)
    }

    /// Access token cookie of `user`.
    #[must_use]
    pub fn access_token(&self, user: &str) -> String {
        format!("{}.{user}.accessToken", self.client_prefix)
    }

    /// ID token cookie of `user`.
    #[must_use]
    pub fn id_token(&self, user: &str) -> String {
        format!("{}.{user}.idToken", self.client_prefix)
    }

    /// Refresh token cookie of `user`.
    #[must_use]
    pub fn refresh_token(&self, user: &str) -> String {
        format!("{}.{user}.refreshToken", self.client_prefix)
    }

    fn token_names(&self, user: &str) -> [String; 3] {
        [self.access_token(user), self.id_token(user), self.refresh_token(user)]
    }
}

/// A `Set-Cookie` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    /// Cookie name
    pub name: String,
    /// Cookie value, empty when clearing
    pub value: String,
    /// Absolute expiry
    pub expires: DateTime<Utc>,
    /// Relative expiry in seconds
    pub max_age: i64,
    /// `Path` attribute
    pub path: String,
    /// `Domain` attribute
    pub domain: Option<String>,
    /// `SameSite` attribute
    pub same_site: SameSite,
}

impl SetCookie {
    /// `name=value` as a request would carry it.
    #[must_use]
    pub fn pair(&self) -> String {
        Cookie::new(self.name.as_str(), self.value.as_str())
            .stripped()
            .to_string()
    }

    /// Full `Set-Cookie` header value. `Secure` and `HttpOnly` are always set.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let mut builder = Cookie::build((self.name.as_str(), self.value.as_str()))
            .path(self.path.as_str())
            .max_age(CookieDuration::seconds(self.max_age))
            .secure(true)
            .http_only(true)
            .same_site(self.same_site);
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.as_str());
        }
        if let Ok(expires) = OffsetDateTime::from_unix_timestamp(self.expires.timestamp()) {
            builder = builder.expires(Expiration::DateTime(expires));
        }
        builder.build().to_string()
    }
}

/// Builds the `cookie` request header a browser would send back after
/// receiving these cookies.
#[must_use]
pub fn request_cookie_header(cookies: &[SetCookie]) -> String {
    cookies
        .iter()
        .map(SetCookie::pair)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Splits a `cookie` header into name/value pairs.
///
/// Unparseable pairs and empty values are skipped, surrounding quotes are
/// trimmed, and the first occurrence of a repeated name wins.
fn request_cookies(cookie_header: &str) -> HashMap<String, String> {
    let mut jar = HashMap::new();
    for cookie in Cookie::split_parse(cookie_header).filter_map(Result::ok) {
        let value = cookie.value_trimmed();
        if !value.is_empty() {
            jar.entry(cookie.name().to_string())
                .or_insert_with(|| value.to_string());
        }
    }
    jar
}

/// Reads and writes the session token set.
#[derive(Debug, Clone)]
pub struct CookieCodec {
    names: CookieNames,
    settings: CookieSettings,
}

impl CookieCodec {
    /// Creates a codec.
    #[must_use]
    pub const fn new(names: CookieNames, settings: CookieSettings) -> Self {
        Self { names, settings }
    }

    /// Cookie names in use.
    #[must_use]
    pub const fn names(&self) -> &CookieNames {
        &self.names
    }

    /// The user named by the `LastAuthUser` cookie, if any.
    #[must_use]
    pub fn last_auth_user(&self, cookie_header: &str) -> Option<String> {
        request_cookies(cookie_header).remove(&self.names.last_auth_user())
    }

    /// Extracts the session token set from a `cookie` header.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeAuthError::TokenMissing`] unless `LastAuthUser` and
    /// all three token cookies of that user are present and non-empty.
    pub fn parse(&self, cookie_header: &str) -> Result<SessionTokenSet, EdgeAuthError> {
        let mut jar = request_cookies(cookie_header);
        let user = jar
            .remove(&self.names.last_auth_user())
            .ok_or(EdgeAuthError::TokenMissing)?;
        let mut take = |name: String| jar.remove(&name).ok_or(EdgeAuthError::TokenMissing);

        let access = take(self.names.access_token(&user))?;
        let id = take(self.names.id_token(&user))?;
        let refresh = take(self.names.refresh_token(&user))?;
        Ok(SessionTokenSet::new(user, access, id, refresh))
    }

    /// Cookies writing the token set back to the browser.
    #[must_use]
    pub fn serialize(&self, tokens: &SessionTokenSet, now: DateTime<Utc>) -> Vec<SetCookie> {
        let expires = now + self.settings.max_age;
        let max_age = self.settings.max_age.num_seconds();
        let user = tokens.user();
        [
            (self.names.last_auth_user(), user),
            (self.names.access_token(user), tokens.access_token()),
            (self.names.id_token(user), tokens.id_token()),
            (self.names.refresh_token(user), tokens.refresh_token()),
        ]
        .into_iter()
        .map(|(name, value)| self.cookie(name, value, expires, max_age))
        .collect()
    }

    /// Cookies deleting the session: empty values, expired at the epoch.
    ///
    /// `LastAuthUser` is always cleared; the token cookies only when the
    /// user is known.
    #[must_use]
    pub fn clear(&self, user: Option<&str>) -> Vec<SetCookie> {
        std::iter::once(self.names.last_auth_user())
            .chain(user.into_iter().flat_map(|u| self.names.token_names(u)))
            .map(|name| self.cookie(name, "", DateTime::<Utc>::UNIX_EPOCH, 0))
            .collect()
    }

    fn cookie(&self, name: String, value: &str, expires: DateTime<Utc>, max_age: i64) -> SetCookie {
        SetCookie {
            name,
            value: value.to_string(),
            expires,
            max_age,
            path: self.settings.path.clone(),
            domain: self.settings.domain.clone(),
            same_site: self.settings.same_site,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn codec() -> CookieCodec {
        CookieCodec::new(CookieNames::for_client("abc123"), CookieSettings::default())
    }

    fn header(access: &str, id: &str, refresh: &str) -> String {
        format!(
            "CognitoIdentityServiceProvider.abc123.LastAuthUser=alice; \
             CognitoIdentityServiceProvider.abc123.alice.accessToken={access}; \
             CognitoIdentityServiceProvider.abc123.alice.idToken={id}; \
             CognitoIdentityServiceProvider.abc123.alice.refreshToken={refresh}"
        )
    }

    /// Attributes after the `name=value` pair, sorted.
    fn attributes(header_value: &str) -> Vec<String> {
        let mut attrs: Vec<String> = header_value.split("; ").skip(1).map(str::to_string).collect();
        attrs.sort();
        attrs
    }

    #[test]
    fn test_parse_follows_last_auth_user() {
        let set = codec().parse(&header("a.b.c", "d.e.f", "g.h.i")).unwrap();
        assert_eq!(set.user(), "alice");
        assert_eq!(set.access_token(), "a.b.c");
        assert_eq!(set.id_token(), "d.e.f");
        assert_eq!(set.refresh_token(), "g.h.i");
    }

    #[test]
    fn test_parse_ignores_other_users_tokens() {
        let raw = format!(
            "CognitoIdentityServiceProvider.abc123.bob.idToken=bob-id; {}",
            header("a", "alice-id", "c")
        );
        assert_eq!(codec().parse(&raw).unwrap().id_token(), "alice-id");

        let raw = header("a", "b", "c").replace("LastAuthUser=alice", "LastAuthUser=bob");
        assert!(matches!(codec().parse(&raw), Err(EdgeAuthError::TokenMissing)));
    }

    #[test]
    fn test_parse_skips_malformed_and_foreign_pairs() {
        let raw = format!("garbage; theme=dark; {}", header("a", "b", "c"));
        assert!(codec().parse(&raw).is_ok());
    }

    #[test]
    fn test_parse_trims_quoted_values() {
        let set = codec().parse(&header("\"a.b.c\"", "d.e.f", "g")).unwrap();
        assert_eq!(set.access_token(), "a.b.c");
    }

    #[test]
    fn test_parse_first_occurrence_wins() {
        let raw = format!(
            "{}; CognitoIdentityServiceProvider.abc123.alice.idToken=second",
            header("a", "first", "c")
        );
        assert_eq!(codec().parse(&raw).unwrap().id_token(), "first");
    }

    #[test]
    fn test_parse_missing_or_empty_is_token_missing() {
        assert!(matches!(codec().parse(""), Err(EdgeAuthError::TokenMissing)));
        assert!(matches!(
            codec().parse(&header("a", "", "c")),
            Err(EdgeAuthError::TokenMissing)
        ));
        assert!(matches!(
            codec().parse("CognitoIdentityServiceProvider.abc123.alice.idToken=x"),
            Err(EdgeAuthError::TokenMissing)
        ));
        let no_user = header("a", "b", "c").replace("LastAuthUser=alice", "LastAuthUser=");
        assert!(matches!(codec().parse(&no_user), Err(EdgeAuthError::TokenMissing)));
    }

    #[test]
    fn test_serialize_writes_four_cookies_with_identical_attributes() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let set = SessionTokenSet::new("alice", "a", "b", "c");
        let cookies = codec().serialize(&set, now);

        let names: Vec<&str> = cookies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "CognitoIdentityServiceProvider.abc123.LastAuthUser",
                "CognitoIdentityServiceProvider.abc123.alice.accessToken",
                "CognitoIdentityServiceProvider.abc123.alice.idToken",
                "CognitoIdentityServiceProvider.abc123.alice.refreshToken",
            ]
        );
        assert_eq!(cookies[0].value, "alice");

        let attrs: Vec<Vec<String>> = cookies.iter().map(|c| attributes(&c.to_header_value())).collect();
        assert!(attrs.iter().all(|a| a == &attrs[0]));
        assert_eq!(
            attrs[0],
            vec![
                "Expires=Sun, 31 Mar 2024 12:00:00 GMT",
                "HttpOnly",
                "Max-Age=2592000",
                "Path=/",
                "SameSite=Lax",
                "Secure",
            ]
        );
    }

    #[test]
    fn test_serialized_cookies_parse_back() {
        let set = SessionTokenSet::new("alice", "a.b.c", "d.e.f", "g");
        let written = codec().serialize(&set, Utc::now());
        assert_eq!(codec().parse(&request_cookie_header(&written)).unwrap(), set);
    }

    #[test]
    fn test_clear_expires_every_cookie() {
        let cookies = codec().clear(Some("alice"));
        assert_eq!(cookies.len(), 4);
        for cookie in &cookies {
            assert!(cookie.value.is_empty());
            assert_eq!(cookie.max_age, 0);
            let value = cookie.to_header_value();
            assert!(value.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
            assert!(value.contains("Max-Age=0"));
        }
        assert!(cookies.iter().any(|c| c.name.ends_with(".alice.refreshToken")));

        let without_user = codec().clear(None);
        assert_eq!(without_user.len(), 1);
        assert!(without_user[0].name.ends_with(".LastAuthUser"));
    }

    #[test]
    fn test_domain_attribute_is_written_when_set() {
        let settings = CookieSettings {
            domain: Some("example.com".to_string()),
            same_site: SameSite::Strict,
            ..CookieSettings::default()
        };
        let codec = CookieCodec::new(CookieNames::for_client("abc123"), settings);
        let attrs = attributes(&codec.clear(None)[0].to_header_value());
        assert!(attrs.contains(&"Domain=example.com".to_string()));
        assert!(attrs.contains(&"SameSite=Strict".to_string()));
    }

    #[test]
    fn test_last_auth_user_lookup() {
        assert_eq!(codec().last_auth_user(&header("a", "b", "c")).as_deref(), Some("alice"));
        assert_eq!(codec().last_auth_user("theme=dark"), None);
    }

    #[test]
    fn test_same_site_parsing() {
        assert_eq!(parse_same_site("strict"), Some(SameSite::Strict));
        assert_eq!(parse_same_site("None"), Some(SameSite::None));
        assert_eq!(parse_same_site("sometimes"), None);
    }
}
