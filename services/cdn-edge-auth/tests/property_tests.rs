//! Property-based tests for the edge auth pipeline.
//!
//! Property 1: Cookie Round Trip Stability
//! Property 2: Path Normalization Idempotence
//! Property 3: Role Resolution Determinism
//! Property 4: Monotonic Refresh Expiry

mod common;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use cdn_edge_auth::cookies::request_cookie_header;
use cdn_edge_auth::jwt::{TokenValidator, ValidationOutcome};
use cdn_edge_auth::normalize::normalize_path;
use cdn_edge_auth::refresh::{IssuedTokens, RefreshFailure, TokenIssuer, TokenRefresher};
use cdn_edge_auth::roles::ClaimRoleResolver;
use cdn_edge_auth::{CookieCodec, CookieNames, CookieSettings, SessionTokenSet};
use chrono::Duration as ChronoDuration;
use edge_common::CollaboratorError;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// Generate cookie-safe token strings.
fn arb_token() -> impl Strategy<Value = String> {
    "[A-Za-z0-9._~-]{1,96}"
}

/// Generate request paths, trailing slashes included.
fn arb_path() -> impl Strategy<Value = String> {
    "(/[a-z0-9-]{0,8}){0,4}/{0,3}"
}

/// Generate group memberships from a small pool.
fn arb_groups() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop::sample::select(vec!["admin.prod", "user.prod", "guest.prod", "admin.dev"]),
        0..4,
    )
    .prop_map(|groups| groups.into_iter().map(str::to_string).collect())
}

fn unsigned_token(exp: i64) -> String {
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#),
        URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#))
    )
}

struct FixedIssuer {
    exp: i64,
}

#[async_trait]
impl TokenIssuer for FixedIssuer {
    async fn refresh(&self, _refresh_token: &str) -> Result<IssuedTokens, CollaboratorError> {
        Ok(IssuedTokens {
            id_token: unsigned_token(self.exp),
            access_token: "access".to_string(),
            refresh_token: None,
            expires_in: None,
        })
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1: Cookie Round Trip Stability
    ///
    /// Serializing, reading the cookies back and serializing again yields
    /// the same cookies.
    #[test]
    fn prop_cookie_round_trip(
        access in arb_token(),
        id in arb_token(),
        refresh in arb_token(),
        client in "[a-z0-9]{1,26}",
        user in "[A-Za-z0-9_-]{1,16}",
    ) {
        let codec = CookieCodec::new(CookieNames::for_client(&client), CookieSettings::default());
        let tokens = SessionTokenSet::new(user, access, id, refresh);

        let written = codec.serialize(&tokens, common::now());
        let parsed = codec.parse(&request_cookie_header(&written)).unwrap();
        prop_assert_eq!(&parsed, &tokens);
        prop_assert_eq!(codec.serialize(&parsed, common::now()), written);
    }

    /// Property 2: Path Normalization Idempotence
    #[test]
    fn prop_normalize_path_idempotent(path in arb_path()) {
        let once = normalize_path(&path);
        prop_assert_eq!(normalize_path(&once), once.clone());
        prop_assert!(once == "/" || !once.ends_with('/'));
        prop_assert!(once.starts_with('/'));
    }

    /// Property 3: Role Resolution Determinism
    ///
    /// The same claims always resolve to the same role, and the first
    /// matching rule decides.
    #[test]
    fn prop_resolution_is_deterministic(groups in arb_groups()) {
        let config = common::config();
        let validator = TokenValidator::new(
            Arc::new(common::keys()),
            common::ISSUER,
            common::CLIENT_ID,
            ChronoDuration::zero(),
        );
        let group_refs: Vec<&str> = groups.iter().map(String::as_str).collect();
        let token = common::id_token(&group_refs, common::now() + ChronoDuration::hours(1));
        let ValidationOutcome::Valid(claims) = validator.validate(&token, common::now()) else {
            return Err(TestCaseError::fail("fixture token did not validate"));
        };

        let resolver = ClaimRoleResolver::new(Arc::clone(&config.role_mapping), config.environment.clone());
        let first = resolver.resolve(&claims, Some("www.example.com")).ok().map(|r| r.name.clone());
        let second = resolver.resolve(&claims, Some("www.example.com")).ok().map(|r| r.name.clone());
        prop_assert_eq!(&first, &second);

        let expected = if groups.iter().any(|g| g == "admin.prod") {
            Some("admin".to_string())
        } else if groups.iter().any(|g| g == "user.prod") {
            Some("user".to_string())
        } else {
            None
        };
        prop_assert_eq!(first, expected);
    }

    /// Property 4: Monotonic Refresh Expiry
    ///
    /// A refresh only succeeds with a strictly later expiry.
    #[test]
    fn prop_refresh_expiry_is_monotonic(
        old_exp in 1_600_000_000i64..1_800_000_000,
        delta in -7_200i64..7_200,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let current = SessionTokenSet::new("alice", "a", unsigned_token(old_exp), "r");
        let refresher = TokenRefresher::new(
            Arc::new(FixedIssuer { exp: old_exp + delta }),
            Duration::from_secs(1),
        );

        let result = rt.block_on(refresher.refresh(&current));
        if delta > 0 {
            let renewed = result.unwrap();
            prop_assert!(renewed.expires_at().unwrap() > current.expires_at().unwrap());
            prop_assert_eq!(renewed.refresh_token(), "r");
        } else {
            prop_assert_eq!(result.unwrap_err(), RefreshFailure::NonMonotonicExpiry);
        }
    }
}
