//! ID token validator.
//!
//! A pure function of (token, now, keys): no I/O, no clock reads.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::error::EdgeAuthError;
use crate::jwt::claims::IdentityClaims;
use crate::jwt::keys::IssuerKeys;
use crate::jwt::token::{Token, Unvalidated};

/// Classified validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Signature and claims check out
    Valid(IdentityClaims),
    /// Genuine token past its expiry
    Expired {
        /// When the token expired
        expired_at: DateTime<Utc>,
    },
    /// Anything else: forged, foreign, malformed or not an ID token
    InvalidSignature {
        /// Sanitized reason, for logs only
        reason: String,
    },
}

/// Validates ID tokens against the issuer's keys.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    keys: Arc<IssuerKeys>,
    issuer: String,
    audience: String,
    clock_skew: Duration,
}

impl TokenValidator {
    /// Creates a validator for one issuer and app client.
    #[must_use]
    pub fn new(
        keys: Arc<IssuerKeys>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        clock_skew: Duration,
    ) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: audience.into(),
            clock_skew,
        }
    }

    /// Validates a raw ID token at the given instant.
    #[must_use]
    pub fn validate(&self, raw: &str, now: DateTime<Utc>) -> ValidationOutcome {
        match self.validate_token(raw, now) {
            Ok(claims) => ValidationOutcome::Valid(claims),
            Err(EdgeAuthError::TokenExpired { expired_at }) => {
                ValidationOutcome::Expired { expired_at }
            }
            Err(EdgeAuthError::TokenInvalidSignature { reason }) => {
                ValidationOutcome::InvalidSignature { reason }
            }
            Err(other) => ValidationOutcome::InvalidSignature {
                reason: other.log_message(),
            },
        }
    }

    fn validate_token(&self, raw: &str, now: DateTime<Utc>) -> Result<IdentityClaims, EdgeAuthError> {
        Token::<Unvalidated>::parse(raw)?
            .verify_signature(&self.keys, &self.issuer, &self.audience)?
            .validate_claims(now, self.clock_skew)?
            .into_identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &[u8] = b"validator-test-secret";
    const ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_Pool";
    const CLIENT: &str = "client-1";

    fn validator(skew: i64) -> TokenValidator {
        let mut keys = IssuerKeys::new();
        keys.insert("k1", DecodingKey::from_secret(SECRET), Algorithm::HS256);
        TokenValidator::new(Arc::new(keys), ISSUER, CLIENT, Duration::seconds(skew))
    }

    fn sign(kid: &str, claims: &serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_string());
        encode(&header, claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn id_claims(exp: i64) -> serde_json::Value {
        json!({
            "sub": "u-1",
            "iss": ISSUER,
            "aud": CLIENT,
            "exp": exp,
            "token_use": "id",
            "cognito:groups": ["admin.prod"]
        })
    }

    fn at(ts: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(ts, 0).unwrap()
    }

    #[test]
    fn test_valid_token() {
        let token = sign("k1", &id_claims(2_000));
        match validator(0).validate(&token, at(1_000)) {
            ValidationOutcome::Valid(claims) => {
                assert_eq!(claims.subject, "u-1");
                assert!(claims.in_group("admin.prod"));
                assert_eq!(claims.expires_at, at(2_000));
            }
            other => panic!("expected valid, got {other:?}"),
        }
    }

    #[test]
    fn test_expiry_boundary_honours_skew() {
        let token = sign("k1", &id_claims(1_000));
        assert!(matches!(validator(0).validate(&token, at(1_000)), ValidationOutcome::Valid(_)));
        assert_eq!(
            validator(0).validate(&token, at(1_001)),
            ValidationOutcome::Expired { expired_at: at(1_000) }
        );
        assert!(matches!(validator(30).validate(&token, at(1_030)), ValidationOutcome::Valid(_)));
        assert!(matches!(
            validator(30).validate(&token, at(1_031)),
            ValidationOutcome::Expired { .. }
        ));
    }

    #[test]
    fn test_wrong_key_is_invalid_even_when_expired() {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("k1".to_string());
        let forged = encode(&header, &id_claims(10), &EncodingKey::from_secret(b"other")).unwrap();
        assert!(matches!(
            validator(0).validate(&forged, at(1_000)),
            ValidationOutcome::InvalidSignature { .. }
        ));
    }

    #[test]
    fn test_unknown_kid_is_invalid() {
        let token = sign("k9", &id_claims(2_000));
        assert_eq!(
            validator(0).validate(&token, at(1_000)),
            ValidationOutcome::InvalidSignature {
                reason: "unknown kid".to_string()
            }
        );
    }

    #[test]
    fn test_wrong_issuer_audience_or_use_is_invalid() {
        let mut foreign_issuer = id_claims(2_000);
        foreign_issuer["iss"] = json!("https://elsewhere");
        let mut foreign_audience = id_claims(2_000);
        foreign_audience["aud"] = json!("other-client");
        let mut access_token = id_claims(2_000);
        access_token["token_use"] = json!("access");

        for claims in [foreign_issuer, foreign_audience, access_token] {
            let token = sign("k1", &claims);
            assert!(matches!(
                validator(0).validate(&token, at(1_000)),
                ValidationOutcome::InvalidSignature { .. }
            ));
        }
    }

    #[test]
    fn test_malformed_token_is_invalid() {
        assert!(matches!(
            validator(0).validate("not.a.jwt", at(0)),
            ValidationOutcome::InvalidSignature { .. }
        ));
        assert!(matches!(
            validator(0).validate("", at(0)),
            ValidationOutcome::InvalidSignature { .. }
        ));
    }

    #[test]
    fn test_validation_is_deterministic() {
        let token = sign("k1", &id_claims(2_000));
        let v = validator(0);
        assert_eq!(v.validate(&token, at(1_500)), v.validate(&token, at(1_500)));
    }
}
