//! Type-State ID token with compile-time validation guarantees
//!
//! Identity claims are only reachable on a token that went through both
//! the signature and the claims checks.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, Header, Validation, decode, decode_header};
use std::marker::PhantomData;

use crate::error::EdgeAuthError;
use crate::jwt::claims::{IdentityClaims, TokenClaims};
use crate::jwt::keys::IssuerKeys;

const ID_TOKEN_USE: &str = "id";

// ============================================================================
// Sealed Trait Pattern for Token States
// ============================================================================

mod private {
    /// Sealed trait to prevent external implementations
    pub trait Sealed {}
}

/// Marker trait for token validation states
pub trait TokenState: private::Sealed {
    /// Human-readable state name for debugging
    fn state_name() -> &'static str;
}

/// Header parsed, nothing verified
#[derive(Debug)]
pub struct Unvalidated;
impl private::Sealed for Unvalidated {}
impl TokenState for Unvalidated {
    fn state_name() -> &'static str {
        "Unvalidated"
    }
}

/// Signature, issuer and audience verified
#[derive(Debug)]
pub struct SignatureVerified;
impl private::Sealed for SignatureVerified {}
impl TokenState for SignatureVerified {
    fn state_name() -> &'static str {
        "SignatureVerified"
    }
}

/// Signature and claims verified, not expired
#[derive(Debug)]
pub struct Validated;
impl private::Sealed for Validated {}
impl TokenState for Validated {
    fn state_name() -> &'static str {
        "Validated"
    }
}

// ============================================================================
// Type-State Token Wrapper
// ============================================================================

/// Identity claims as they become available
#[derive(Debug)]
enum Payload {
    None,
    Decoded(TokenClaims),
    Identity(IdentityClaims),
}

/// Type-state token wrapper
#[derive(Debug)]
pub struct Token<'a, State: TokenState> {
    raw: &'a str,
    header: Header,
    payload: Payload,
    _state: PhantomData<State>,
}

impl<'a> Token<'a, Unvalidated> {
    /// Parses the token header.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeAuthError::TokenInvalidSignature`] when the header is
    /// not a JWT header.
    pub fn parse(raw: &'a str) -> Result<Self, EdgeAuthError> {
        let header = decode_header(raw)?;
        Ok(Token {
            raw,
            header,
            payload: Payload::None,
            _state: PhantomData,
        })
    }

    /// Key ID from the header
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// Algorithm from the header
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.header.alg
    }

    /// Verifies the signature with the issuer's key, plus issuer and audience.
    ///
    /// The header algorithm must be the one the key is pinned to. Expiry is
    /// left to [`Token::validate_claims`] so an expired token with a good
    /// signature can still be told apart from a forged one.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeAuthError::TokenInvalidSignature`] for an unknown key
    /// id, a disallowed algorithm, a bad signature, a wrong issuer or
    /// audience, or missing registered claims.
    pub fn verify_signature(
        self,
        keys: &IssuerKeys,
        issuer: &str,
        audience: &str,
    ) -> Result<Token<'a, SignatureVerified>, EdgeAuthError> {
        let kid = self
            .kid()
            .ok_or_else(|| EdgeAuthError::invalid_token("missing kid"))?;
        let (key, pinned) = keys
            .get(kid)
            .ok_or_else(|| EdgeAuthError::invalid_token("unknown kid"))?;
        if pinned != self.header.alg {
            return Err(EdgeAuthError::invalid_token("algorithm not allowed"));
        }

        let mut validation = Validation::new(pinned);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let data = decode::<TokenClaims>(self.raw, key, &validation)?;

        Ok(Token {
            raw: self.raw,
            header: self.header,
            payload: Payload::Decoded(data.claims),
            _state: PhantomData,
        })
    }
}

impl<'a> Token<'a, SignatureVerified> {
    /// Checks token use and expiry.
    ///
    /// The token is expired when `now > exp + clock_skew`.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeAuthError::TokenInvalidSignature`] when the token is
    /// not an ID token, or [`EdgeAuthError::TokenExpired`] when it is past
    /// its expiry.
    pub fn validate_claims(
        self,
        now: DateTime<Utc>,
        clock_skew: Duration,
    ) -> Result<Token<'a, Validated>, EdgeAuthError> {
        let Payload::Decoded(claims) = self.payload else {
            return Err(EdgeAuthError::invalid_token("claims not decoded"));
        };

        if claims.token_use.as_deref() != Some(ID_TOKEN_USE) {
            return Err(EdgeAuthError::invalid_token("use claim is not id"));
        }

        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| EdgeAuthError::invalid_token("exp out of range"))?;
        if now > expires_at + clock_skew {
            return Err(EdgeAuthError::TokenExpired { expired_at: expires_at });
        }

        Ok(Token {
            raw: self.raw,
            header: self.header,
            payload: Payload::Identity(IdentityClaims::from_token(claims, expires_at)),
            _state: PhantomData,
        })
    }
}

impl Token<'_, Validated> {
    /// Identity claims - only available on validated tokens
    ///
    /// # Errors
    ///
    /// Never fails for a token built through the state transitions; the
    /// error arm exists because the payload slot is shared across states.
    pub fn into_identity(self) -> Result<IdentityClaims, EdgeAuthError> {
        match self.payload {
            Payload::Identity(identity) => Ok(identity),
            Payload::None | Payload::Decoded(_) => {
                Err(EdgeAuthError::invalid_token("claims not validated"))
            }
        }
    }

    /// Token header
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }
}

// Common methods for all states
impl<S: TokenState> Token<'_, S> {
    /// Get the current state name
    #[must_use]
    pub fn state_name(&self) -> &'static str {
        S::state_name()
    }
}
