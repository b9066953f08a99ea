//! Request-path error taxonomy.
//!
//! Every variant here is recovered by the orchestrator into a `Denied`
//! outcome with a sign-in redirect; none of them ever reaches the client or
//! the origin as a raw error. The variants exist so logs can say precisely
//! which check failed while the response says nothing.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::credentials::ExchangeFailure;
use crate::refresh::RefreshFailure;

/// Sensitive patterns that should be sanitized from logged messages
const SENSITIVE_PATTERNS: &[&str] = &[
    "password",
    "secret",
    "token",
    "key",
    "credential",
    "bearer",
    "authorization",
    "signature=",
    "eyj",
];

/// Pipeline step, used to attribute budget exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    /// Token refresh against the issuer
    Refresh,
    /// Credential exchange against the identity broker
    Exchange,
    /// The whole invocation
    Invocation,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Refresh => "refresh",
            Self::Exchange => "exchange",
            Self::Invocation => "invocation",
        })
    }
}

/// Non-exhaustive error enum for the per-request pipeline.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EdgeAuthError {
    /// No usable session cookies on the request
    #[error("Session token missing from request")]
    TokenMissing,

    /// The ID token is past its expiry (plus the configured skew)
    #[error("Token expired at {expired_at}")]
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
    },

    /// Signature, issuer, audience or structure check failed
    #[error("Token rejected: {reason}")]
    TokenInvalidSignature {
        /// Sanitized description of the failed check
        reason: String,
    },

    /// The refresh token could not be exchanged for a new token set
    #[error("Token refresh failed: {reason}")]
    RefreshFailed {
        /// Why the refresh failed
        reason: RefreshFailure,
    },

    /// The identity broker did not issue credentials for the resolved role
    #[error("Credential exchange failed: {reason}")]
    ExchangeFailed {
        /// Why the exchange failed
        reason: ExchangeFailure,
    },

    /// No role mapping rule matched the identity claims
    #[error("No role mapping rule matched")]
    NoMatchingRole,

    /// The resolved role does not cover the requested path
    #[error("Role {role} may not access {path}")]
    RouteForbidden {
        /// Resolved role name
        role: String,
        /// Normalized request path
        path: String,
    },

    /// The hard per-invocation budget ran out
    #[error("Upstream timeout during {step} after {budget:?}")]
    UpstreamTimeout {
        /// Step that was running when the budget expired
        step: PipelineStep,
        /// Budget that was exceeded
        budget: Duration,
    },

    /// Internal error (details sanitized in logs)
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Stable error codes, used in structured logs only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// `AUTH_TOKEN_MISSING`
    TokenMissing,
    /// `AUTH_TOKEN_EXPIRED`
    TokenExpired,
    /// `AUTH_TOKEN_INVALID_SIGNATURE`
    TokenInvalidSignature,
    /// `AUTH_REFRESH_FAILED`
    RefreshFailed,
    /// `AUTH_EXCHANGE_FAILED`
    ExchangeFailed,
    /// `AUTH_NO_MATCHING_ROLE`
    NoMatchingRole,
    /// `AUTH_ROUTE_FORBIDDEN`
    RouteForbidden,
    /// `UPSTREAM_TIMEOUT`
    UpstreamTimeout,
    /// `INTERNAL_ERROR`
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TokenMissing => "AUTH_TOKEN_MISSING",
            Self::TokenExpired => "AUTH_TOKEN_EXPIRED",
            Self::TokenInvalidSignature => "AUTH_TOKEN_INVALID_SIGNATURE",
            Self::RefreshFailed => "AUTH_REFRESH_FAILED",
            Self::ExchangeFailed => "AUTH_EXCHANGE_FAILED",
            Self::NoMatchingRole => "AUTH_NO_MATCHING_ROLE",
            Self::RouteForbidden => "AUTH_ROUTE_FORBIDDEN",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl EdgeAuthError {
    /// Get the error code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::TokenMissing => ErrorCode::TokenMissing,
            Self::TokenExpired { .. } => ErrorCode::TokenExpired,
            Self::TokenInvalidSignature { .. } => ErrorCode::TokenInvalidSignature,
            Self::RefreshFailed { .. } => ErrorCode::RefreshFailed,
            Self::ExchangeFailed { .. } => ErrorCode::ExchangeFailed,
            Self::NoMatchingRole => ErrorCode::NoMatchingRole,
            Self::RouteForbidden { .. } => ErrorCode::RouteForbidden,
            Self::UpstreamTimeout { .. } => ErrorCode::UpstreamTimeout,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Builds a rejected-token error with a sanitized reason.
    #[must_use]
    pub fn invalid_token(reason: &str) -> Self {
        Self::TokenInvalidSignature {
            reason: sanitize_message(reason),
        }
    }

    /// Whether the session cookies must be cleared when denying with this error.
    ///
    /// A session whose tokens failed verification, or whose refresh token
    /// was refused, can never succeed again; keeping the cookies would only
    /// send the client round the same loop.
    #[must_use]
    pub const fn invalidates_session(&self) -> bool {
        matches!(
            self,
            Self::TokenInvalidSignature { .. } | Self::RefreshFailed { .. }
        )
    }

    /// Message safe to write to logs.
    ///
    /// Dynamic reasons are sanitized when the error is built, so only the
    /// internal variant needs hiding here.
    #[must_use]
    pub fn log_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Sanitize a message by removing sensitive information
#[must_use]
pub fn sanitize_message(message: &str) -> String {
    if contains_sensitive_info(message) {
        return "Credential material withheld".to_string();
    }
    message.to_string()
}

/// Check if a string contains sensitive information
#[must_use]
pub fn contains_sensitive_info(text: &str) -> bool {
    let lower = text.to_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

impl From<jsonwebtoken::errors::Error> for EdgeAuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        let reason = match err.kind() {
            ErrorKind::InvalidSignature => "signature mismatch",
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => "algorithm not allowed",
            ErrorKind::InvalidIssuer => "issuer mismatch",
            ErrorKind::InvalidAudience => "audience mismatch",
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                "malformed"
            }
            ErrorKind::MissingRequiredClaim(_) => "required claim missing",
            _ => "verification failed",
        };
        Self::TokenInvalidSignature {
            reason: reason.to_string(),
        }
    }
}
