//! Error type shared by every external collaborator client.
//!
//! The edge pipeline never retries a collaborator call, so unlike a
//! general-purpose platform error this type carries no retryability
//! classification. Callers map each variant onto their own terminal
//! failure (refresh failed, exchange failed, store error).

use std::time::Duration;
use thiserror::Error;

/// Failure talking to an external collaborator.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CollaboratorError {
    /// Transport-level HTTP failure (connect, TLS, body read)
    #[error("HTTP request to {service} failed: {source}")]
    Http {
        /// Collaborator name
        service: &'static str,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The call did not finish inside its allotted budget
    #[error("{service} did not answer within {budget:?}")]
    Timeout {
        /// Collaborator name
        service: &'static str,
        /// Budget that was exceeded
        budget: Duration,
    },

    /// The collaborator answered and refused the request
    #[error("{service} rejected the request ({status}): {code}")]
    Rejected {
        /// Collaborator name
        service: &'static str,
        /// HTTP status returned
        status: u16,
        /// Error code reported by the collaborator
        code: String,
    },

    /// The collaborator answered with a server-side failure
    #[error("{service} unavailable ({status})")]
    Unavailable {
        /// Collaborator name
        service: &'static str,
        /// HTTP status returned
        status: u16,
    },

    /// The response body could not be decoded
    #[error("{service} returned an undecodable response: {reason}")]
    Decode {
        /// Collaborator name
        service: &'static str,
        /// Decoder message
        reason: String,
    },
}

impl CollaboratorError {
    /// Wraps a reqwest error, folding client-side timeouts into [`Self::Timeout`].
    #[must_use]
    pub fn from_reqwest(service: &'static str, budget: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { service, budget }
        } else if err.is_decode() {
            Self::Decode {
                service,
                reason: err.to_string(),
            }
        } else {
            Self::Http {
                service,
                source: err,
            }
        }
    }

    /// Classifies a non-success HTTP status.
    ///
    /// 4xx answers are definite refusals; anything else is treated as the
    /// collaborator being unavailable.
    #[must_use]
    pub fn from_status(service: &'static str, status: u16, code: impl Into<String>) -> Self {
        if (400..500).contains(&status) {
            Self::Rejected {
                service,
                status,
                code: code.into(),
            }
        } else {
            Self::Unavailable { service, status }
        }
    }

    /// Builds a decode error from a serde failure.
    #[must_use]
    pub fn decode(service: &'static str, err: &serde_json::Error) -> Self {
        Self::Decode {
            service,
            reason: err.to_string(),
        }
    }

    /// Name of the collaborator that failed.
    #[must_use]
    pub const fn service(&self) -> &'static str {
        match self {
            Self::Http { service, .. }
            | Self::Timeout { service, .. }
            | Self::Rejected { service, .. }
            | Self::Unavailable { service, .. }
            | Self::Decode { service, .. } => service,
        }
    }

    /// True when the collaborator definitively refused the request.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// True when the failure was the budget running out.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
