//! Single-attempt token refresh.

use edge_common::CollaboratorError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::refresh::issuer::TokenIssuer;
use crate::session::SessionTokenSet;

/// Why a refresh did not produce a usable token set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshFailure {
    /// The issuer refused the refresh token (revoked, expired, reused)
    Rejected,
    /// The issuer did not answer within the refresh budget
    Timeout,
    /// The issuer could not be reached or failed server-side
    Unavailable,
    /// The issuer answered with something that is not a token set
    Malformed,
    /// The new ID token does not expire later than the one it replaces
    NonMonotonicExpiry,
}

impl fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rejected => "rejected by issuer",
            Self::Timeout => "issuer timed out",
            Self::Unavailable => "issuer unavailable",
            Self::Malformed => "malformed issuer response",
            Self::NonMonotonicExpiry => "expiry did not advance",
        })
    }
}

impl From<&CollaboratorError> for RefreshFailure {
    fn from(err: &CollaboratorError) -> Self {
        match err {
            CollaboratorError::Rejected { .. } => Self::Rejected,
            CollaboratorError::Timeout { .. } => Self::Timeout,
            CollaboratorError::Decode { .. } => Self::Malformed,
            _ => Self::Unavailable,
        }
    }
}

/// Calls the issuer once per expired session.
#[derive(Clone)]
pub struct TokenRefresher {
    issuer: Arc<dyn TokenIssuer>,
    timeout: Duration,
}

impl TokenRefresher {
    /// Creates a refresher bounded by `timeout`.
    #[must_use]
    pub fn new(issuer: Arc<dyn TokenIssuer>, timeout: Duration) -> Self {
        Self { issuer, timeout }
    }

    /// Obtains a new token set to replace `current`.
    ///
    /// Exactly one issuer call, never retried. The new set must expire
    /// strictly later than `current`. When the issuer does not rotate the
    /// refresh token, the current one is carried over.
    ///
    /// # Errors
    ///
    /// Returns the [`RefreshFailure`] describing why no new set was issued.
    pub async fn refresh(&self, current: &SessionTokenSet) -> Result<SessionTokenSet, RefreshFailure> {
        let issued = match tokio::time::timeout(self.timeout, self.issuer.refresh(current.refresh_token())).await {
            Ok(Ok(issued)) => issued,
            Ok(Err(err)) => {
                let failure = RefreshFailure::from(&err);
                warn!(service = err.service(), failure = %failure, "Token refresh failed");
                return Err(failure);
            }
            Err(_) => {
                warn!(budget_ms = self.timeout.as_millis(), "Token refresh timed out");
                return Err(RefreshFailure::Timeout);
            }
        };

        let refresh_token = issued
            .refresh_token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| current.refresh_token().to_string());
        if issued.id_token.is_empty() || issued.access_token.is_empty() {
            return Err(RefreshFailure::Malformed);
        }
        let renewed = SessionTokenSet::new(current.user(), issued.access_token, issued.id_token, refresh_token);

        let Some(new_expiry) = renewed.expires_at() else {
            return Err(RefreshFailure::Malformed);
        };
        if current.expires_at().is_some_and(|old| new_expiry <= old) {
            warn!(new_expiry = %new_expiry, "Refreshed token does not outlive the previous one");
            return Err(RefreshFailure::NonMonotonicExpiry);
        }

        info!(new_expiry = %new_expiry, "Session refreshed");
        Ok(renewed)
    }
}
