//! Structured auth event logging.
//!
//! Every event for one request carries the same `correlation_id`. Only
//! error codes and sanitized messages are logged, never token material.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EdgeAuthError;
use crate::orchestrator::AuthState;

/// Per-request event logger.
#[derive(Debug, Clone, Copy)]
pub struct AuthEventLogger {
    correlation_id: Uuid,
}

impl AuthEventLogger {
    /// Creates a logger for one request.
    #[must_use]
    pub const fn for_request(correlation_id: Uuid) -> Self {
        Self { correlation_id }
    }

    /// Correlation id stamped on every event.
    #[must_use]
    pub const fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Logs a state transition.
    pub fn log_transition(&self, from: AuthState, to: AuthState) {
        debug!(
            correlation_id = %self.correlation_id,
            from = ?from,
            to = ?to,
            "Auth state transition"
        );
    }

    /// Logs a request forwarded to the origin.
    pub fn log_authorized(&self, subject: &str, role: &str, path: &str) {
        info!(
            correlation_id = %self.correlation_id,
            subject = subject,
            role = role,
            path = path,
            event_type = "authorized",
            "Request authorized"
        );
    }

    /// Logs a denial with its error code. The viewer never sees either.
    pub fn log_denied(&self, error: &EdgeAuthError, path: &str) {
        warn!(
            correlation_id = %self.correlation_id,
            error_code = error.code().as_str(),
            path = path,
            clears_session = error.invalidates_session(),
            event_type = "denied",
            "Request denied: {}",
            error.log_message()
        );
    }

    /// Logs a successful session refresh.
    pub fn log_refreshed(&self, subject: &str) {
        info!(
            correlation_id = %self.correlation_id,
            subject = subject,
            event_type = "refreshed",
            "Session refreshed"
        );
    }

    /// Logs a sign-out.
    pub fn log_sign_out(&self) {
        info!(
            correlation_id = %self.correlation_id,
            event_type = "sign_out",
            "Session cleared on sign-out"
        );
    }
}
