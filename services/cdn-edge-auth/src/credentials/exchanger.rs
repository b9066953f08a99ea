//! Token-for-credential exchange.

use chrono::{DateTime, Utc};
use edge_common::CollaboratorError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::credentials::broker::IdentityBroker;
use crate::roles::{Role, RoleArn};

/// Why no credential was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeFailure {
    /// The broker refused the token or the role
    Rejected,
    /// The exchange did not finish within its budget
    Timeout,
    /// The broker could not be reached or failed server-side
    Unavailable,
    /// The broker answered with something that is not a credential
    Malformed,
    /// The credential was already expired on arrival
    AlreadyExpired,
}

impl fmt::Display for ExchangeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rejected => "rejected by broker",
            Self::Timeout => "broker timed out",
            Self::Unavailable => "broker unavailable",
            Self::Malformed => "malformed broker response",
            Self::AlreadyExpired => "issued already expired",
        })
    }
}

impl From<&CollaboratorError> for ExchangeFailure {
    fn from(err: &CollaboratorError) -> Self {
        match err {
            CollaboratorError::Rejected { .. } => Self::Rejected,
            CollaboratorError::Timeout { .. } => Self::Timeout,
            CollaboratorError::Decode { .. } => Self::Malformed,
            _ => Self::Unavailable,
        }
    }
}

/// Short-lived credential scoped to exactly one role. Lives for one request.
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryCredential {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: DateTime<Utc>,
    role_arn: RoleArn,
}

impl TemporaryCredential {
    /// Creates a credential.
    #[must_use]
    pub const fn new(
        access_key_id: String,
        secret_access_key: String,
        session_token: String,
        expiration: DateTime<Utc>,
        role_arn: RoleArn,
    ) -> Self {
        Self {
            access_key_id,
            secret_access_key,
            session_token,
            expiration,
            role_arn,
        }
    }

    /// Access key id.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Secret access key.
    #[must_use]
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// Session token.
    #[must_use]
    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    /// Expiry.
    #[must_use]
    pub const fn expiration(&self) -> DateTime<Utc> {
        self.expiration
    }

    /// Role the credential was issued for.
    #[must_use]
    pub const fn role_arn(&self) -> &RoleArn {
        &self.role_arn
    }
}

impl fmt::Debug for TemporaryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryCredential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .field("expiration", &self.expiration)
            .field("role_arn", &self.role_arn.as_str())
            .finish()
    }
}

/// Exchanges validated ID tokens for role credentials.
#[derive(Clone)]
pub struct CredentialExchanger {
    broker: Arc<dyn IdentityBroker>,
    provider_name: String,
    timeout: Duration,
}

impl CredentialExchanger {
    /// Creates an exchanger.
    ///
    /// `provider_name` is the login key the broker knows the issuer by,
    /// `cognito-idp.<region>.amazonaws.com/<userPoolId>`.
    #[must_use]
    pub fn new(broker: Arc<dyn IdentityBroker>, provider_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            broker,
            provider_name: provider_name.into(),
            timeout,
        }
    }

    /// Obtains a credential for exactly `role`.
    ///
    /// Both broker calls share one timeout. There is no fallback role and
    /// no retry.
    ///
    /// # Errors
    ///
    /// Returns the [`ExchangeFailure`] describing why nothing was issued.
    pub async fn exchange(
        &self,
        id_token: &str,
        role: &Role,
        now: DateTime<Utc>,
    ) -> Result<TemporaryCredential, ExchangeFailure> {
        let exchange = async {
            let identity_id = self.broker.get_id(&self.provider_name, id_token).await?;
            self.broker
                .get_credentials_for_identity(&identity_id, &self.provider_name, id_token, &role.arn)
                .await
        };

        let issued = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(issued)) => issued,
            Ok(Err(err)) => {
                let failure = ExchangeFailure::from(&err);
                warn!(service = err.service(), role = %role.name, failure = %failure, "Credential exchange failed");
                return Err(failure);
            }
            Err(_) => {
                warn!(role = %role.name, budget_ms = self.timeout.as_millis(), "Credential exchange timed out");
                return Err(ExchangeFailure::Timeout);
            }
        };

        if issued.expiration <= now {
            warn!(role = %role.name, expiration = %issued.expiration, "Broker issued an expired credential");
            return Err(ExchangeFailure::AlreadyExpired);
        }

        info!(role = %role.name, expiration = %issued.expiration, "Credential issued");
        Ok(TemporaryCredential::new(
            issued.access_key_id,
            issued.secret_key,
            issued.session_token,
            issued.expiration,
            role.arn.clone(),
        ))
    }
}
