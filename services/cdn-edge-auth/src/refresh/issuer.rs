//! Token issuer client.
//!
//! Refresh uses the OAuth2 token endpoint of the hosted identity provider:
//! `POST /oauth2/token` with `grant_type=refresh_token`. Confidential app
//! clients authenticate with HTTP Basic.

use async_trait::async_trait;
use edge_common::CollaboratorError;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::instrument;
use url::Url;

const SERVICE: &str = "token-issuer";

/// App client secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSecret(String);

impl ClientSecret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClientSecret([REDACTED])")
    }
}

/// Tokens returned by a successful refresh.
#[derive(Clone, Deserialize)]
pub struct IssuedTokens {
    /// New ID token
    pub id_token: String,
    /// New access token
    pub access_token: String,
    /// Rotated refresh token, when the issuer rotates
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the new tokens in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl fmt::Debug for IssuedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedTokens")
            .field("rotated", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct OAuthError {
    error: String,
}

/// Issues new token sets from a refresh token.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Exchanges a refresh token for new tokens. Called at most once per
    /// request.
    async fn refresh(&self, refresh_token: &str) -> Result<IssuedTokens, CollaboratorError>;
}

/// OAuth2 token endpoint client.
#[derive(Debug, Clone)]
pub struct CognitoTokenEndpoint {
    http: reqwest::Client,
    endpoint: Url,
    client_id: String,
    client_secret: Option<ClientSecret>,
    budget: Duration,
}

impl CognitoTokenEndpoint {
    /// Creates a client for the given token endpoint.
    ///
    /// `budget` is only used to label timeouts; the HTTP client carries the
    /// actual request timeout.
    #[must_use]
    pub const fn new(
        http: reqwest::Client,
        endpoint: Url,
        client_id: String,
        client_secret: Option<ClientSecret>,
        budget: Duration,
    ) -> Self {
        Self {
            http,
            endpoint,
            client_id,
            client_secret,
            budget,
        }
    }
}

#[async_trait]
impl TokenIssuer for CognitoTokenEndpoint {
    #[instrument(skip(self, refresh_token), fields(endpoint = %self.endpoint))]
    async fn refresh(&self, refresh_token: &str) -> Result<IssuedTokens, CollaboratorError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];

        let mut request = self.http.post(self.endpoint.clone()).form(&form);
        if let Some(secret) = &self.client_secret {
            request = request.basic_auth(&self.client_id, Some(secret.expose()));
        }

        let response = request
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, self.budget, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, self.budget, e))?;

        if !status.is_success() {
            let code = serde_json::from_slice::<OAuthError>(&body)
                .map(|e| e.error)
                .unwrap_or_default();
            return Err(CollaboratorError::from_status(SERVICE, status.as_u16(), code));
        }

        serde_json::from_slice(&body).map_err(|e| CollaboratorError::decode(SERVICE, &e))
    }
}
