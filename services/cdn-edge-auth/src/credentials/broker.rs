//! Identity broker client.
//!
//! Speaks the identity pool JSON 1.1 protocol: `GetId` resolves the
//! federated identity for an ID token, then `GetCredentialsForIdentity`
//! issues temporary credentials for the requested role.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edge_common::CollaboratorError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::instrument;
use url::Url;

use crate::roles::RoleArn;

const SERVICE: &str = "identity-broker";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "AWSCognitoIdentityService";

/// Credentials as issued by the broker.
#[derive(Clone, PartialEq)]
pub struct BrokerCredentials {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_key: String,
    /// Session token
    pub session_token: String,
    /// Expiry
    pub expiration: DateTime<Utc>,
}

impl fmt::Debug for BrokerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// Exchanges identity tokens for temporary credentials.
#[async_trait]
pub trait IdentityBroker: Send + Sync {
    /// Resolves the identity id for a login.
    async fn get_id(&self, provider: &str, id_token: &str) -> Result<String, CollaboratorError>;

    /// Issues credentials for `role_arn` to the identity.
    async fn get_credentials_for_identity(
        &self,
        identity_id: &str,
        provider: &str,
        id_token: &str,
        role_arn: &RoleArn,
    ) -> Result<BrokerCredentials, CollaboratorError>;
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdRequest<'a> {
    identity_pool_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<&'a str>,
    logins: BTreeMap<&'a str, &'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdResponse {
    identity_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsRequest<'a> {
    identity_id: &'a str,
    logins: BTreeMap<&'a str, &'a str>,
    custom_role_arn: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsResponse {
    credentials: WireCredentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireCredentials {
    access_key_id: String,
    secret_key: String,
    session_token: String,
    /// Epoch seconds, possibly fractional
    expiration: f64,
}

#[derive(Deserialize)]
struct BrokerError {
    #[serde(rename = "__type", default)]
    kind: String,
}

/// Identity pool client over HTTPS.
#[derive(Debug, Clone)]
pub struct CognitoIdentityBroker {
    http: reqwest::Client,
    endpoint: Url,
    identity_pool_id: String,
    account_id: Option<String>,
    budget: Duration,
}

impl CognitoIdentityBroker {
    /// Creates a broker client.
    #[must_use]
    pub const fn new(
        http: reqwest::Client,
        endpoint: Url,
        identity_pool_id: String,
        account_id: Option<String>,
        budget: Duration,
    ) -> Self {
        Self {
            http,
            endpoint,
            identity_pool_id,
            account_id,
            budget,
        }
    }

    async fn call<Req: Serialize + Sync, Resp: DeserializeOwned>(
        &self,
        operation: &str,
        body: &Req,
    ) -> Result<Resp, CollaboratorError> {
        let payload = serde_json::to_vec(body).map_err(|e| CollaboratorError::decode(SERVICE, &e))?;
        let response = self
            .http
            .post(self.endpoint.clone())
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .body(payload)
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, self.budget, e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, self.budget, e))?;

        if !status.is_success() {
            let kind = serde_json::from_slice::<BrokerError>(&bytes)
                .map(|e| e.kind.rsplit('#').next().unwrap_or_default().to_string())
                .unwrap_or_default();
            return Err(CollaboratorError::from_status(SERVICE, status.as_u16(), kind));
        }

        serde_json::from_slice(&bytes).map_err(|e| CollaboratorError::decode(SERVICE, &e))
    }
}

#[async_trait]
impl IdentityBroker for CognitoIdentityBroker {
    #[instrument(skip(self, id_token), fields(pool = %self.identity_pool_id))]
    async fn get_id(&self, provider: &str, id_token: &str) -> Result<String, CollaboratorError> {
        let request = GetIdRequest {
            identity_pool_id: &self.identity_pool_id,
            account_id: self.account_id.as_deref(),
            logins: BTreeMap::from([(provider, id_token)]),
        };
        let response: GetIdResponse = self.call("GetId", &request).await?;
        Ok(response.identity_id)
    }

    #[instrument(skip(self, id_token), fields(role = %role_arn))]
    async fn get_credentials_for_identity(
        &self,
        identity_id: &str,
        provider: &str,
        id_token: &str,
        role_arn: &RoleArn,
    ) -> Result<BrokerCredentials, CollaboratorError> {
        let request = GetCredentialsRequest {
            identity_id,
            logins: BTreeMap::from([(provider, id_token)]),
            custom_role_arn: role_arn.as_str(),
        };
        let response: GetCredentialsResponse =
            self.call("GetCredentialsForIdentity", &request).await?;

        let wire = response.credentials;
        #[allow(clippy::cast_possible_truncation)]
        let expiration = DateTime::from_timestamp(wire.expiration.trunc() as i64, 0).ok_or_else(|| {
            CollaboratorError::Decode {
                service: SERVICE,
                reason: "expiration out of range".to_string(),
            }
        })?;

        Ok(BrokerCredentials {
            access_key_id: wire.access_key_id,
            secret_key: wire.secret_key,
            session_token: wire.session_token,
            expiration,
        })
    }
}
