//! Shared fixtures: configuration, signed tokens and fake collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use cdn_edge_auth::credentials::{BrokerCredentials, IdentityBroker};
use cdn_edge_auth::jwt::IssuerKeys;
use cdn_edge_auth::refresh::{IssuedTokens, TokenIssuer};
use cdn_edge_auth::roles::RoleArn;
use cdn_edge_auth::{Config, EdgeAuthComponents, EdgeAuthOrchestrator};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use edge_common::CollaboratorError;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, encode};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const SECRET: &[u8] = b"pipeline-test-secret";
pub const CLIENT_ID: &str = "client-1";
pub const USER: &str = "alice";
pub const USER_POOL_ID: &str = "us-east-1_AbC123";
pub const ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_AbC123";
pub const ORIGIN_HOST: &str = "abc123.execute-api.us-east-1.amazonaws.com";
pub const SIGN_IN_URL: &str = "https://auth.example.com/login";
pub const SIGNED_OUT_URL: &str = "https://www.example.com/";

pub const ROLE_MAPPING: &str = r#"{
    "roles": [
        {"name": "admin", "arn": "arn:aws:iam::123456789012:role/edge-admin", "privilege": 20},
        {"name": "user", "arn": "arn:aws:iam::123456789012:role/edge-user", "privilege": 10}
    ],
    "rules": [
        {"claim": "cognito:groups", "match": "Contains", "value": "admin.prod", "role": "admin"},
        {"claim": "cognito:groups", "match": "Contains", "value": "user.prod", "role": "user"}
    ],
    "routes": [
        {"prefix": "/admin", "minimumRole": "admin"},
        {"prefix": "/user", "minimumRole": "user"}
    ],
    "default": "deny"
}"#;

pub fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub fn vars() -> HashMap<&'static str, String> {
    HashMap::from([
        ("AWS_REGION", "us-east-1".to_string()),
        ("ACCOUNT_ID", "123456789012".to_string()),
        ("USER_POOL_ID", USER_POOL_ID.to_string()),
        ("IDENTITY_POOL_ID", "us-east-1:0b9d4f2e-0000-4000-8000-000000000000".to_string()),
        ("CLIENT_ID", CLIENT_ID.to_string()),
        ("AUTH_DOMAIN", "auth.example.com".to_string()),
        ("ORIGIN_DOMAIN", ORIGIN_HOST.to_string()),
        ("SIGN_IN_URL", SIGN_IN_URL.to_string()),
        ("POST_SIGN_OUT_URL", SIGNED_OUT_URL.to_string()),
        ("ROLE_MAPPING_JSON", ROLE_MAPPING.to_string()),
    ])
}

pub fn config_from(vars: &HashMap<&'static str, String>) -> Config {
    Config::from_lookup(&|name| vars.get(name).cloned()).unwrap()
}

pub fn config() -> Config {
    config_from(&vars())
}

pub fn keys() -> IssuerKeys {
    let mut keys = IssuerKeys::new();
    keys.insert("k1", DecodingKey::from_secret(SECRET), Algorithm::HS256);
    keys
}

fn sign_with(secret: &[u8], groups: &[&str], exp: DateTime<Utc>) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("k1".to_string());
    let claims = serde_json::json!({
        "sub": "user-1",
        "iss": ISSUER,
        "aud": CLIENT_ID,
        "exp": exp.timestamp(),
        "iat": exp.timestamp() - 3600,
        "token_use": "id",
        "cognito:username": "alice",
        "cognito:groups": groups,
    });
    encode(&header, &claims, &EncodingKey::from_secret(secret)).unwrap()
}

/// ID token signed with the test key.
pub fn id_token(groups: &[&str], exp: DateTime<Utc>) -> String {
    sign_with(SECRET, groups, exp)
}

/// ID token signed with a key the issuer never published.
pub fn forged_id_token(groups: &[&str], exp: DateTime<Utc>) -> String {
    sign_with(b"someone-else", groups, exp)
}

pub fn cookie_header(id_token: &str) -> String {
    let names = config().cookie_names();
    format!(
        "theme=dark; {}={USER}; {}=access-1; {}={id_token}; {}=refresh-1",
        names.last_auth_user(),
        names.access_token(USER),
        names.id_token(USER),
        names.refresh_token(USER)
    )
}

pub enum IssuerBehaviour {
    Issue { id_token: String, delay: Duration },
    Reject,
    Hang,
}

pub struct FakeIssuer {
    pub behaviour: IssuerBehaviour,
    pub calls: AtomicUsize,
}

impl FakeIssuer {
    pub fn issuing(id_token: String) -> Arc<Self> {
        Self::with(IssuerBehaviour::Issue {
            id_token,
            delay: Duration::ZERO,
        })
    }

    pub fn with(behaviour: IssuerBehaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for FakeIssuer {
    async fn refresh(&self, _refresh_token: &str) -> Result<IssuedTokens, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            IssuerBehaviour::Issue { id_token, delay } => {
                tokio::time::sleep(*delay).await;
                Ok(IssuedTokens {
                    id_token: id_token.clone(),
                    access_token: "access-2".to_string(),
                    refresh_token: None,
                    expires_in: Some(3600),
                })
            }
            IssuerBehaviour::Reject => Err(CollaboratorError::from_status("token-issuer", 400, "invalid_grant")),
            IssuerBehaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(CollaboratorError::from_status("token-issuer", 503, ""))
            }
        }
    }
}

pub struct FakeBroker {
    pub delay: Duration,
    pub get_id_calls: AtomicUsize,
    pub requested_roles: Mutex<Vec<String>>,
}

impl FakeBroker {
    pub fn new() -> Arc<Self> {
        Self::delayed(Duration::ZERO)
    }

    pub fn delayed(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            get_id_calls: AtomicUsize::new(0),
            requested_roles: Mutex::default(),
        })
    }

    pub fn get_id_calls(&self) -> usize {
        self.get_id_calls.load(Ordering::SeqCst)
    }

    pub fn requested_roles(&self) -> Vec<String> {
        self.requested_roles.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityBroker for FakeBroker {
    async fn get_id(&self, _provider: &str, _id_token: &str) -> Result<String, CollaboratorError> {
        self.get_id_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok("us-east-1:identity-1".to_string())
    }

    async fn get_credentials_for_identity(
        &self,
        _identity_id: &str,
        _provider: &str,
        _id_token: &str,
        role_arn: &RoleArn,
    ) -> Result<BrokerCredentials, CollaboratorError> {
        self.requested_roles.lock().unwrap().push(role_arn.to_string());
        Ok(BrokerCredentials {
            access_key_id: "ASIAEXAMPLE".to_string(),
            secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: "session-token-1".to_string(),
            expiration: now() + ChronoDuration::hours(1),
        })
    }
}

pub fn orchestrator_with(
    config: &Config,
    issuer: Arc<FakeIssuer>,
    broker: Arc<FakeBroker>,
) -> EdgeAuthOrchestrator {
    EdgeAuthComponents::initialize(config, keys(), issuer, broker).into_orchestrator(config)
}
