use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub(crate) const GROUPS_CLAIM: &str = "cognito:groups";
const USERNAME_CLAIM: &str = "cognito:username";
const ROLES_CLAIM: &str = "cognito:roles";
const PREFERRED_ROLE_CLAIM: &str = "cognito:preferred_role";

/// Raw claims as decoded from the ID token payload.
///
/// Issuer and audience are checked by the decoder against the raw JSON and
/// end up in `rest` like every other claim.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub token_use: Option<String>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

/// A claim as seen by role mapping rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimValue {
    /// Scalar claim (strings, numbers and booleans in text form)
    Single(String),
    /// Array claim, order preserved
    Multi(Vec<String>),
}

impl ClaimValue {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Single(s.clone())),
            Value::Number(n) => Some(Self::Single(n.to_string())),
            Value::Bool(b) => Some(Self::Single(b.to_string())),
            Value::Array(items) => Some(Self::Multi(
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect(),
            )),
            Value::Null | Value::Object(_) => None,
        }
    }
}

/// Read-only identity view of a validated ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    /// Subject identifier
    pub subject: String,
    /// Group memberships
    pub groups: BTreeSet<String>,
    /// `cognito:username`
    pub username: Option<String>,
    /// `email`
    pub email: Option<String>,
    /// `cognito:roles`
    pub roles: Vec<String>,
    /// `cognito:preferred_role`
    pub preferred_role: Option<String>,
    /// `token_use`
    pub token_use: String,
    /// Token expiry
    pub expires_at: DateTime<Utc>,
    claims: BTreeMap<String, ClaimValue>,
}

impl IdentityClaims {
    pub(crate) fn from_token(raw: TokenClaims, expires_at: DateTime<Utc>) -> Self {
        let mut claims: BTreeMap<String, ClaimValue> = raw
            .rest
            .iter()
            .filter_map(|(name, value)| ClaimValue::from_json(value).map(|v| (name.clone(), v)))
            .collect();
        claims.insert("sub".to_string(), ClaimValue::Single(raw.sub.clone()));
        claims.insert("exp".to_string(), ClaimValue::Single(raw.exp.to_string()));
        if let Some(token_use) = &raw.token_use {
            claims.insert("token_use".to_string(), ClaimValue::Single(token_use.clone()));
        }

        let single = |name: &str| match claims.get(name) {
            Some(ClaimValue::Single(s)) => Some(s.clone()),
            _ => None,
        };
        let multi = |name: &str| match claims.get(name) {
            Some(ClaimValue::Multi(values)) => values.clone(),
            Some(ClaimValue::Single(s)) => vec![s.clone()],
            None => Vec::new(),
        };

        Self {
            subject: raw.sub,
            groups: multi(GROUPS_CLAIM).into_iter().collect(),
            username: single(USERNAME_CLAIM),
            email: single("email"),
            roles: multi(ROLES_CLAIM),
            preferred_role: single(PREFERRED_ROLE_CLAIM),
            token_use: raw.token_use.unwrap_or_default(),
            expires_at,
            claims,
        }
    }

    /// Value of any claim by name.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&ClaimValue> {
        self.claims.get(name)
    }

    /// Whether the identity belongs to a group.
    #[must_use]
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}
