//! Role mapping configuration.
//!
//! A closed document: the roles the edge may assume, the ordered rules
//! that pick one of them from identity claims, the route policy, and an
//! explicit `"default": "deny"`. It is validated once at load time and
//! shared read-only afterwards.
//!
//! ```json
//! {
//!   "roles": [
//!     {"name": "admin", "arn": "arn:aws:iam::123456789012:role/edge-admin", "privilege": 20},
//!     {"name": "user",  "arn": "arn:aws:iam::123456789012:role/edge-user",  "privilege": 10}
//!   ],
//!   "rules": [
//!     {"claim": "cognito:groups", "match": "Contains", "value": "admin.prod", "role": "admin"},
//!     {"claim": "cognito:groups", "match": "Contains", "value": "user.prod",  "role": "user",
//!      "host": "app.example.com", "environment": "prod"}
//!   ],
//!   "routes": [
//!     {"prefix": "/admin", "minimumRole": "admin"},
//!     {"prefix": "/user",  "minimumRole": "user"}
//!   ],
//!   "default": "deny"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Role mapping validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoleMappingError {
    /// The document is not valid JSON for a role mapping
    #[error("Role mapping is not well formed: {0}")]
    Parse(String),

    /// No roles declared
    #[error("Role mapping declares no roles")]
    NoRoles,

    /// A role name is declared twice
    #[error("Role {0} is declared more than once")]
    DuplicateRole(String),

    /// A role ARN is malformed
    #[error("Invalid role ARN '{value}': {reason}")]
    InvalidArn {
        /// Offending value
        value: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// No rules declared
    #[error("Role mapping has no rules")]
    NoRules,

    /// A rule or route refers to a role that is not declared
    #[error("Unknown role '{0}'")]
    UnknownRole(String),

    /// A rule has an empty claim name, value, host or environment
    #[error("Rule {index} has an empty claim name, value or scope")]
    EmptyMatch {
        /// Rule position
        index: usize,
    },

    /// Two rules match the same claim, policy and value
    #[error("Rule {index} duplicates an earlier rule")]
    DuplicateRule {
        /// Rule position
        index: usize,
    },

    /// Fewer than two protected routes
    #[error("Route policy needs at least 2 protected prefixes, found {0}")]
    TooFewRoutes(usize),

    /// A prefix is declared twice
    #[error("Route prefix {0} is declared more than once")]
    DuplicateRoute(String),

    /// A prefix does not start with `/`
    #[error("Route prefix '{0}' must start with '/'")]
    InvalidPrefix(String),
}

/// IAM role ARN: `arn:<partition>:iam::<account>:role/<path/name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleArn {
    raw: String,
    account_start: usize,
}

impl RoleArn {
    /// Account that owns the role.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.raw[self.account_start..self.account_start + 12]
    }

    /// Role name including any path.
    #[must_use]
    pub fn role_name(&self) -> &str {
        &self.raw[self.account_start + 12 + ":role/".len()..]
    }

    /// Full ARN string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for RoleArn {
    type Err = RoleMappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| RoleMappingError::InvalidArn {
            value: s.to_string(),
            reason,
        };

        let parts: Vec<&str> = s.splitn(6, ':').collect();
        let [arn, partition, service, region, account, resource] = parts[..] else {
            return Err(invalid("expected six colon-separated fields"));
        };
        if arn != "arn" || !matches!(partition, "aws" | "aws-cn" | "aws-us-gov") {
            return Err(invalid("unknown partition"));
        }
        if service != "iam" || !region.is_empty() {
            return Err(invalid("not a global IAM resource"));
        }
        if account.len() != 12 || !account.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("account id must be 12 digits"));
        }
        let Some(name) = resource.strip_prefix("role/") else {
            return Err(invalid("resource is not a role"));
        };
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "+=,.@_-/".contains(c))
        {
            return Err(invalid("invalid role name"));
        }

        Ok(Self {
            raw: s.to_string(),
            account_start: arn.len() + partition.len() + service.len() + 4,
        })
    }
}

impl TryFrom<String> for RoleArn {
    type Error = RoleMappingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoleArn> for String {
    fn from(arn: RoleArn) -> Self {
        arn.raw
    }
}

impl fmt::Display for RoleArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A role the edge may assume for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Name used by rules and routes
    pub name: String,
    /// IAM role assumed through the identity broker
    pub arn: RoleArn,
    /// Rank for the route policy; higher covers lower
    pub privilege: u32,
}

/// How a rule compares its value with a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchPolicy {
    /// Element of a multi-valued claim, or substring of a scalar one
    Contains,
    /// The claim has exactly this one value
    Equals,
}

/// One claim-to-role rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMappingRule {
    /// Claim name, e.g. `cognito:groups`
    pub claim: String,
    /// Comparison
    #[serde(rename = "match")]
    pub policy: MatchPolicy,
    /// Value compared against the claim
    pub value: String,
    /// Role granted on match
    pub role: String,
    /// Only applies to requests for this host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Only applies in this deployment environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl RoleMappingRule {
    /// Whether the rule is in scope for a request to `host` served from
    /// `environment`. An unscoped rule applies everywhere; a host-scoped
    /// rule never applies to a request without a `host` header.
    #[must_use]
    pub fn applies_to(&self, host: Option<&str>, environment: &str) -> bool {
        let host_fits = self
            .host
            .as_deref()
            .is_none_or(|scope| host.is_some_and(|h| h.eq_ignore_ascii_case(scope)));
        let environment_fits = self.environment.as_deref().is_none_or(|scope| scope == environment);
        host_fits && environment_fits
    }
}

/// Protected path prefix and the least role allowed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRule {
    /// Path prefix, matched on segment boundaries
    pub prefix: String,
    /// Least privileged role allowed
    pub minimum_role: String,
}

impl RouteRule {
    /// Whether `path` is this prefix or lies beneath it.
    #[must_use]
    pub fn covers(&self, path: &str) -> bool {
        let prefix = self.prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return true;
        }
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

/// What happens when no rule matches. Only denial is expressible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoMatchPolicy {
    /// Fail closed
    #[default]
    Deny,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RoleMappingDocument {
    roles: Vec<Role>,
    rules: Vec<RoleMappingRule>,
    routes: Vec<RouteRule>,
    default: NoMatchPolicy,
}

/// Validated role mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMapping {
    roles: Vec<Role>,
    rules: Vec<RoleMappingRule>,
    routes: Vec<RouteRule>,
    default: NoMatchPolicy,
}

impl RoleMapping {
    /// Validates and builds a mapping.
    ///
    /// # Errors
    ///
    /// Returns the first [`RoleMappingError`] found.
    pub fn new(
        roles: Vec<Role>,
        rules: Vec<RoleMappingRule>,
        routes: Vec<RouteRule>,
    ) -> Result<Self, RoleMappingError> {
        let mapping = Self {
            roles,
            rules,
            routes,
            default: NoMatchPolicy::Deny,
        };
        mapping.validate()?;
        Ok(mapping)
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`RoleMappingError::Parse`] for malformed JSON (including a
    /// missing or non-`deny` default) or the first validation failure.
    pub fn from_json(json: &str) -> Result<Self, RoleMappingError> {
        let doc: RoleMappingDocument =
            serde_json::from_str(json).map_err(|e| RoleMappingError::Parse(e.to_string()))?;
        let mapping = Self {
            roles: doc.roles,
            rules: doc.rules,
            routes: doc.routes,
            default: doc.default,
        };
        mapping.validate()?;
        Ok(mapping)
    }

    fn validate(&self) -> Result<(), RoleMappingError> {
        if self.roles.is_empty() {
            return Err(RoleMappingError::NoRoles);
        }
        let mut names = HashSet::new();
        for role in &self.roles {
            if !names.insert(role.name.as_str()) {
                return Err(RoleMappingError::DuplicateRole(role.name.clone()));
            }
        }

        if self.rules.is_empty() {
            return Err(RoleMappingError::NoRules);
        }
        let mut seen = HashSet::new();
        for (index, rule) in self.rules.iter().enumerate() {
            let empty_scope = [&rule.host, &rule.environment]
                .into_iter()
                .any(|scope| scope.as_deref().is_some_and(|s| s.trim().is_empty()));
            if rule.claim.trim().is_empty() || rule.value.is_empty() || empty_scope {
                return Err(RoleMappingError::EmptyMatch { index });
            }
            if !names.contains(rule.role.as_str()) {
                return Err(RoleMappingError::UnknownRole(rule.role.clone()));
            }
            let host = rule.host.as_deref().map(str::to_ascii_lowercase);
            if !seen.insert((
                rule.claim.as_str(),
                rule.policy,
                rule.value.as_str(),
                host,
                rule.environment.as_deref(),
            )) {
                return Err(RoleMappingError::DuplicateRule { index });
            }
        }

        if self.routes.len() < 2 {
            return Err(RoleMappingError::TooFewRoutes(self.routes.len()));
        }
        let mut prefixes = HashSet::new();
        for route in &self.routes {
            if !route.prefix.starts_with('/') {
                return Err(RoleMappingError::InvalidPrefix(route.prefix.clone()));
            }
            if !prefixes.insert(route.prefix.trim_end_matches('/')) {
                return Err(RoleMappingError::DuplicateRoute(route.prefix.clone()));
            }
            if !names.contains(route.minimum_role.as_str()) {
                return Err(RoleMappingError::UnknownRole(route.minimum_role.clone()));
            }
        }
        Ok(())
    }

    /// Declared roles.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[RoleMappingRule] {
        &self.rules
    }

    /// Protected routes.
    #[must_use]
    pub fn routes(&self) -> &[RouteRule] {
        &self.routes
    }

    /// Behaviour when nothing matches.
    #[must_use]
    pub const fn default_policy(&self) -> NoMatchPolicy {
        self.default
    }

    /// Role by name.
    #[must_use]
    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name)
    }
}
