//! Claim-to-role resolution and route authorization.

use std::sync::Arc;

use crate::error::EdgeAuthError;
use crate::jwt::claims::{ClaimValue, IdentityClaims};
use crate::roles::mapping::{MatchPolicy, Role, RoleMapping, RoleMappingRule, RouteRule};

/// Whether a single rule matches the claims.
#[must_use]
pub fn rule_matches(rule: &RoleMappingRule, claims: &IdentityClaims) -> bool {
    match (claims.claim(&rule.claim), rule.policy) {
        (None, _) => false,
        (Some(ClaimValue::Single(value)), MatchPolicy::Equals) => *value == rule.value,
        (Some(ClaimValue::Single(value)), MatchPolicy::Contains) => value.contains(&rule.value),
        (Some(ClaimValue::Multi(values)), MatchPolicy::Equals) => {
            matches!(values.as_slice(), [only] if *only == rule.value)
        }
        (Some(ClaimValue::Multi(values)), MatchPolicy::Contains) => values.contains(&rule.value),
    }
}

/// First-match role resolver over a validated mapping.
#[derive(Debug, Clone)]
pub struct ClaimRoleResolver {
    mapping: Arc<RoleMapping>,
    environment: String,
}

impl ClaimRoleResolver {
    /// Creates a resolver for the deployment `environment`.
    #[must_use]
    pub fn new(mapping: Arc<RoleMapping>, environment: impl Into<String>) -> Self {
        Self {
            mapping,
            environment: environment.into(),
        }
    }

    /// Underlying mapping.
    #[must_use]
    pub fn mapping(&self) -> &RoleMapping {
        &self.mapping
    }

    /// Resolves exactly one role: the target of the first rule that is in
    /// scope for `host` and this environment and matches the claims.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeAuthError::NoMatchingRole`] when no rule matches.
    pub fn resolve(&self, claims: &IdentityClaims, host: Option<&str>) -> Result<&Role, EdgeAuthError> {
        self.mapping
            .rules()
            .iter()
            .filter(|rule| rule.applies_to(host, &self.environment))
            .find(|rule| rule_matches(rule, claims))
            .and_then(|rule| self.mapping.role(&rule.role))
            .ok_or(EdgeAuthError::NoMatchingRole)
    }

    /// Longest protected prefix covering `path`.
    #[must_use]
    pub fn route_for(&self, path: &str) -> Option<&RouteRule> {
        self.mapping
            .routes()
            .iter()
            .filter(|route| route.covers(path))
            .max_by_key(|route| route.prefix.trim_end_matches('/').len())
    }

    /// Checks the role may reach `path`.
    ///
    /// Paths outside every protected prefix are refused.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeAuthError::RouteForbidden`] when the path is not
    /// protected or the role ranks below the route's minimum role.
    pub fn authorize_route(&self, role: &Role, path: &str) -> Result<(), EdgeAuthError> {
        let allowed = self
            .route_for(path)
            .and_then(|route| self.mapping.role(&route.minimum_role))
            .is_some_and(|minimum| role.privilege >= minimum.privilege);

        if allowed {
            Ok(())
        } else {
            Err(EdgeAuthError::RouteForbidden {
                role: role.name.clone(),
                path: path.to_string(),
            })
        }
    }
}
