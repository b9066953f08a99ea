//! Claim-to-role mapping.

pub mod mapping;
pub mod resolver;

pub use mapping::{
    MatchPolicy, NoMatchPolicy, Role, RoleArn, RoleMapping, RoleMappingError, RoleMappingRule,
    RouteRule,
};
pub use resolver::{ClaimRoleResolver, rule_matches};
