//! Type-Safe Configuration with Validation
//!
//! Read once at cold start from environment variables (with `.env` support),
//! validated, then shared read-only by every request.

use std::env;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::cookies::{CookieNames, CookieSettings, SameSite, parse_same_site};
use crate::refresh::ClientSecret;
use crate::roles::{RoleMapping, RoleMappingError};

/// Headers forwarded to the origin when `FORWARDED_HEADERS` is unset.
pub const DEFAULT_FORWARDED_HEADERS: &[&str] = &[
    "accept",
    "accept-language",
    "access-control-request-headers",
    "access-control-request-method",
    "origin",
];

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Variable name
        field: String,
        /// Parser message
        reason: String,
    },

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },

    /// Region is not of the `xx-name-N` form
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    /// Account id is not 12 digits
    #[error("Invalid account id: must be 12 digits")]
    InvalidAccountId,

    /// User or identity pool id does not belong to the region
    #[error("Invalid {field}: {value}")]
    InvalidPoolId {
        /// Which pool id
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// Timeout is zero or exceeds the invocation budget
    #[error("Invalid timeout {name}: {reason}")]
    InvalidTimeout {
        /// Variable name
        name: &'static str,
        /// Constraint violated
        reason: &'static str,
    },

    /// Origin host is not a bare host name
    #[error("Invalid origin host: {0}")]
    InvalidOriginHost(String),

    /// Sign-out path does not start with `/`
    #[error("Invalid sign-out path: {0}")]
    InvalidSignOutPath(String),

    /// A role belongs to another account
    #[error("Role {role} belongs to account {account}, not the configured account")]
    ForeignRoleAccount {
        /// Role name
        role: String,
        /// Account in the role ARN
        account: String,
    },

    /// Role mapping failed validation
    #[error(transparent)]
    RoleMapping(#[from] RoleMappingError),

    /// Role mapping file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Collaborator HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Service configuration with validation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Region hosting the user pool and identity pool
    pub aws_region: String,
    /// Account owning the assumable roles
    pub account_id: String,
    /// Deployment environment name
    pub environment: String,
    /// User pool id, `<region>_<id>`
    pub user_pool_id: String,
    /// Identity pool id, `<region>:<uuid>`
    pub identity_pool_id: String,
    /// App client id (ID token audience)
    pub client_id: String,
    /// App client secret, for confidential clients
    pub client_secret: Option<ClientSecret>,
    /// OAuth2 token endpoint used for refresh
    pub token_endpoint: Url,
    /// Identity broker endpoint
    pub identity_broker_url: Url,
    /// Host name of the origin the signed request is addressed to
    pub origin_host: String,
    /// SigV4 region
    pub signing_region: String,
    /// SigV4 service name
    pub signing_service: String,
    /// Where denied viewers are sent
    pub sign_in_url: Url,
    /// Where viewers land after signing out
    pub post_sign_out_url: Url,
    /// Path that triggers sign-out
    pub sign_out_path: String,
    /// Session cookie attributes
    pub cookie_settings: CookieSettings,
    /// Tolerance added to token expiry
    pub clock_skew: Duration,
    /// Budget for the refresh call
    pub refresh_timeout: Duration,
    /// Budget for the whole credential exchange
    pub exchange_timeout: Duration,
    /// Hard limit for one invocation
    pub invocation_budget: Duration,
    /// Request headers forwarded to the origin (lower-case)
    pub forwarded_headers: Vec<String>,
    /// Validated role mapping
    pub role_mapping: Arc<RoleMapping>,
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

impl Config {
    /// Loads configuration from environment variables with validation.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for missing, malformed or inconsistent
    /// settings, including an invalid role mapping.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(&|name| env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(vars: Lookup<'_>) -> Result<Self, ConfigError> {
        let aws_region = required(vars, "AWS_REGION")?;
        let user_pool_id = required(vars, "USER_POOL_ID")?;

        let token_endpoint = match vars("TOKEN_ENDPOINT") {
            Some(_) => parse_url_env(vars, "TOKEN_ENDPOINT", "")?,
            None => {
                let domain = required(vars, "AUTH_DOMAIN")?;
                parse_url_env(vars, "TOKEN_ENDPOINT", &format!("https://{domain}/oauth2/token"))?
            }
        };
        let identity_broker_url = parse_url_env(
            vars,
            "IDENTITY_BROKER_URL",
            &format!("https://cognito-identity.{aws_region}.amazonaws.com/"),
        )?;
        let sign_in_url = parse_url_env(vars, "SIGN_IN_URL", "")?;
        let post_sign_out_url = parse_url_env(vars, "POST_SIGN_OUT_URL", sign_in_url.as_str())?;

        let cookie_settings = CookieSettings {
            path: vars("COOKIE_PATH").unwrap_or_else(|| "/".to_string()),
            domain: vars("COOKIE_DOMAIN").filter(|d| !d.is_empty()),
            max_age: chrono::Duration::seconds(parse_env(vars, "COOKIE_MAX_AGE_SECS", 2_592_000)?),
            same_site: match vars("COOKIE_SAME_SITE") {
                Some(value) => parse_same_site(&value).ok_or_else(|| ConfigError::ParseError {
                    name: "COOKIE_SAME_SITE".to_string(),
                    reason: format!("unknown SameSite value '{value}'"),
                })?,
                None => SameSite::Lax,
            },
        };

        let forwarded_headers = match parse_list_env(vars, "FORWARDED_HEADERS") {
            list if list.is_empty() => DEFAULT_FORWARDED_HEADERS.iter().map(|h| (*h).to_string()).collect(),
            list => list.into_iter().map(|h| h.to_ascii_lowercase()).collect(),
        };

        let role_mapping = match (vars("ROLE_MAPPING_JSON"), vars("ROLE_MAPPING_PATH")) {
            (Some(json), _) => RoleMapping::from_json(&json)?,
            (None, Some(path)) => {
                let json = fs::read_to_string(&path).map_err(|source| ConfigError::Io { path, source })?;
                RoleMapping::from_json(&json)?
            }
            (None, None) => return Err(ConfigError::MissingRequired("ROLE_MAPPING_PATH".to_string())),
        };

        let config = Self {
            signing_region: vars("SIGNING_REGION").unwrap_or_else(|| aws_region.clone()),
            signing_service: vars("SIGNING_SERVICE").unwrap_or_else(|| "execute-api".to_string()),
            account_id: required(vars, "ACCOUNT_ID")?,
            environment: vars("ENVIRONMENT").unwrap_or_else(|| "dev".to_string()),
            identity_pool_id: required(vars, "IDENTITY_POOL_ID")?,
            client_id: required(vars, "CLIENT_ID")?,
            client_secret: vars("CLIENT_SECRET").filter(|s| !s.is_empty()).map(ClientSecret::new),
            origin_host: required(vars, "ORIGIN_DOMAIN")?,
            sign_out_path: vars("SIGN_OUT_PATH").unwrap_or_else(|| "/signout".to_string()),
            clock_skew: Duration::from_secs(parse_env(vars, "TOKEN_CLOCK_SKEW_SECS", 0)?),
            refresh_timeout: Duration::from_millis(parse_env(vars, "REFRESH_TIMEOUT_MS", 2_000)?),
            exchange_timeout: Duration::from_millis(parse_env(vars, "EXCHANGE_TIMEOUT_MS", 2_000)?),
            invocation_budget: Duration::from_millis(parse_env(vars, "INVOCATION_BUDGET_MS", 5_000)?),
            role_mapping: Arc::new(role_mapping),
            aws_region,
            user_pool_id,
            token_endpoint,
            identity_broker_url,
            sign_in_url,
            post_sign_out_url,
            cookie_settings,
            forwarded_headers,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_region(&self.aws_region) {
            return Err(ConfigError::InvalidRegion(self.aws_region.clone()));
        }
        if !is_region(&self.signing_region) {
            return Err(ConfigError::InvalidRegion(self.signing_region.clone()));
        }
        if self.account_id.len() != 12 || !self.account_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::InvalidAccountId);
        }
        let pool_suffix_ok = self
            .user_pool_id
            .strip_prefix(&format!("{}_", self.aws_region))
            .is_some_and(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()));
        if !pool_suffix_ok {
            return Err(ConfigError::InvalidPoolId {
                field: "USER_POOL_ID",
                value: self.user_pool_id.clone(),
            });
        }
        if self
            .identity_pool_id
            .strip_prefix(&format!("{}:", self.aws_region))
            .is_none_or(str::is_empty)
        {
            return Err(ConfigError::InvalidPoolId {
                field: "IDENTITY_POOL_ID",
                value: self.identity_pool_id.clone(),
            });
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired("CLIENT_ID".to_string()));
        }
        if self.origin_host.is_empty() || self.origin_host.contains('/') {
            return Err(ConfigError::InvalidOriginHost(self.origin_host.clone()));
        }
        if !self.sign_out_path.starts_with('/') {
            return Err(ConfigError::InvalidSignOutPath(self.sign_out_path.clone()));
        }
        if self.cookie_settings.max_age <= chrono::Duration::zero() {
            return Err(ConfigError::ParseError {
                name: "COOKIE_MAX_AGE_SECS".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.invocation_budget.is_zero() {
            return Err(ConfigError::InvalidTimeout {
                name: "INVOCATION_BUDGET_MS",
                reason: "must be greater than 0",
            });
        }
        for (name, timeout) in [
            ("REFRESH_TIMEOUT_MS", self.refresh_timeout),
            ("EXCHANGE_TIMEOUT_MS", self.exchange_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidTimeout {
                    name,
                    reason: "must be greater than 0",
                });
            }
            if timeout > self.invocation_budget {
                return Err(ConfigError::InvalidTimeout {
                    name,
                    reason: "exceeds the invocation budget",
                });
            }
        }

        for role in self.role_mapping.roles() {
            if role.arn.account_id() != self.account_id {
                return Err(ConfigError::ForeignRoleAccount {
                    role: role.name.clone(),
                    account: role.arn.account_id().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Expected `iss` of ID tokens.
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("https://{}", self.provider_name())
    }

    /// Login key of the user pool at the identity broker.
    #[must_use]
    pub fn provider_name(&self) -> String {
        format!("cognito-idp.{}.amazonaws.com/{}", self.aws_region, self.user_pool_id)
    }

    /// Session cookie names for the app client.
    #[must_use]
    pub fn cookie_names(&self) -> CookieNames {
        CookieNames::for_client(&self.client_id)
    }

    /// Clock skew as a signed duration.
    #[must_use]
    pub fn clock_skew_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.clock_skew).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

fn is_region(region: &str) -> bool {
    let parts: Vec<&str> = region.split('-').collect();
    parts.len() >= 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()))
        && parts.last().is_some_and(|p| p.bytes().all(|b| b.is_ascii_digit()))
}

/// Read a required environment variable.
fn required(vars: Lookup<'_>, name: &str) -> Result<String, ConfigError> {
    vars(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingRequired(name.to_string()))
}

/// Parse an environment variable with a default value.
fn parse_env<T: std::str::FromStr>(vars: Lookup<'_>, name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match vars(name) {
        Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse a URL environment variable with a default value.
///
/// An empty default makes the variable required.
fn parse_url_env(vars: Lookup<'_>, name: &str, default: &str) -> Result<Url, ConfigError> {
    let url_str = match vars(name) {
        Some(v) => v,
        None if default.is_empty() => return Err(ConfigError::MissingRequired(name.to_string())),
        None => default.to_string(),
    };
    Url::parse(&url_str).map_err(|e| ConfigError::InvalidUrl {
        field: name.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a comma-separated list environment variable.
fn parse_list_env(vars: Lookup<'_>, name: &str) -> Vec<String> {
    vars(name)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
