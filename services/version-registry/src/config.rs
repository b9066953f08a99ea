//! Registry configuration.
//!
//! The three fixed key segments are read once per deployment run.

use std::env;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Segment would break the key layout
    #[error("Invalid {name} '{value}': only letters, digits, '.', '_' and '-' are allowed")]
    InvalidSegment {
        /// Variable name
        name: &'static str,
        /// Offending value
        value: String,
    },
}

/// Fixed segments of every pointer key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Namespace shared by every stack of the system
    pub namespace_prefix: String,
    /// Deployment environment, e.g. `prod`
    pub environment: String,
    /// Id of the stack that publishes the functions
    pub consumer_id: String,
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

impl RegistryConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSegment`] for an unusable segment.
    pub fn new(
        namespace_prefix: impl Into<String>,
        environment: impl Into<String>,
        consumer_id: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            namespace_prefix: namespace_prefix.into(),
            environment: environment.into(),
            consumer_id: consumer_id.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads `NAMESPACE_PREFIX`, `ENVIRONMENT` and `CONSUMER_ID`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a missing or invalid segment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(&|name| env::var(name).ok())
    }

    /// Loads the segments from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`RegistryConfig::from_env`].
    pub fn from_lookup(vars: Lookup<'_>) -> Result<Self, ConfigError> {
        let required = |name: &str| {
            vars(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingRequired(name.to_string()))
        };
        Self::new(
            required("NAMESPACE_PREFIX")?,
            required("ENVIRONMENT")?,
            required("CONSUMER_ID")?,
        )
    }

    /// Validates every segment.
    ///
    /// # Errors
    ///
    /// Returns the first invalid segment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("NAMESPACE_PREFIX", &self.namespace_prefix),
            ("ENVIRONMENT", &self.environment),
            ("CONSUMER_ID", &self.consumer_id),
        ] {
            if !is_segment(value) {
                return Err(ConfigError::InvalidSegment {
                    name,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Whether `value` can be used as one `/`-separated key segment.
pub(crate) fn is_segment(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}
