//! Deployment-time error taxonomy.
//!
//! None of these are retried: a missing or stale pointer means the
//! deployment ran out of order and must be re-sequenced, not repeated.

use edge_common::CollaboratorError;
use thiserror::Error;

/// Registry errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Nothing has been published under the key yet
    #[error("Version not published: {key}")]
    VersionNotPublished {
        /// Parameter key that was read
        key: String,
    },

    /// A pointer exists but is older than required
    #[error("Stale read for {key}: found ordinal {found}, need at least {required}")]
    StaleRead {
        /// Parameter key that was read
        key: String,
        /// Ordinal stored
        found: u64,
        /// Minimum ordinal requested
        required: u64,
    },

    /// The stored value is not `functionArn:ordinal`
    #[error("Malformed pointer at {key}: {reason}")]
    MalformedPointer {
        /// Parameter key that was read
        key: String,
        /// What is wrong with the value
        reason: String,
    },

    /// Not an unqualified function ARN
    #[error("Invalid function ARN '{value}': {reason}")]
    InvalidArn {
        /// Offending value
        value: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// A key segment or function name is unusable
    #[error("Invalid function name '{0}'")]
    InvalidFunctionName(String),

    /// Publishing an ordinal that does not advance the pointer
    #[error("Ordinal {attempted} for {function} does not advance past {current}")]
    NonMonotonicOrdinal {
        /// Function name
        function: String,
        /// Ordinal currently stored (0 when none)
        current: u64,
        /// Ordinal that was rejected
        attempted: u64,
    },

    /// Another publisher wrote the pointer between our read and write
    #[error("Concurrent publish to {key}: store version moved past {expected}")]
    PublishConflict {
        /// Parameter key being published
        key: String,
        /// Store version the write was conditioned on
        expected: u64,
    },

    /// The deployment graph contains a cycle
    #[error("Deployment stages form a cycle: {}", stages.join(" -> "))]
    DependencyCycle {
        /// Stages on or behind the cycle
        stages: Vec<String>,
    },

    /// An edge references a stage that was never added
    #[error("Unknown deployment stage: {0}")]
    UnknownStage(String),

    /// A stage name was added twice
    #[error("Duplicate deployment stage: {0}")]
    DuplicateStage(String),

    /// The parameter store failed
    #[error(transparent)]
    Store(#[from] CollaboratorError),
}

impl RegistryError {
    /// Stable error code for logs.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::VersionNotPublished { .. } => "VERSION_NOT_PUBLISHED",
            Self::StaleRead { .. } => "VERSION_STALE_READ",
            Self::MalformedPointer { .. } => "VERSION_MALFORMED_POINTER",
            Self::InvalidArn { .. } => "VERSION_INVALID_ARN",
            Self::InvalidFunctionName(_) => "VERSION_INVALID_NAME",
            Self::NonMonotonicOrdinal { .. } => "VERSION_NON_MONOTONIC",
            Self::PublishConflict { .. } => "VERSION_PUBLISH_CONFLICT",
            Self::DependencyCycle { .. } => "DEPLOYMENT_CYCLE",
            Self::UnknownStage(_) => "DEPLOYMENT_UNKNOWN_STAGE",
            Self::DuplicateStage(_) => "DEPLOYMENT_DUPLICATE_STAGE",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Whether the deployment must stop here.
    ///
    /// Only a store timeout or outage may be worth running the deployment
    /// again; every ordering or data error is final.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Store(CollaboratorError::Timeout { .. } | CollaboratorError::Unavailable { .. })
        )
    }
}
