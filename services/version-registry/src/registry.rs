//! Publish/read protocol for cross-region version pointers.
//!
//! There is no locking: the publishing stage always completes before the
//! consuming stage starts (see [`crate::deployment`]). A read that finds
//! nothing is therefore an ordering error, never something to wait for.
//! Publishes are conditioned on the store version they read, so two
//! publishers racing on one key cannot both claim the same ordinal.

use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::pointer::{FunctionArn, PointerKey, VersionPointerRecord};
use crate::store::ParameterStore;

/// CDN event an edge function is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeEventType {
    /// Before the cache lookup
    ViewerRequest,
    /// On cache miss, before the origin
    OriginRequest,
    /// After the origin answers
    OriginResponse,
    /// Before the response leaves the edge
    ViewerResponse,
}

impl fmt::Display for EdgeEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ViewerRequest => "viewer-request",
            Self::OriginRequest => "origin-request",
            Self::OriginResponse => "origin-response",
            Self::ViewerResponse => "viewer-response",
        })
    }
}

/// A function a distribution needs on one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeBinding {
    /// Event to attach to
    pub event: EdgeEventType,
    /// Logical function name (last key segment)
    pub function_name: String,
}

impl EdgeBinding {
    /// Creates a binding.
    #[must_use]
    pub fn new(event: EdgeEventType, function_name: impl Into<String>) -> Self {
        Self {
            event,
            function_name: function_name.into(),
        }
    }
}

/// A binding with the exact version to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinding {
    /// Event to attach to
    pub event: EdgeEventType,
    /// Published version
    pub record: VersionPointerRecord,
}

/// Version pointer registry over a parameter store.
#[derive(Clone)]
pub struct VersionRegistry {
    store: Arc<dyn ParameterStore>,
    config: RegistryConfig,
}

impl VersionRegistry {
    /// Creates a registry writing under `config`'s key prefix.
    #[must_use]
    pub fn new(store: Arc<dyn ParameterStore>, config: RegistryConfig) -> Self {
        Self { store, config }
    }

    /// Key segments in use.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Parameter key for a function.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidFunctionName`] for an unusable name.
    pub fn key(&self, function_name: &str) -> Result<PointerKey, RegistryError> {
        PointerKey::new(&self.config, function_name)
    }

    /// Stored record with its store version (0 when absent).
    async fn current(&self, key: &PointerKey) -> Result<(Option<VersionPointerRecord>, u64), RegistryError> {
        match self.store.get(key.as_str()).await? {
            Some(param) => Ok((Some(VersionPointerRecord::decode(key, &param.value)?), param.version)),
            None => Ok((None, 0)),
        }
    }

    async fn write(&self, key: &PointerKey, record: &VersionPointerRecord, expected: u64) -> Result<(), RegistryError> {
        match self.store.put_if_version(key.as_str(), &record.encode(), expected).await? {
            Some(version) => {
                info!(key = %key, ordinal = record.ordinal(), store_version = version, "Version pointer published");
                Ok(())
            }
            None => {
                warn!(key = %key, ordinal = record.ordinal(), "Version pointer changed while publishing");
                Err(RegistryError::PublishConflict {
                    key: key.to_string(),
                    expected,
                })
            }
        }
    }

    /// Publishes the next ordinal for a function and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::PublishConflict`] if another publish wrote
    /// the key in the meantime, or another [`RegistryError`] if the
    /// current pointer is unreadable or the store fails.
    #[instrument(skip(self, function_arn), fields(arn = %function_arn))]
    pub async fn publish(&self, function_name: &str, function_arn: &FunctionArn) -> Result<u64, RegistryError> {
        let key = self.key(function_name)?;
        let (current, version) = self.current(&key).await?;
        let next = current.map_or(1, |record| record.ordinal() + 1);
        let record = VersionPointerRecord::new(function_name.to_string(), function_arn.clone(), next);
        self.write(&key, &record, version).await?;
        Ok(next)
    }

    /// Publishes a platform-assigned ordinal, e.g. a function version number.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NonMonotonicOrdinal`] unless `ordinal` is
    /// greater than the one stored, and [`RegistryError::PublishConflict`]
    /// if another publish wrote the key in the meantime.
    #[instrument(skip(self, function_arn), fields(arn = %function_arn))]
    pub async fn publish_version(
        &self,
        function_name: &str,
        function_arn: &FunctionArn,
        ordinal: u64,
    ) -> Result<VersionPointerRecord, RegistryError> {
        let key = self.key(function_name)?;
        let (record, version) = self.current(&key).await?;
        let current = record.map_or(0, |record| record.ordinal());
        if ordinal <= current {
            warn!(key = %key, current = current, attempted = ordinal, "Refusing to move version pointer backwards");
            return Err(RegistryError::NonMonotonicOrdinal {
                function: function_name.to_string(),
                current,
                attempted: ordinal,
            });
        }

        let record = VersionPointerRecord::new(function_name.to_string(), function_arn.clone(), ordinal);
        self.write(&key, &record, version).await?;
        Ok(record)
    }

    /// Reads the latest published version.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::VersionNotPublished`] when nothing was
    /// published under the key.
    #[instrument(skip(self))]
    pub async fn read(&self, function_name: &str) -> Result<VersionPointerRecord, RegistryError> {
        let key = self.key(function_name)?;
        self.current(&key).await?.0.ok_or_else(|| {
            warn!(key = %key, "Version pointer read before publish");
            RegistryError::VersionNotPublished { key: key.to_string() }
        })
    }

    /// Reads the latest version, requiring at least `min_ordinal`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StaleRead`] when an older version is
    /// stored, and [`RegistryError::VersionNotPublished`] when none is.
    pub async fn read_at_least(
        &self,
        function_name: &str,
        min_ordinal: u64,
    ) -> Result<VersionPointerRecord, RegistryError> {
        let record = self.read(function_name).await?;
        if record.ordinal() < min_ordinal {
            return Err(RegistryError::StaleRead {
                key: self.key(function_name)?.to_string(),
                found: record.ordinal(),
                required: min_ordinal,
            });
        }
        Ok(record)
    }

    /// Resolves every binding a distribution needs.
    ///
    /// Stops at the first failure, so nothing is wired from a partial set.
    ///
    /// # Errors
    ///
    /// Returns the first read error.
    pub async fn resolve_bindings(&self, bindings: &[EdgeBinding]) -> Result<Vec<ResolvedBinding>, RegistryError> {
        let mut resolved = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let record = self.read(&binding.function_name).await?;
            resolved.push(ResolvedBinding {
                event: binding.event,
                record,
            });
        }
        info!(count = resolved.len(), "Edge bindings resolved");
        Ok(resolved)
    }
}
