//! Parameter store collaborator.
//!
//! The registry only needs string get/put by name. Values are never
//! deleted and never cached: every read goes to the store. Writes that
//! depend on a previous read go through [`ParameterStore::put_if_version`]
//! so two publishers cannot both win.

use async_trait::async_trait;
use edge_common::CollaboratorError;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

/// A stored value with the store's version number for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Stored value
    pub value: String,
    /// Store version, starting at 1 and bumped on every write
    pub version: u64,
}

/// Named string parameters, readable across regions.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Current value of a parameter, `None` when it was never written.
    async fn get(&self, name: &str) -> Result<Option<Parameter>, CollaboratorError>;

    /// Writes a new value unconditionally, returning the new version.
    async fn put(&self, name: &str, value: &str) -> Result<u64, CollaboratorError>;

    /// Writes only if the stored version is still `expected` (0 for a
    /// parameter that does not exist yet).
    ///
    /// Returns the new version, or `None` when another write got there
    /// first and nothing was written.
    async fn put_if_version(&self, name: &str, value: &str, expected: u64) -> Result<Option<u64>, CollaboratorError>;
}

/// Process-local parameter store.
///
/// Stands in for the regional store in tests and local deployments.
/// Keeps the store's versioning behaviour: each put bumps the version.
#[derive(Debug, Default)]
pub struct InMemoryParameterStore {
    params: RwLock<BTreeMap<String, Parameter>>,
}

impl InMemoryParameterStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.read().len()
    }

    /// Whether nothing was written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.read().is_empty()
    }

    /// Store version of a parameter.
    #[must_use]
    pub fn version(&self, name: &str) -> Option<u64> {
        self.params.read().get(name).map(|p| p.version)
    }
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn get(&self, name: &str) -> Result<Option<Parameter>, CollaboratorError> {
        Ok(self.params.read().get(name).cloned())
    }

    async fn put(&self, name: &str, value: &str) -> Result<u64, CollaboratorError> {
        let mut params = self.params.write();
        let version = params.get(name).map_or(1, |p| p.version + 1);
        params.insert(
            name.to_string(),
            Parameter {
                value: value.to_string(),
                version,
            },
        );
        debug!(name = name, version = version, "Parameter written");
        Ok(version)
    }

    async fn put_if_version(&self, name: &str, value: &str, expected: u64) -> Result<Option<u64>, CollaboratorError> {
        let mut params = self.params.write();
        let stored = params.get(name).map_or(0, |p| p.version);
        if stored != expected {
            debug!(name = name, stored = stored, expected = expected, "Conditional write lost");
            return Ok(None);
        }
        let version = stored + 1;
        params.insert(
            name.to_string(),
            Parameter {
                value: value.to_string(),
                version,
            },
        );
        debug!(name = name, version = version, "Parameter written");
        Ok(Some(version))
    }
}
