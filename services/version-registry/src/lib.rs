//! Version Registry - cross-region function version pointers.
//!
//! Edge functions are published in one region and wired into a
//! distribution by a stack in another. The publishing stage writes a
//! pointer `functionArn:ordinal` under a well-known key; the consuming
//! stage reads it on every deployment run. The [`DeploymentGraph`] makes
//! the "publish before resolve" ordering explicit.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod deployment;
pub mod error;
pub mod pointer;
pub mod registry;
pub mod store;

pub use config::{ConfigError, RegistryConfig};
pub use deployment::{DeploymentGraph, Stage, StageId};
pub use error::RegistryError;
pub use pointer::{FunctionArn, PointerKey, VersionPointerRecord};
pub use registry::{EdgeBinding, EdgeEventType, ResolvedBinding, VersionRegistry};
pub use store::{InMemoryParameterStore, Parameter, ParameterStore};
