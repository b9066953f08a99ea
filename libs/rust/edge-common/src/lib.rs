//! Shared library for cross-cutting concerns in the CDN edge auth services.
//!
//! This crate provides centralized implementations for:
//! - The error type returned by external collaborators (token issuer,
//!   identity broker, parameter store)
//! - HTTP client construction bounded by edge latency budgets
//! - Structured tracing initialisation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod tracing_config;

pub use error::CollaboratorError;
pub use http::{EdgeHttpConfig, build_http_client};
pub use tracing_config::{TracingConfig, init_tracing};
