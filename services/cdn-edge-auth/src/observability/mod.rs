//! Observability Module
//!
//! Structured request logging over `tracing`. Subscriber setup lives in
//! `edge_common::tracing_config`.

pub mod logging;

pub use logging::AuthEventLogger;
