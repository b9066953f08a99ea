//! CDN Edge Auth - cookie-session authentication at CDN edge nodes.
//!
//! This crate provides the per-request pipeline that runs in front of the
//! origin: session cookie parsing, ID token validation with a type-state
//! token, refresh against the token issuer, claim-to-role resolution,
//! credential exchange with the identity broker and SigV4 signing of the
//! forwarded request.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod components;
pub mod config;
pub mod cookies;
pub mod credentials;
pub mod edge;
pub mod error;
pub mod jwt;
pub mod normalize;
pub mod observability;
pub mod orchestrator;
pub mod refresh;
pub mod roles;
pub mod session;

pub use components::EdgeAuthComponents;
pub use config::{Config, ConfigError};
pub use cookies::{CookieCodec, CookieNames, CookieSettings, SameSite, SetCookie};
pub use edge::{EdgeRequest, EdgeResponse, Headers};
pub use error::{EdgeAuthError, ErrorCode, PipelineStep};
pub use orchestrator::{AuthState, EdgeAuthOrchestrator, EdgeDecision, PipelineOutcome};
pub use session::SessionTokenSet;
