//! HTTP client construction for collaborator calls made from the edge.
//!
//! Edge invocations have a hard per-invocation limit, so the client is built
//! with a request timeout that never exceeds the step budget it serves and a
//! short connect timeout. Idle pooling is kept small: edge runtimes are
//! short-lived and rarely reuse more than a couple of connections.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// HTTP client configuration for edge collaborators.
#[derive(Debug, Clone)]
pub struct EdgeHttpConfig {
    /// Upper bound for a whole request (default: 3s)
    pub request_timeout: Duration,
    /// Upper bound for establishing a connection (default: 1s)
    pub connect_timeout: Duration,
    /// Maximum idle connections per host (default: 2)
    pub pool_max_idle_per_host: usize,
    /// User agent string
    pub user_agent: String,
}

impl Default for EdgeHttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(1),
            pool_max_idle_per_host: 2,
            user_agent: "cdn-edge-auth/0.1".to_string(),
        }
    }
}

impl EdgeHttpConfig {
    /// Caps the request timeout at the given step budget.
    ///
    /// The connect timeout is lowered too when it would exceed the budget.
    #[must_use]
    pub fn bounded_by(mut self, budget: Duration) -> Self {
        self.request_timeout = self.request_timeout.min(budget);
        self.connect_timeout = self.connect_timeout.min(budget);
        self
    }

    /// Sets a custom user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns an error if the client cannot be built (e.g., TLS initialization fails).
pub fn build_http_client(config: &EdgeHttpConfig) -> Result<Client, reqwest::Error> {
    ClientBuilder::new()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .use_rustls_tls()
        .build()
}
