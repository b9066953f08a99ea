//! Component registry.
//!
//! Builds the pipeline leaf-first: codec and validator, then refresher,
//! resolver and exchanger, then the signer and normalizer the orchestrator
//! needs to emit a request. Everything is built once per cold start and
//! only read afterwards.

use edge_common::{EdgeHttpConfig, build_http_client};
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, ConfigError};
use crate::cookies::CookieCodec;
use crate::credentials::{CognitoIdentityBroker, CredentialExchanger, IdentityBroker, RequestSigner};
use crate::jwt::{IssuerKeys, TokenValidator};
use crate::normalize::RequestNormalizer;
use crate::orchestrator::EdgeAuthOrchestrator;
use crate::refresh::{CognitoTokenEndpoint, TokenIssuer, TokenRefresher};
use crate::roles::ClaimRoleResolver;

/// Initialized pipeline components.
pub struct EdgeAuthComponents {
    /// Session cookie codec
    pub codec: CookieCodec,
    /// ID token validator
    pub validator: TokenValidator,
    /// Session refresher
    pub refresher: TokenRefresher,
    /// Claim-to-role resolver and route policy
    pub resolver: ClaimRoleResolver,
    /// Token-for-credential exchanger
    pub exchanger: CredentialExchanger,
    /// Origin request signer
    pub signer: RequestSigner,
    /// Path, header and response shaping
    pub normalizer: RequestNormalizer,
}

impl EdgeAuthComponents {
    /// Builds every component from configuration and the given collaborators.
    #[must_use]
    pub fn initialize(
        config: &Config,
        keys: IssuerKeys,
        issuer: Arc<dyn TokenIssuer>,
        broker: Arc<dyn IdentityBroker>,
    ) -> Self {
        let codec = CookieCodec::new(config.cookie_names(), config.cookie_settings.clone());
        let validator = TokenValidator::new(
            Arc::new(keys),
            config.issuer(),
            config.client_id.clone(),
            config.clock_skew_chrono(),
        );

        let refresher = TokenRefresher::new(issuer, config.refresh_timeout);
        let resolver = ClaimRoleResolver::new(Arc::clone(&config.role_mapping), config.environment.clone());
        let exchanger = CredentialExchanger::new(broker, config.provider_name(), config.exchange_timeout);

        let signer = RequestSigner::new(config.signing_region.clone(), config.signing_service.clone());
        let normalizer = RequestNormalizer::new(&config.forwarded_headers, config.post_sign_out_url.clone());

        info!(
            environment = %config.environment,
            roles = config.role_mapping.roles().len(),
            rules = config.role_mapping.rules().len(),
            routes = config.role_mapping.routes().len(),
            "Edge auth components initialized"
        );

        Self {
            codec,
            validator,
            refresher,
            resolver,
            exchanger,
            signer,
            normalizer,
        }
    }

    /// Builds every component with HTTPS clients for the token issuer and
    /// identity broker.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if a client cannot be built.
    pub fn from_config(config: &Config, keys: IssuerKeys) -> Result<Self, ConfigError> {
        let issuer_http = build_http_client(&EdgeHttpConfig::default().bounded_by(config.refresh_timeout))
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        let broker_http = build_http_client(&EdgeHttpConfig::default().bounded_by(config.exchange_timeout))
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let issuer = CognitoTokenEndpoint::new(
            issuer_http,
            config.token_endpoint.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
            config.refresh_timeout,
        );
        let broker = CognitoIdentityBroker::new(
            broker_http,
            config.identity_broker_url.clone(),
            config.identity_pool_id.clone(),
            Some(config.account_id.clone()),
            config.exchange_timeout,
        );

        Ok(Self::initialize(config, keys, Arc::new(issuer), Arc::new(broker)))
    }

    /// Hands the components to the orchestrator.
    #[must_use]
    pub fn into_orchestrator(self, config: &Config) -> EdgeAuthOrchestrator {
        EdgeAuthOrchestrator::new(self, config)
    }
}
