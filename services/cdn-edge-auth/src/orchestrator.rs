//! Per-request authentication state machine.
//!
//! `handle` runs one viewer request through codec, validator, refresher,
//! resolver, route policy and exchanger, then either forwards a signed
//! request or answers with a sign-in redirect. Every effect is carried in
//! the returned [`PipelineOutcome`]; dropping the future leaves nothing
//! behind.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use crate::components::EdgeAuthComponents;
use crate::config::Config;
use crate::cookies::{CookieCodec, SetCookie};
use crate::credentials::{CredentialExchanger, RequestSigner, TemporaryCredential};
use crate::edge::{EdgeRequest, EdgeResponse};
use crate::error::{EdgeAuthError, ErrorCode, PipelineStep};
use crate::jwt::{IdentityClaims, TokenValidator, ValidationOutcome};
use crate::normalize::{RequestNormalizer, normalize_path};
use crate::observability::AuthEventLogger;
use crate::refresh::TokenRefresher;
use crate::roles::{ClaimRoleResolver, Role};
use crate::session::SessionTokenSet;

/// Authentication state of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthState {
    /// No usable session cookies
    Unauthenticated,
    /// Session cookies parsed
    TokenPresent,
    /// ID token verified and unexpired
    Valid,
    /// ID token verified but expired
    Expired,
    /// ID token failed verification
    Invalid,
    /// Waiting on the token issuer
    Refreshing,
    /// New token set obtained
    Refreshed,
    /// Issuer refused or failed
    RefreshFailed,
    /// Forwarded to the origin
    Authorized,
    /// Redirected to sign-in
    Denied,
}

impl AuthState {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Authorized | Self::Denied)
    }

    /// Whether `self -> next` is an edge of the state machine.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::TokenPresent, Self::Valid | Self::Expired | Self::Invalid)
                | (Self::Expired, Self::Refreshing)
                | (Self::Refreshing, Self::Refreshed | Self::RefreshFailed)
                | (Self::Valid | Self::Refreshed, Self::Authorized | Self::Denied)
                | (
                    Self::Invalid | Self::Unauthenticated | Self::RefreshFailed,
                    Self::Denied
                )
        )
    }
}

/// What the edge does with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeDecision {
    /// Send the signed request to the origin; attach `set_cookies` to its response
    Forward {
        /// Origin-bound request
        request: EdgeRequest,
        /// Refreshed session cookies, empty when nothing changed
        set_cookies: Vec<SetCookie>,
    },
    /// Answer the viewer directly
    Respond(EdgeResponse),
}

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Forward or respond
    pub decision: EdgeDecision,
    /// States visited, in order
    pub transitions: Vec<AuthState>,
    /// Id stamped on every log event of the request
    pub correlation_id: Uuid,
    /// Why the request was denied; logs only
    pub denial: Option<ErrorCode>,
}

impl PipelineOutcome {
    /// Final state, if the state machine ran.
    #[must_use]
    pub fn final_state(&self) -> Option<AuthState> {
        self.transitions.last().copied()
    }
}

/// Per-request context. Never shared across requests.
struct EdgeRequestContext {
    path: String,
    host: Option<String>,
    user: Option<String>,
    state: Option<AuthState>,
    transitions: Vec<AuthState>,
    claims: Option<IdentityClaims>,
    role: Option<Role>,
    set_cookies: Vec<SetCookie>,
    logger: AuthEventLogger,
}

impl EdgeRequestContext {
    const fn new(path: String, host: Option<String>, logger: AuthEventLogger) -> Self {
        Self {
            path,
            host,
            user: None,
            state: None,
            transitions: Vec::new(),
            claims: None,
            role: None,
            set_cookies: Vec::new(),
            logger,
        }
    }

    fn enter(&mut self, next: AuthState) {
        if let Some(current) = self.state {
            debug_assert!(current.can_transition_to(next), "{current:?} -> {next:?}");
            self.logger.log_transition(current, next);
        }
        self.state = Some(next);
        self.transitions.push(next);
    }
}

/// Sequences the pipeline for each viewer request.
pub struct EdgeAuthOrchestrator {
    codec: CookieCodec,
    validator: TokenValidator,
    refresher: TokenRefresher,
    resolver: ClaimRoleResolver,
    exchanger: CredentialExchanger,
    signer: RequestSigner,
    normalizer: RequestNormalizer,
    origin_host: String,
    sign_in_url: Url,
    sign_out_path: String,
    invocation_budget: Duration,
}

impl EdgeAuthOrchestrator {
    /// Wires initialized components with the request-level settings from `config`.
    #[must_use]
    pub fn new(components: EdgeAuthComponents, config: &Config) -> Self {
        Self {
            codec: components.codec,
            validator: components.validator,
            refresher: components.refresher,
            resolver: components.resolver,
            exchanger: components.exchanger,
            signer: components.signer,
            normalizer: components.normalizer,
            origin_host: config.origin_host.clone(),
            sign_in_url: config.sign_in_url.clone(),
            sign_out_path: normalize_path(&config.sign_out_path),
            invocation_budget: config.invocation_budget,
        }
    }

    /// Handles a viewer request at the current time.
    pub async fn handle_request(&self, request: EdgeRequest) -> PipelineOutcome {
        self.handle(request, Utc::now()).await
    }

    /// Handles a viewer request as of `now`.
    #[instrument(skip(self, request, now), fields(method = %request.method, uri = %request.uri))]
    pub async fn handle(&self, request: EdgeRequest, now: DateTime<Utc>) -> PipelineOutcome {
        let correlation_id = Uuid::new_v4();
        let logger = AuthEventLogger::for_request(correlation_id);
        let path = normalize_path(&request.uri);

        if path == self.sign_out_path {
            logger.log_sign_out();
            let response = self
                .normalizer
                .shape_response(self.normalizer.sign_out(&self.codec, &request), &[]);
            return PipelineOutcome {
                decision: EdgeDecision::Respond(response),
                transitions: Vec::new(),
                correlation_id,
                denial: None,
            };
        }

        let mut ctx = EdgeRequestContext::new(path, request.host().map(str::to_string), logger);
        let parsed = request
            .cookie_header()
            .ok_or(EdgeAuthError::TokenMissing)
            .and_then(|header| self.codec.parse(&header));

        let result = match parsed {
            Err(err) => {
                ctx.enter(AuthState::Unauthenticated);
                Err(err)
            }
            Ok(tokens) => {
                ctx.enter(AuthState::TokenPresent);
                ctx.user = Some(tokens.user().to_string());
                tokio::time::timeout(self.invocation_budget, self.authenticate(&mut ctx, &tokens, now))
                    .await
                    .unwrap_or_else(|_| {
                        Err(EdgeAuthError::UpstreamTimeout {
                            step: PipelineStep::Invocation,
                            budget: self.invocation_budget,
                        })
                    })
            }
        };

        match result {
            Ok(credential) => self.authorize(ctx, &request, &credential, now, correlation_id),
            Err(err) => self.deny(ctx, &err, correlation_id),
        }
    }

    /// Shapes an origin response on its way back to the viewer.
    #[must_use]
    pub fn on_response(&self, response: EdgeResponse, pending_cookies: &[SetCookie]) -> EdgeResponse {
        self.normalizer.shape_response(response, pending_cookies)
    }

    async fn authenticate(
        &self,
        ctx: &mut EdgeRequestContext,
        tokens: &SessionTokenSet,
        now: DateTime<Utc>,
    ) -> Result<TemporaryCredential, EdgeAuthError> {
        let (claims, id_token) = match self.validator.validate(tokens.id_token(), now) {
            ValidationOutcome::Valid(claims) => {
                ctx.enter(AuthState::Valid);
                (claims, tokens.id_token().to_string())
            }
            ValidationOutcome::InvalidSignature { reason } => {
                ctx.enter(AuthState::Invalid);
                return Err(EdgeAuthError::TokenInvalidSignature { reason });
            }
            ValidationOutcome::Expired { expired_at } => {
                ctx.enter(AuthState::Expired);
                debug!(expired_at = %expired_at, "ID token expired, refreshing");
                ctx.enter(AuthState::Refreshing);
                let renewed = match self.refresher.refresh(tokens).await {
                    Ok(renewed) => renewed,
                    Err(reason) => {
                        ctx.enter(AuthState::RefreshFailed);
                        return Err(EdgeAuthError::RefreshFailed { reason });
                    }
                };
                ctx.enter(AuthState::Refreshed);

                let claims = match self.validator.validate(renewed.id_token(), now) {
                    ValidationOutcome::Valid(claims) => claims,
                    ValidationOutcome::Expired { expired_at } => {
                        return Err(EdgeAuthError::TokenExpired { expired_at });
                    }
                    ValidationOutcome::InvalidSignature { reason } => {
                        return Err(EdgeAuthError::TokenInvalidSignature { reason });
                    }
                };
                ctx.logger.log_refreshed(&claims.subject);
                ctx.set_cookies = self.codec.serialize(&renewed, now);
                (claims, renewed.id_token().to_string())
            }
        };

        let role = self.resolver.resolve(&claims, ctx.host.as_deref())?.clone();
        ctx.claims = Some(claims);
        self.resolver.authorize_route(&role, &ctx.path)?;

        let credential = self
            .exchanger
            .exchange(&id_token, &role, now)
            .await
            .map_err(|reason| EdgeAuthError::ExchangeFailed { reason })?;
        ctx.role = Some(role);
        Ok(credential)
    }

    fn authorize(
        &self,
        mut ctx: EdgeRequestContext,
        request: &EdgeRequest,
        credential: &TemporaryCredential,
        now: DateTime<Utc>,
        correlation_id: Uuid,
    ) -> PipelineOutcome {
        ctx.enter(AuthState::Authorized);

        let mut forwarded = self.normalizer.forwarded_request(request, &ctx.path);
        self.signer.sign(&mut forwarded, &self.origin_host, credential, now);

        ctx.logger.log_authorized(
            ctx.claims.as_ref().map_or("", |c| c.subject.as_str()),
            ctx.role.as_ref().map_or("", |r| r.name.as_str()),
            &ctx.path,
        );

        PipelineOutcome {
            decision: EdgeDecision::Forward {
                request: forwarded,
                set_cookies: ctx.set_cookies,
            },
            transitions: ctx.transitions,
            correlation_id,
            denial: None,
        }
    }

    fn deny(&self, mut ctx: EdgeRequestContext, err: &EdgeAuthError, correlation_id: Uuid) -> PipelineOutcome {
        // Budget ran out while the issuer call was in flight.
        if ctx.state == Some(AuthState::Refreshing) {
            ctx.enter(AuthState::RefreshFailed);
        }
        ctx.enter(AuthState::Denied);
        ctx.logger.log_denied(err, &ctx.path);

        let cleared = if err.invalidates_session() {
            self.codec.clear(ctx.user.as_deref())
        } else {
            Vec::new()
        };
        let response = self
            .normalizer
            .shape_response(EdgeResponse::redirect(self.sign_in_url.as_str()), &cleared);

        PipelineOutcome {
            decision: EdgeDecision::Respond(response),
            transitions: ctx.transitions,
            correlation_id,
            denial: Some(err.code()),
        }
    }
}
