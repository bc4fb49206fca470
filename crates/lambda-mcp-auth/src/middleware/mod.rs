//! Authorization middleware
//!
//! [`AuthorizationMiddleware`] wraps a [`Handler`] and walks each request
//! through one of these outcomes:
//!
//! | Request | Response |
//! |---------|----------|
//! | metadata path | 200, protected-resource metadata |
//! | `/.well-known/client-registration-info` | 200, registration capability |
//! | no bearer token | 401 `invalid_request` |
//! | expired token | 401 `invalid_token` |
//! | other invalid token | 401 `invalid_token` |
//! | missing scope | 403 `insufficient_scope` |
//! | valid token | wrapped handler's response, unchanged |
//! | handler error or panic | 500 `server_error` |
//!
//! When authorization is disabled the handler is called for every request
//! with no checks at all.
//!
//! With the `tower` feature, [`AuthorizationLayer`] and the
//! `tower::Service` impl let the middleware sit in a `ServiceBuilder` stack.

#[cfg(feature = "tower")]
mod layer;
#[cfg(feature = "tower")]
mod service;

#[cfg(feature = "tower")]
pub use layer::AuthorizationLayer;

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use tokio::runtime::Runtime;
use tracing::{Level, debug, error, info, warn};

use crate::config::{AuthorizationConfig, ConfigSource};
use crate::discovery::AuthorizationServerDirectory;
use crate::error::AuthError;
use crate::handler::Handler;
use crate::http_client::{DEFAULT_USER_AGENT, build_client};
use crate::jwt::{KeySetCache, TokenValidator};
use crate::redact::{DEFAULT_MAX_LOG_SIZE, safe_error_message, safe_request_view};
use crate::request::{ProxyRequest, ProxyResponse, TOKEN_CLAIMS_KEY};
use crate::server::{ResourceMetadataPublisher, server_error_response};

/// Path serving the registration capability of the configured servers
pub const CLIENT_REGISTRATION_INFO_PATH: &str = "/.well-known/client-registration-info";

/// Everything needed to enforce one configuration
#[derive(Debug)]
pub(crate) struct ResourceGuard {
    config: Arc<AuthorizationConfig>,
    metadata_path: String,
    publisher: ResourceMetadataPublisher,
    validator: TokenValidator,
    directory: Arc<AuthorizationServerDirectory>,
}

impl ResourceGuard {
    /// `None` when `config` disables authorization
    pub(crate) fn with_caches(
        config: AuthorizationConfig,
        directory: Arc<AuthorizationServerDirectory>,
        key_sets: Arc<KeySetCache>,
    ) -> Option<Arc<Self>> {
        if !config.enable_authorization {
            info!(resource = %config.resource_id, "Authorization disabled; requests pass through unchecked");
            return None;
        }

        let config = Arc::new(config);
        let validator = TokenValidator::new(&config, Arc::clone(&directory), key_sets);
        Some(Arc::new(Self {
            metadata_path: config.metadata_path(),
            publisher: ResourceMetadataPublisher::new(Arc::clone(&config)),
            config,
            validator,
            directory,
        }))
    }

    /// Guard with fresh caches sharing one HTTP client
    pub(crate) fn build(config: AuthorizationConfig) -> Result<Option<Arc<Self>>, AuthError> {
        let client = build_client(DEFAULT_USER_AGENT)
            .map_err(|e| AuthError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_caches(
            config,
            Arc::new(AuthorizationServerDirectory::new(client.clone())),
            Arc::new(KeySetCache::new(client)),
        ))
    }
}

/// Bearer-token enforcement around a [`Handler`]
///
/// Clones share the handler and both caches.
///
/// ```rust,no_run
/// use lambda_mcp_auth::config::AuthorizationConfig;
/// use lambda_mcp_auth::handler::sync_handler_fn;
/// use lambda_mcp_auth::middleware::AuthorizationMiddleware;
/// use lambda_mcp_auth::request::{ProxyRequest, ProxyResponse};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AuthorizationConfig::new("location-server", vec!["https://auth.example.com".into()])
///     .with_required_scopes(vec!["location:read".into()]);
///
/// let middleware = AuthorizationMiddleware::new(
///     config,
///     sync_handler_fn(|_req| Ok(ProxyResponse::new(200))),
/// )?;
///
/// let response = middleware
///     .handle(ProxyRequest::new("GET", "/mcp").with_header("Authorization", "Bearer eyJ..."))
///     .await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AuthorizationMiddleware<H> {
    handler: Arc<H>,
    guard: Option<Arc<ResourceGuard>>,
}

impl<H> Clone for AuthorizationMiddleware<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            guard: self.guard.clone(),
        }
    }
}

impl<H> AuthorizationMiddleware<H> {
    pub(crate) fn from_parts(handler: Arc<H>, guard: Option<Arc<ResourceGuard>>) -> Self {
        Self { handler, guard }
    }
}

impl<H: Handler> AuthorizationMiddleware<H> {
    /// Enforce `config` in front of `handler`
    ///
    /// # Errors
    ///
    /// `AuthError::Internal` if the upstream HTTP client cannot be built.
    pub fn new(config: AuthorizationConfig, handler: H) -> Result<Self, AuthError> {
        Ok(Self::from_parts(Arc::new(handler), ResourceGuard::build(config)?))
    }

    /// Like [`new`](Self::new) but reusing existing caches
    pub fn with_caches(
        config: AuthorizationConfig,
        handler: H,
        directory: Arc<AuthorizationServerDirectory>,
        key_sets: Arc<KeySetCache>,
    ) -> Self {
        Self::from_parts(
            Arc::new(handler),
            ResourceGuard::with_caches(config, directory, key_sets),
        )
    }

    /// Call `handler` for every request without any checks
    pub fn passthrough(handler: H) -> Self {
        Self::from_parts(Arc::new(handler), None)
    }

    /// Load configuration once from `source`
    ///
    /// An absent or unloadable configuration is not fatal: it is logged and
    /// the handler runs unauthenticated.
    ///
    /// # Errors
    ///
    /// `AuthError::Internal` if the upstream HTTP client cannot be built.
    pub async fn from_config_source<S>(source: &S, key: &str, handler: H) -> Result<Self, AuthError>
    where
        S: ConfigSource + ?Sized,
    {
        match source.load(key).await {
            Ok(Some(config)) => Self::new(config, handler),
            Ok(None) => {
                warn!(key = %key, "No authorization config found; running without authorization");
                Ok(Self::passthrough(handler))
            }
            Err(e) => {
                warn!(
                    key = %key,
                    error = %safe_error_message("ConfigError", &e.to_string()),
                    "Failed to load authorization config; running without authorization"
                );
                Ok(Self::passthrough(handler))
            }
        }
    }

    /// Whether tokens are checked
    pub fn is_enforcing(&self) -> bool {
        self.guard.is_some()
    }

    /// The wrapped handler
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Handle one request; every failure is already a response
    pub async fn handle(&self, mut request: ProxyRequest) -> ProxyResponse {
        // Claims only ever come from validation.
        request.token_claims = None;
        request.extra.remove(TOKEN_CLAIMS_KEY);

        if tracing::enabled!(Level::DEBUG) {
            debug!(
                request = %safe_request_view(&request, DEFAULT_MAX_LOG_SIZE),
                "Handling request"
            );
        }

        match AssertUnwindSafe(self.dispatch(request)).catch_unwind().await {
            Ok(response) => response,
            Err(_) => {
                error!("Request handling panicked");
                server_error_response()
            }
        }
    }

    /// [`handle`](Self::handle) for synchronous callers
    ///
    /// Runs on a process-wide current-thread runtime, built on first use,
    /// so it must not be called from inside an async context.
    pub fn handle_blocking(&self, request: ProxyRequest) -> ProxyResponse {
        match blocking_runtime() {
            Ok(runtime) => runtime.block_on(self.handle(request)),
            Err(e) => {
                error!(error = %e, "Failed to start runtime");
                server_error_response()
            }
        }
    }

    async fn dispatch(&self, mut request: ProxyRequest) -> ProxyResponse {
        let Some(guard) = self.guard.as_deref() else {
            return self.invoke(request).await;
        };

        if request.path == guard.metadata_path {
            debug!(path = %request.path, "Serving protected resource metadata");
            return guard.publisher.metadata_response();
        }

        if request.path == CLIENT_REGISTRATION_INFO_PATH {
            debug!("Serving client registration info");
            let capability = guard
                .directory
                .list_registration_capable_servers(&guard.config.authorization_servers)
                .await;
            return match serde_json::to_value(&capability) {
                Ok(body) => ProxyResponse::json(200, &body),
                Err(_) => server_error_response(),
            };
        }

        let Some(token) = request.bearer_token() else {
            debug!(path = %request.path, "Request has no access token");
            return guard.publisher.auth_error_response(&AuthError::missing_token());
        };

        match guard.validator.validate(token).await {
            Ok(claims) => {
                request.token_claims = Some(claims);
                self.invoke(request).await
            }
            Err(e) if e.is_client_error() => {
                info!(
                    path = %request.path,
                    status = e.status_code(),
                    error = %e,
                    "Request rejected"
                );
                guard.publisher.auth_error_response(&e)
            }
            Err(e) => {
                error!(
                    error = %safe_error_message("AuthError", &e.to_string()),
                    "Authorization failed unexpectedly"
                );
                guard.publisher.auth_error_response(&e)
            }
        }
    }

    async fn invoke(&self, request: ProxyRequest) -> ProxyResponse {
        match self.handler.call(request).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    error = %safe_error_message("HandlerError", &e.to_string()),
                    "Handler failed"
                );
                server_error_response()
            }
        }
    }
}

fn blocking_runtime() -> std::io::Result<&'static Runtime> {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(RUNTIME.get_or_init(|| runtime))
}
