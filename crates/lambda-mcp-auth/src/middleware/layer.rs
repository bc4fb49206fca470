//! Tower Layer implementation for authorization

use std::sync::Arc;
use tower::Layer;

use super::{AuthorizationMiddleware, ResourceGuard};
use crate::config::AuthorizationConfig;
use crate::discovery::AuthorizationServerDirectory;
use crate::error::AuthError;
use crate::handler::ServiceHandler;
use crate::jwt::KeySetCache;

/// Tower Layer that puts [`AuthorizationMiddleware`] in front of a service
///
/// Every service produced by one layer shares the same metadata directory
/// and key-set cache.
///
/// # Example
///
/// ```rust,no_run
/// use lambda_mcp_auth::config::AuthorizationConfig;
/// use lambda_mcp_auth::middleware::AuthorizationLayer;
/// use lambda_mcp_auth::request::{ProxyRequest, ProxyResponse};
/// use tower::ServiceBuilder;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let layer = AuthorizationLayer::new(AuthorizationConfig::new(
///     "location-server",
///     vec!["https://auth.example.com".into()],
/// ))?;
///
/// let service = ServiceBuilder::new().layer(layer).service(tower::service_fn(
///     |_req: ProxyRequest| async { Ok::<_, std::convert::Infallible>(ProxyResponse::new(200)) },
/// ));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AuthorizationLayer {
    guard: Option<Arc<ResourceGuard>>,
}

impl AuthorizationLayer {
    /// Layer enforcing `config` with fresh caches
    ///
    /// # Errors
    ///
    /// `AuthError::Internal` if the upstream HTTP client cannot be built.
    pub fn new(config: AuthorizationConfig) -> Result<Self, AuthError> {
        Ok(Self {
            guard: ResourceGuard::build(config)?,
        })
    }

    /// Layer enforcing `config` with existing caches
    pub fn with_caches(
        config: AuthorizationConfig,
        directory: Arc<AuthorizationServerDirectory>,
        key_sets: Arc<KeySetCache>,
    ) -> Self {
        Self {
            guard: ResourceGuard::with_caches(config, directory, key_sets),
        }
    }

    /// Layer that never checks tokens
    pub fn passthrough() -> Self {
        Self { guard: None }
    }
}

impl<S> Layer<S> for AuthorizationLayer {
    type Service = AuthorizationMiddleware<ServiceHandler<S>>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthorizationMiddleware::from_parts(Arc::new(ServiceHandler::new(inner)), self.guard.clone())
    }
}
