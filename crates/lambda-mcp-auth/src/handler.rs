//! The wrapped request handler
//!
//! A [`Handler`] turns a [`ProxyRequest`] into a [`ProxyResponse`]. Whether
//! it awaits anything is its own business; the middleware always awaits it.
//!
//! ```rust
//! use lambda_mcp_auth::handler::{handler_fn, sync_handler_fn, HandlerError};
//! use lambda_mcp_auth::request::{ProxyRequest, ProxyResponse};
//!
//! let async_handler = handler_fn(|_req: ProxyRequest| async {
//!     Ok::<_, HandlerError>(ProxyResponse::new(204))
//! });
//! let blocking_handler = sync_handler_fn(|_req: ProxyRequest| Ok(ProxyResponse::new(204)));
//! ```

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::request::{ProxyRequest, ProxyResponse};

/// Failure raised by a handler; always answered with a generic 500
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Request handler capability
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle one request
    ///
    /// # Errors
    ///
    /// Any error is reported to the client as `server_error`.
    async fn call(&self, request: ProxyRequest) -> Result<ProxyResponse, HandlerError>;
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn call(&self, request: ProxyRequest) -> Result<ProxyResponse, HandlerError> {
        (**self).call(request).await
    }
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Box<H> {
    async fn call(&self, request: ProxyRequest) -> Result<ProxyResponse, HandlerError> {
        (**self).call(request).await
    }
}

/// Handler from an async closure
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(ProxyRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProxyResponse, HandlerError>> + Send,
{
    HandlerFn { f }
}

/// See [`handler_fn`]
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> std::fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(ProxyRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProxyResponse, HandlerError>> + Send,
{
    async fn call(&self, request: ProxyRequest) -> Result<ProxyResponse, HandlerError> {
        (self.f)(request).await
    }
}

/// Handler from a plain, non-suspending closure
pub fn sync_handler_fn<F>(f: F) -> SyncHandlerFn<F>
where
    F: Fn(ProxyRequest) -> Result<ProxyResponse, HandlerError> + Send + Sync,
{
    SyncHandlerFn { f }
}

/// See [`sync_handler_fn`]
#[derive(Clone)]
pub struct SyncHandlerFn<F> {
    f: F,
}

impl<F> std::fmt::Debug for SyncHandlerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHandlerFn").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Handler for SyncHandlerFn<F>
where
    F: Fn(ProxyRequest) -> Result<ProxyResponse, HandlerError> + Send + Sync,
{
    async fn call(&self, request: ProxyRequest) -> Result<ProxyResponse, HandlerError> {
        (self.f)(request)
    }
}

/// Adapts a `tower::Service` into a [`Handler`]
#[cfg(feature = "tower")]
#[derive(Debug, Clone)]
pub struct ServiceHandler<S> {
    service: S,
}

#[cfg(feature = "tower")]
impl<S> ServiceHandler<S> {
    /// Wrap a `tower` service
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Unwrap the service
    pub fn into_inner(self) -> S {
        self.service
    }
}

#[cfg(feature = "tower")]
#[async_trait]
impl<S> Handler for ServiceHandler<S>
where
    S: tower_service::Service<ProxyRequest, Response = ProxyResponse> + Clone + Send + Sync + 'static,
    S::Error: Into<HandlerError>,
    S::Future: Send,
{
    async fn call(&self, request: ProxyRequest) -> Result<ProxyResponse, HandlerError> {
        use tower::ServiceExt;

        self.service
            .clone()
            .oneshot(request)
            .await
            .map_err(Into::into)
    }
}
