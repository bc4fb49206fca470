//! `tower::Service` implementation for [`AuthorizationMiddleware`]

use futures_util::future::BoxFuture;
use std::convert::Infallible;
use std::task::{Context, Poll};
use tower_service::Service;

use super::AuthorizationMiddleware;
use crate::handler::Handler;
use crate::request::{ProxyRequest, ProxyResponse};

/// Future returned by the middleware service
pub type AuthorizationFuture = BoxFuture<'static, Result<ProxyResponse, Infallible>>;

impl<H> Service<ProxyRequest> for AuthorizationMiddleware<H>
where
    H: Handler + 'static,
{
    type Response = ProxyResponse;
    type Error = Infallible;
    type Future = AuthorizationFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The handler is shared, not polled.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ProxyRequest) -> Self::Future {
        let middleware = self.clone();
        Box::pin(async move { Ok(middleware.handle(request).await) })
    }
}
