//! Transport route of an inbound call
//!
//! [`RouteLayer`] sits in front of the generated services and stores the
//! HTTP/2 `:path` of every request (`/package.Service/Method`) in its
//! extensions. The pipeline builds the call descriptor from that value, so
//! the public-method check always sees the method the call arrived on.

use std::task::{Context, Poll};

use tower::{Layer, Service};

/// Fully-qualified method path a call was routed on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrpcRoute(String);

impl GrpcRoute {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

/// Tower layer recording a [`GrpcRoute`] on every request
///
/// ```rust,no_run
/// use grpc_interceptors::RouteLayer;
/// use tonic::transport::Server;
///
/// let builder = Server::builder().layer(RouteLayer::new());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteLayer;

impl RouteLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RouteLayer {
    type Service = RouteService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RouteService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RouteService<S> {
    inner: S,
}

impl<S, B> Service<http::Request<B>> for RouteService<S>
where
    S: Service<http::Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<B>) -> Self::Future {
        let route = GrpcRoute::new(req.uri().path());
        req.extensions_mut().insert(route);
        self.inner.call(req)
    }
}
