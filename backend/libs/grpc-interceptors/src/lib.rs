//! Interceptor pipeline for gRPC services
//!
//! Every inbound call, unary or streaming, runs through the same fixed chain
//! before business code sees it:
//!
//! ```text
//! Logging -> Recovery -> Auth -> handler
//! ```
//!
//! ## Core Components
//!
//! - **Pipeline**: builds the chain and drives unary and streaming calls through it
//! - **LoggingInterceptor**: records method, duration and outcome; never alters the result
//! - **RecoveryInterceptor**: turns a panic inside the call into `Status::internal`
//! - **AuthInterceptor**: public-method exemption, bearer extraction, token validation,
//!   identity injection
//! - **CallContext / IdentityContext**: per-call descriptor, deadline, cancellation and
//!   verified caller identity
//! - **IdentityExt**: typed identity accessors for `tonic::Request`
//! - **BearerInterceptor**: client side, injects `authorization: Bearer <token>`
//! - **RouteLayer**: tower layer recording the transport path each call arrived on;
//!   the pipeline takes the method name from it
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use grpc_interceptors::{CallLogger, IdentityExt, Pipeline, PublicMethods};
//! use token_codec::TokenCodec;
//! use tonic::{Request, Response, Status};
//!
//! async fn whoami(request: Request<()>) -> Result<Response<String>, Status> {
//!     let identity = request.require_identity()?;
//!     Ok(Response::new(identity.username().to_string()))
//! }
//!
//! # async fn example(codec: TokenCodec, request: Request<()>) -> Result<(), Status> {
//! let pipeline = Pipeline::new(
//!     Arc::new(codec),
//!     PublicMethods::new(["/user.UserService/Login"]),
//!     CallLogger::current(),
//! );
//! // `request` as handed to a generated service mounted behind `RouteLayer`
//! let response = pipeline.unary(request, whoami).await?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod call;
mod client;
mod context;
mod extensions;
mod identity;
mod interceptor;
mod logger;
mod logging;
mod pipeline;
mod recovery;
mod route;
mod stream;

pub use auth::{AuthError, AuthInterceptor, PublicMethods};
pub use call::UnaryCall;
pub use client::BearerInterceptor;
pub use context::{CallContext, CallDescriptor, CallKind};
pub use extensions::IdentityExt;
pub use identity::IdentityContext;
pub use interceptor::{chain, BoxFuture, CallScope, Handler, Interceptor, Next};
pub use logger::CallLogger;
pub use logging::LoggingInterceptor;
pub use pipeline::{Pipeline, UNROUTED_METHOD};
pub use recovery::RecoveryInterceptor;
pub use route::{GrpcRoute, RouteLayer, RouteService};
pub use stream::ServerStream;

// Re-export tonic Status for convenience
pub use tonic::Status;
