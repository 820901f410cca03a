//! Bearer-token authentication stage
//!
//! Public methods pass straight through with an anonymous context. Every
//! other call must present `authorization: Bearer <token>`; the token is
//! validated with the shared [`TokenCodec`] and the claims become the call's
//! [`IdentityContext`]. Rejections never reach the handler.
//!
//! Callers only ever see one of two generic messages. The precise reason
//! (missing header, wrong scheme, expired, bad signature, ...) goes to the
//! warn log.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use token_codec::{Claims, TokenCodec, TokenError};
use tonic::metadata::MetadataMap;
use tonic::Status;
use tracing::{debug, warn};

use crate::identity::IdentityContext;
use crate::interceptor::{BoxFuture, CallScope, Interceptor, Next};
use crate::logger::CallLogger;

const AUTHORIZATION_HEADER: &str = "authorization";
const BEARER_SCHEME: &str = "bearer";

const MISSING_CREDENTIALS_MESSAGE: &str = "missing or invalid authorization credentials";
const INVALID_TOKEN_MESSAGE: &str = "invalid token";

/// Why a call was rejected
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization metadata is missing")]
    MissingCredentials,

    #[error("authorization metadata is not a bearer credential")]
    InvalidScheme,

    #[error("token rejected: {0}")]
    InvalidToken(#[from] TokenError),
}

impl AuthError {
    /// Short label used as the `reason` log field
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::InvalidScheme => "invalid_scheme",
            AuthError::InvalidToken(TokenError::Expired) => "token_expired",
            AuthError::InvalidToken(TokenError::BadSignature) => "bad_signature",
            AuthError::InvalidToken(TokenError::Malformed) => "malformed_token",
            AuthError::InvalidToken(TokenError::Encoding(_)) => "token_encoding",
        }
    }
}

impl From<AuthError> for Status {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials | AuthError::InvalidScheme => {
                Status::unauthenticated(MISSING_CREDENTIALS_MESSAGE)
            }
            AuthError::InvalidToken(_) => Status::unauthenticated(INVALID_TOKEN_MESSAGE),
        }
    }
}

/// Fully-qualified method names exempt from authentication
///
/// Membership is an exact string match; there is no prefix or wildcard form.
#[derive(Debug, Clone, Default)]
pub struct PublicMethods {
    methods: HashSet<String>,
}

impl PublicMethods {
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains(method)
    }
}

#[derive(Debug, Clone)]
pub struct AuthInterceptor {
    codec: Arc<TokenCodec>,
    public_methods: Arc<PublicMethods>,
    logger: CallLogger,
}

impl AuthInterceptor {
    pub fn new(codec: Arc<TokenCodec>, public_methods: PublicMethods, logger: CallLogger) -> Self {
        Self {
            codec,
            public_methods: Arc::new(public_methods),
            logger,
        }
    }

    pub fn is_public(&self, method: &str) -> bool {
        self.public_methods.contains(method)
    }

    /// Extract and validate the bearer token carried in `metadata`
    pub fn authenticate(&self, metadata: &MetadataMap) -> Result<Claims, AuthError> {
        let token = bearer_token(metadata)?;
        Ok(self.codec.validate(token)?)
    }
}

impl<C, T> Interceptor<C, T> for AuthInterceptor
where
    C: CallScope,
    T: Send + 'static,
{
    fn intercept<'a>(&'a self, call: C, next: Next<'a, C, T>) -> BoxFuture<'a, Result<T, Status>> {
        let method = call.context().method();

        if self.is_public(method) {
            self.logger
                .emit(|| debug!(method = %method, "public method, skipping authentication"));
            return next.run(call);
        }

        match self.authenticate(call.context().metadata()) {
            Ok(claims) => {
                let identity = IdentityContext::from(claims);
                self.logger.emit(|| {
                    debug!(
                        method = %method,
                        user_id = identity.subject_id(),
                        "request authenticated"
                    )
                });
                let context = call.context().with_identity(identity);
                next.run(call.with_context(context))
            }
            Err(err) => {
                self.logger.emit(|| {
                    warn!(
                        method = %method,
                        reason = err.reason(),
                        error = %err,
                        "authentication failed"
                    )
                });
                let status = Status::from(err);
                Box::pin(async move { Err::<T, Status>(status) })
            }
        }
    }
}

/// `authorization: Bearer <token>`, scheme matched case-insensitively
fn bearer_token(metadata: &MetadataMap) -> Result<&str, AuthError> {
    let value = metadata
        .get(AUTHORIZATION_HEADER)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::InvalidScheme)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case(BEARER_SCHEME) && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(AuthError::InvalidScheme),
    }
}
