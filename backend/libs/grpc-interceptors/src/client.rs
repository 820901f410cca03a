//! Client-side bearer injection
//!
//! Counterpart of the auth stage for callers: attaches
//! `authorization: Bearer <token>` to every outgoing request.

use tonic::metadata::errors::InvalidMetadataValue;
use tonic::metadata::AsciiMetadataValue;
use tonic::service::Interceptor;
use tonic::{Request, Status};

const AUTHORIZATION_HEADER: &str = "authorization";

/// Injects a fixed bearer token into outgoing gRPC requests
///
/// ```rust,no_run
/// use grpc_interceptors::BearerInterceptor;
/// use tonic::transport::Channel;
///
/// # async fn example(token: String) -> Result<(), Box<dyn std::error::Error>> {
/// let interceptor = BearerInterceptor::new(&token)?;
/// let channel = Channel::from_static("http://[::1]:50051").connect().await?;
/// // let client = ProductServiceClient::with_interceptor(channel, interceptor);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BearerInterceptor {
    auth_header: AsciiMetadataValue,
}

impl BearerInterceptor {
    /// Build from a raw token (without the `Bearer ` prefix)
    ///
    /// Fails if the token contains characters not allowed in metadata.
    pub fn new(token: &str) -> Result<Self, InvalidMetadataValue> {
        let auth_header = AsciiMetadataValue::try_from(format!("Bearer {token}"))?;
        Ok(Self { auth_header })
    }
}

impl Interceptor for BearerInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        request
            .metadata_mut()
            .insert(AUTHORIZATION_HEADER, self.auth_header.clone());
        Ok(request)
    }
}
