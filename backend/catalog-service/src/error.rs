use thiserror::Error;
use tonic::{Code, Status};
use tracing::error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Convert to gRPC Status for wire protocol
    ///
    /// Internal details are logged here and never sent to the caller.
    pub fn to_status(&self) -> Status {
        match self {
            ServiceError::InvalidArgument(msg) => Status::new(Code::InvalidArgument, msg.clone()),
            ServiceError::AlreadyExists(msg) => Status::new(Code::AlreadyExists, msg.clone()),
            ServiceError::NotFound(msg) => Status::new(Code::NotFound, msg.clone()),
            ServiceError::PermissionDenied(msg) => Status::new(Code::PermissionDenied, msg.clone()),
            ServiceError::InvalidCredentials => {
                Status::new(Code::Unauthenticated, "Invalid email or password")
            }
            ServiceError::Internal(detail) => {
                error!(error = %detail, "internal service error");
                Status::new(Code::Internal, "internal server error")
            }
        }
    }
}

impl From<ServiceError> for Status {
    fn from(err: ServiceError) -> Self {
        err.to_status()
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::InvalidArgument(errors.to_string())
    }
}
