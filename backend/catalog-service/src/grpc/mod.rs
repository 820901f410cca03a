//! gRPC surface: generated protobuf types, public method names and service adapters

use grpc_interceptors::PublicMethods;

mod product;
mod user;

pub use product::ProductGrpcService;
pub use user::UserGrpcService;

pub mod proto {
    pub mod user {
        tonic::include_proto!("user");
    }

    pub mod product {
        tonic::include_proto!("product");
    }
}

/// Public method names as they appear on the wire
///
/// Protected methods are never named here: the pipeline reads the method of a
/// call from its transport route.
pub mod methods {
    pub const REGISTER: &str = "/user.UserService/Register";
    pub const LOGIN: &str = "/user.UserService/Login";
}

/// Methods callable without credentials
pub fn public_methods() -> PublicMethods {
    PublicMethods::new([methods::REGISTER, methods::LOGIN])
}
