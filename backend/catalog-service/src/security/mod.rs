/// Security utilities
///
/// Password hashing for stored credentials. Token issuance and validation
/// live in the shared `token-codec` crate.
pub mod password;

pub use password::{hash_password, verify_password};
