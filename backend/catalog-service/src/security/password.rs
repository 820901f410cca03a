//! Credential storage format
//!
//! Passwords are kept as PHC strings (`$argon2id$v=19$...`), which carry their
//! own salt and cost parameters. A stored string is re-parsed on every login,
//! so raising the cost later leaves existing rows verifiable.

use argon2::password_hash::{
    self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::error::{Result, ServiceError};

fn argon2id() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default())
}

fn internal(context: &str, err: password_hash::Error) -> ServiceError {
    ServiceError::Internal(format!("{context}: {err}"))
}

/// Derive the PHC string stored for a new account
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let phc = argon2id()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| internal("could not derive credential", e))?;

    Ok(phc.to_string())
}

/// Check a login attempt against a stored PHC string
///
/// A wrong password is `Ok(false)`. `Err` means the stored value cannot be
/// used at all.
pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let phc =
        PasswordHash::new(stored).map_err(|e| internal("stored credential is unreadable", e))?;

    let outcome = argon2id().verify_password(password.as_bytes(), &phc);
    match outcome {
        Err(password_hash::Error::Password) => Ok(false),
        other => other
            .map(|()| true)
            .map_err(|e| internal("could not check credential", e)),
    }
}
