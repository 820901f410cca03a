//! HS256 token issuance and validation
//!
//! Every service that issues or checks caller identity goes through this
//! module so that claim layout, algorithm and expiry rules stay identical.
//!
//! ## Security Design
//!
//! - **HS256 ONLY**: the validation step pins the algorithm, tokens signed
//!   with anything else are rejected before their claims are read
//! - **No global keys**: the secret is passed in, or owned by a [`TokenCodec`]
//!   built once at startup and shared read-only
//! - **Strict expiry**: a token is dead at `now >= exp`, no leeway

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// JWT algorithm used for every token
const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

// ============================================================================
// Data Structures
// ============================================================================

/// Verified token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject id, serialized as a JSON integer
    pub user_id: i64,
    /// Username
    pub username: String,
    /// Email address
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Reasons a token can be refused
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature does not match")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("failed to encode token: {0}")]
    Encoding(String),
}

// ============================================================================
// Token Generation
// ============================================================================

/// Issue a signed token for the given identity
///
/// ## Arguments
///
/// * `subject_id` - numeric user id
/// * `username` / `email` - embedded verbatim
/// * `secret` - shared HMAC secret
/// * `ttl` - lifetime; `exp = now + ttl` (zero or negative yields a token
///   that is already expired)
pub fn issue(
    subject_id: i64,
    username: &str,
    email: &str,
    secret: &[u8],
    ttl: Duration,
) -> Result<String, TokenError> {
    let now = Utc::now().timestamp();

    let claims = Claims {
        user_id: subject_id,
        username: username.to_string(),
        email: email.to_string(),
        iat: now,
        exp: now.saturating_add(ttl.num_seconds()),
    };

    encode(
        &Header::new(JWT_ALGORITHM),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| TokenError::Encoding(e.to_string()))
}

// ============================================================================
// Token Validation
// ============================================================================

/// Validate a token and return its claims
///
/// The signature is verified before anything else, then expiry is checked
/// against the current clock.
///
/// ## Errors
///
/// - `Malformed` - not a JWT, bad base64/JSON, missing claims, wrong algorithm
/// - `BadSignature` - signature does not verify against `secret`
/// - `Expired` - `now >= exp`
pub fn validate(token: &str, secret: &[u8]) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(JWT_ALGORITHM);
    // Expiry is enforced below with `>=` and no leeway.
    validation.validate_exp = false;
    validation.leeway = 0;

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed,
        })?;

    if Utc::now().timestamp() >= data.claims.exp {
        return Err(TokenError::Expired);
    }

    Ok(data.claims)
}

// ============================================================================
// Codec
// ============================================================================

/// Secret plus default lifetime, built once at startup
///
/// Cloning is cheap enough to share behind an `Arc`; nothing inside is
/// mutated after construction.
#[derive(Clone)]
pub struct TokenCodec {
    secret: SecretString,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    /// Default lifetime applied by [`TokenCodec::issue`]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, subject_id: i64, username: &str, email: &str) -> Result<String, TokenError> {
        self.issue_with_ttl(subject_id, username, email, self.ttl)
    }

    pub fn issue_with_ttl(
        &self,
        subject_id: i64,
        username: &str,
        email: &str,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        issue(
            subject_id,
            username,
            email,
            self.secret.expose_secret().as_bytes(),
            ttl,
        )
    }

    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        validate(token, self.secret.expose_secret().as_bytes())
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
