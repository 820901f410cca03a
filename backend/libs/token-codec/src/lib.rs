//! Signed, time-bound identity tokens for the catalog backend.
//!
//! Tokens are HS256 JWTs carrying the caller's numeric id, username and
//! email. The codec is a pure function of the shared secret and the clock:
//! no key registry, no revocation list, tokens are accepted until they expire.
//!
//! ```rust
//! use chrono::Duration;
//! use token_codec::{issue, validate};
//!
//! let secret = b"a-very-long-shared-signing-secret-value";
//! let token = issue(42, "alice", "a@x.com", secret, Duration::hours(1)).unwrap();
//! let claims = validate(&token, secret).unwrap();
//! assert_eq!(claims.user_id, 42);
//! ```

pub mod jwt;

pub use jwt::{issue, validate, Claims, TokenCodec, TokenError};
