//! Verified caller identity
//!
//! Built once per call by the auth stage from validated token claims and
//! handed to business code through the call context. Fields are private so
//! downstream code can read but never rewrite who the caller is.

use token_codec::Claims;

/// Identity of the authenticated caller for a single call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    subject_id: i64,
    username: String,
    email: String,
}

impl IdentityContext {
    pub fn new(subject_id: i64, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            subject_id,
            username: username.into(),
            email: email.into(),
        }
    }

    /// Numeric user id (`user_id` claim)
    pub fn subject_id(&self) -> i64 {
        self.subject_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Check whether the caller owns a resource
    ///
    /// ```rust
    /// # use grpc_interceptors::IdentityContext;
    /// let identity = IdentityContext::new(42, "alice", "a@x.com");
    /// assert!(identity.is_subject(42));
    /// assert!(!identity.is_subject(7));
    /// ```
    pub fn is_subject(&self, owner_id: i64) -> bool {
        self.subject_id == owner_id
    }
}

impl From<Claims> for IdentityContext {
    fn from(claims: Claims) -> Self {
        Self {
            subject_id: claims.user_id,
            username: claims.username,
            email: claims.email,
        }
    }
}
