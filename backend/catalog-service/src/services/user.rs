use std::sync::Arc;

use token_codec::TokenCodec;
use tracing::{info, warn};
use validator::Validate;

use crate::error::{Result, ServiceError};
use crate::models::{normalize_email, NewUser, Registration, User};
use crate::repository::UserRepository;
use crate::security::{hash_password, verify_password};

/// Successful login: signed token plus the account it belongs to
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub user: User,
}

/// Account registration, login and profile lookup
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    codec: Arc<TokenCodec>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, codec: Arc<TokenCodec>) -> Self {
        Self { repo, codec }
    }

    pub async fn register(&self, registration: Registration) -> Result<User> {
        let registration = Registration {
            username: registration.username.trim().to_string(),
            email: normalize_email(&registration.email),
            ..registration
        };
        registration.validate()?;

        if self.repo.find_by_email(&registration.email).await?.is_some() {
            return Err(ServiceError::AlreadyExists(format!(
                "user with email {} already exists",
                registration.email
            )));
        }
        if self.repo.find_by_username(&registration.username).await?.is_some() {
            return Err(ServiceError::AlreadyExists(format!(
                "user with username {} already exists",
                registration.username
            )));
        }

        let password_hash = hash_password(&registration.password)?;
        let user = self
            .repo
            .create(NewUser {
                username: registration.username,
                email: registration.email,
                full_name: registration.full_name.trim().to_string(),
                password_hash,
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Verify credentials and issue a token with the configured lifetime
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "email and password are required".to_string(),
            ));
        }

        let Some(user) = self.repo.find_by_email(&email).await? else {
            warn!(reason = "unknown_email", "login rejected");
            return Err(ServiceError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = user.id, reason = "wrong_password", "login rejected");
            return Err(ServiceError::InvalidCredentials);
        }

        let token = self
            .codec
            .issue(user.id, &user.username, &user.email)
            .map_err(|e| ServiceError::Internal(format!("Failed to issue token: {}", e)))?;

        info!(user_id = user.id, "user logged in");
        Ok(LoginOutcome { token, user })
    }

    /// Profile of an authenticated caller
    pub async fn profile(&self, user_id: i64) -> Result<User> {
        self.repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {} not found", user_id)))
    }
}
