//! Storage boundary
//!
//! Services depend on these traits only. The in-memory implementations back
//! the binary and the tests; a persistent store plugs in behind the same
//! traits.

mod memory;

pub use memory::{InMemoryProductRepository, InMemoryUserRepository};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NewUser, Product, ProductDraft, User};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Store a new user
    ///
    /// Fails with `AlreadyExists` when the email or username is taken.
    async fn create(&self, user: NewUser) -> Result<User>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Lookup by normalized email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, owner_id: i64, draft: ProductDraft) -> Result<Product>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Product>>;

    /// Products owned by `owner_id`, oldest first
    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Product>>;

    /// Replace the editable fields, `None` if the product does not exist
    async fn update(&self, id: i64, draft: ProductDraft) -> Result<Option<Product>>;

    /// `true` if a product was removed
    async fn delete(&self, id: i64) -> Result<bool>;
}
