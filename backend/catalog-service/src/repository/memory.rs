use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{ProductRepository, UserRepository};
use crate::error::{Result, ServiceError};
use crate::models::{NewUser, Product, ProductDraft, User};

/// Users keyed by id, with unique email and username indexes
#[derive(Debug)]
pub struct InMemoryUserRepository {
    next_id: AtomicI64,
    users: DashMap<i64, User>,
    emails: DashMap<String, i64>,
    usernames: DashMap<String, i64>,
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            users: DashMap::new(),
            emails: DashMap::new(),
            usernames: DashMap::new(),
        }
    }
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> Result<User> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        // Reserve both unique keys before the record becomes visible
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => {
                return Err(ServiceError::AlreadyExists(format!(
                    "user with email {} already exists",
                    user.email
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }
        match self.usernames.entry(user.username.clone()) {
            Entry::Occupied(_) => {
                self.emails.remove(&user.email);
                return Err(ServiceError::AlreadyExists(format!(
                    "user with username {} already exists",
                    user.username
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let now = Utc::now();
        let stored = User {
            id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let id = self.emails.get(email).map(|id| *id);
        Ok(id.and_then(|id| self.users.get(&id).map(|user| user.clone())))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let id = self.usernames.get(username).map(|id| *id);
        Ok(id.and_then(|id| self.users.get(&id).map(|user| user.clone())))
    }
}

#[derive(Debug)]
pub struct InMemoryProductRepository {
    next_id: AtomicI64,
    products: DashMap<i64, Product>,
}

impl Default for InMemoryProductRepository {
    fn default() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            products: DashMap::new(),
        }
    }
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn create(&self, owner_id: i64, draft: ProductDraft) -> Result<Product> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let product = Product {
            id,
            name: draft.name,
            description: draft.description,
            price: draft.price,
            stock: draft.stock,
            owner_id,
            created_at: now,
            updated_at: now,
        };
        self.products.insert(id, product.clone());
        Ok(product)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Product>> {
        Ok(self.products.get(&id).map(|product| product.clone()))
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = self
            .products
            .iter()
            .filter(|entry| entry.owner_id == owner_id)
            .map(|entry| entry.value().clone())
            .collect();
        products.sort_by_key(|product| product.id);
        Ok(products)
    }

    async fn update(&self, id: i64, draft: ProductDraft) -> Result<Option<Product>> {
        Ok(self.products.get_mut(&id).map(|mut product| {
            product.name = draft.name;
            product.description = draft.description;
            product.price = draft.price;
            product.stock = draft.stock;
            product.updated_at = Utc::now();
            product.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.products.remove(&id).is_some())
    }
}
