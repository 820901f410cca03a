use std::sync::Arc;

use grpc_interceptors::IdentityContext;
use tracing::{info, warn};
use validator::Validate;

use crate::error::{Result, ServiceError};
use crate::models::{Product, ProductDraft};
use crate::repository::ProductRepository;

/// Product catalog operations on behalf of an authenticated caller
///
/// Reads are open to any authenticated caller; updates and deletes are
/// restricted to the product's owner.
#[derive(Clone)]
pub struct ProductService {
    repo: Arc<dyn ProductRepository>,
}

impl ProductService {
    pub fn new(repo: Arc<dyn ProductRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, caller: &IdentityContext, draft: ProductDraft) -> Result<Product> {
        let draft = draft.normalized();
        draft.validate()?;

        let product = self.repo.create(caller.subject_id(), draft).await?;
        info!(product_id = product.id, owner_id = product.owner_id, "product created");
        Ok(product)
    }

    pub async fn get(&self, id: i64) -> Result<Product> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn list_owned(&self, caller: &IdentityContext) -> Result<Vec<Product>> {
        self.repo.list_by_owner(caller.subject_id()).await
    }

    pub async fn update(
        &self,
        caller: &IdentityContext,
        id: i64,
        draft: ProductDraft,
    ) -> Result<Product> {
        let draft = draft.normalized();
        draft.validate()?;

        self.ensure_owner(caller, id).await?;
        let product = self.repo.update(id, draft).await?.ok_or_else(|| not_found(id))?;
        info!(product_id = id, "product updated");
        Ok(product)
    }

    pub async fn delete(&self, caller: &IdentityContext, id: i64) -> Result<()> {
        self.ensure_owner(caller, id).await?;
        if !self.repo.delete(id).await? {
            return Err(not_found(id));
        }
        info!(product_id = id, "product deleted");
        Ok(())
    }

    async fn ensure_owner(&self, caller: &IdentityContext, id: i64) -> Result<()> {
        let product = self.get(id).await?;
        if !caller.is_subject(product.owner_id) {
            warn!(
                product_id = id,
                owner_id = product.owner_id,
                user_id = caller.subject_id(),
                "caller does not own product"
            );
            return Err(ServiceError::PermissionDenied(
                "only the owner can modify this product".to_string(),
            ));
        }
        Ok(())
    }
}

fn not_found(id: i64) -> ServiceError {
    ServiceError::NotFound(format!("product {} not found", id))
}
