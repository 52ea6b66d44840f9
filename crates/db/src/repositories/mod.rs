use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use storefront_core::domain::catalog::{Category, CategoryId, Product, ProductId};
use storefront_core::domain::interaction::{CartLine, SaveToggle, UserId};
use storefront_core::recommendations::SourceError;

pub mod catalog;
pub mod interaction;
pub mod memory;

pub use catalog::SqlCatalogStore;
pub use interaction::SqlInteractionStore;
pub use memory::InMemoryStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<RepositoryError> for SourceError {
    fn from(error: RepositoryError) -> Self {
        SourceError::Unavailable(error.to_string())
    }
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError>;
    async fn find_category_by_slug(&self, slug: &str)
        -> Result<Option<Category>, RepositoryError>;
    async fn save_category(&self, category: Category) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError>;
    async fn list_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Product>, RepositoryError>;
    async fn save(&self, product: Product) -> Result<(), RepositoryError>;
}

/// Writes and reads for the two interaction signals: saved items and cart lines.
#[async_trait]
pub trait InteractionRepository: Send + Sync {
    /// Saves the product for the user, or removes every save when one exists.
    async fn toggle_saved(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<SaveToggle, RepositoryError>;

    async fn is_saved(&self, user_id: UserId, product_id: ProductId)
        -> Result<bool, RepositoryError>;

    /// Saved products, most recently saved first.
    async fn saved_products(&self, user_id: UserId) -> Result<Vec<Product>, RepositoryError>;

    /// Adds `quantity` units to the user's cart, creating the cart and the line on
    /// first use. An existing line has its quantity incremented.
    async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine, RepositoryError>;

    /// Replaces a line's quantity. Zero removes the line. Returns whether a line existed.
    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool, RepositoryError>;

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError>;
}

#[async_trait]
impl<T: CategoryRepository + ?Sized> CategoryRepository for Arc<T> {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        (**self).list_categories().await
    }

    async fn find_category_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        (**self).find_category_by_slug(slug).await
    }

    async fn save_category(&self, category: Category) -> Result<(), RepositoryError> {
        (**self).save_category(category).await
    }
}

#[async_trait]
impl<T: ProductRepository + ?Sized> ProductRepository for Arc<T> {
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        (**self).find_by_id(id).await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        (**self).find_by_slug(slug).await
    }

    async fn list_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Product>, RepositoryError> {
        (**self).list_by_category(category_id).await
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        (**self).save(product).await
    }
}
