use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::catalog::{CategoryId, Product, ProductId};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("catalog store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only queries the recommendation engine issues against the catalog and
/// interaction store. Row order is not part of the contract; the engine imposes
/// its own ordering.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, SourceError>;

    /// Products saved or cart-added by any user who saved or cart-added
    /// `anchor`, minus `excluding`. The store resolves the audience itself;
    /// it can be arbitrarily large.
    async fn products_engaged_with_audience_of(
        &self,
        anchor: ProductId,
        excluding: &[ProductId],
    ) -> Result<Vec<ProductId>, SourceError>;

    /// Save count per product across all users. Products never saved are omitted.
    async fn save_counts(&self) -> Result<Vec<(ProductId, u64)>, SourceError>;

    /// Cart line count per product across all users. Products never carted are omitted.
    async fn cart_counts(&self) -> Result<Vec<(ProductId, u64)>, SourceError>;

    async fn products_in_category(
        &self,
        category_id: CategoryId,
        excluding: &[ProductId],
    ) -> Result<Vec<ProductId>, SourceError>;

    async fn products_excluding(
        &self,
        excluding: &[ProductId],
    ) -> Result<Vec<ProductId>, SourceError>;
}

#[async_trait]
impl<S: CatalogSource + ?Sized> CatalogSource for Arc<S> {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, SourceError> {
        (**self).find_product(id).await
    }

    async fn products_engaged_with_audience_of(
        &self,
        anchor: ProductId,
        excluding: &[ProductId],
    ) -> Result<Vec<ProductId>, SourceError> {
        (**self).products_engaged_with_audience_of(anchor, excluding).await
    }

    async fn save_counts(&self) -> Result<Vec<(ProductId, u64)>, SourceError> {
        (**self).save_counts().await
    }

    async fn cart_counts(&self) -> Result<Vec<(ProductId, u64)>, SourceError> {
        (**self).cart_counts().await
    }

    async fn products_in_category(
        &self,
        category_id: CategoryId,
        excluding: &[ProductId],
    ) -> Result<Vec<ProductId>, SourceError> {
        (**self).products_in_category(category_id, excluding).await
    }

    async fn products_excluding(
        &self,
        excluding: &[ProductId],
    ) -> Result<Vec<ProductId>, SourceError> {
        (**self).products_excluding(excluding).await
    }
}
