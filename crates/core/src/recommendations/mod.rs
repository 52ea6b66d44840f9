//! Product recommendations for the product-detail page.
//!
//! A cascading filter over interaction signals (saves and cart adds) and catalog
//! metadata. Each stage only runs while the result is still short of the limit:
//! collaborative overlap, same category, global popularity, then random filler.

mod engine;
pub mod filler;
pub mod popularity;
mod source;
mod types;

pub use engine::RecommendationEngine;
pub use popularity::PopularityTally;
pub use source::{CatalogSource, SourceError};
pub use types::*;

use thiserror::Error;

use crate::domain::catalog::ProductId;

/// Result type for recommendation operations
pub type RecommendationResult<T> = Result<T, RecommendationError>;

/// Number of recommendations shown on the product-detail page
pub const DEFAULT_LIMIT: usize = 5;

#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("anchor product {0} does not exist")]
    AnchorNotFound(ProductId),
    #[error(transparent)]
    Store(#[from] SourceError),
}
