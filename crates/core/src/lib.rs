pub mod config;
pub mod domain;
pub mod errors;
pub mod recommendations;

pub use domain::catalog::{Category, CategoryId, Product, ProductId};
pub use domain::interaction::{CartLine, SaveToggle, SavedItem, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use recommendations::{
    CatalogSource, Recommendation, RecommendationEngine, RecommendationError,
    RecommendationRequest, RecommendationStage, Recommendations, SourceError,
};
