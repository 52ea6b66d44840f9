use serde::{Deserialize, Serialize};

use crate::domain::catalog::ProductId;
use crate::domain::interaction::UserId;

use super::DEFAULT_LIMIT;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecommendationRequest {
    /// Viewer of the product page; `None` for anonymous traffic.
    pub user: Option<UserId>,
    pub anchor: ProductId,
    pub limit: usize,
}

impl RecommendationRequest {
    pub fn new(anchor: ProductId) -> Self {
        Self { user: None, anchor, limit: DEFAULT_LIMIT }
    }

    pub fn with_user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_viewer(mut self, user: Option<UserId>) -> Self {
        self.user = user;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Which cascade stage contributed a recommendation, most precise first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStage {
    Collaborative,
    SameCategory,
    Popular,
    Random,
}

impl RecommendationStage {
    pub const ALL: [Self; 4] =
        [Self::Collaborative, Self::SameCategory, Self::Popular, Self::Random];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Collaborative => "collaborative",
            Self::SameCategory => "same_category",
            Self::Popular => "popular",
            Self::Random => "random",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product_id: ProductId,
    pub stage: RecommendationStage,
}

/// Ordered recommendations for one anchor product, most relevant first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendations {
    pub anchor: ProductId,
    pub items: Vec<Recommendation>,
}

impl Recommendations {
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|item| item.product_id).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|item| item.product_id == product_id)
    }

    pub fn from_stage(&self, stage: RecommendationStage) -> Vec<ProductId> {
        self.items.iter().filter(|item| item.stage == stage).map(|item| item.product_id).collect()
    }
}
