//! Global popularity: save count plus cart count, across all users.

use std::collections::HashMap;

use crate::domain::catalog::ProductId;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PopularityTally {
    scores: HashMap<ProductId, u64>,
}

impl PopularityTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the save and cart frequency maps by summation.
    pub fn from_counts(
        saves: impl IntoIterator<Item = (ProductId, u64)>,
        carts: impl IntoIterator<Item = (ProductId, u64)>,
    ) -> Self {
        let mut tally = Self::new();
        for (product_id, count) in saves.into_iter().chain(carts) {
            tally.record(product_id, count);
        }
        tally
    }

    pub fn record(&mut self, product_id: ProductId, count: u64) {
        if count == 0 {
            return;
        }
        *self.scores.entry(product_id).or_insert(0) += count;
    }

    pub fn score(&self, product_id: ProductId) -> u64 {
        self.scores.get(&product_id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Products by descending score; equal scores fall back to ascending id.
    pub fn ranked(&self) -> Vec<(ProductId, u64)> {
        let mut ranked = self.scores.iter().map(|(id, score)| (*id, *score)).collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }
}
