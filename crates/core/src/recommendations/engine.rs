//! Recommendation engine implementation

use std::collections::{BTreeSet, HashSet};
use std::iter;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::filler::fill_randomly;
use super::popularity::PopularityTally;
use super::source::CatalogSource;
use super::types::*;
use super::{RecommendationError, RecommendationResult};
use crate::domain::catalog::{Product, ProductId};

/// Picks accumulated across stages. Never holds the anchor, a repeat, or more
/// than `limit` entries.
struct Picks {
    anchor: ProductId,
    limit: usize,
    items: Vec<Recommendation>,
    seen: HashSet<ProductId>,
}

impl Picks {
    fn new(anchor: ProductId, limit: usize) -> Self {
        Self { anchor, limit, items: Vec::with_capacity(limit), seen: HashSet::new() }
    }

    fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.items.len())
    }

    fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    fn excluded(&self) -> Vec<ProductId> {
        iter::once(self.anchor).chain(self.items.iter().map(|item| item.product_id)).collect()
    }

    fn extend(
        &mut self,
        stage: RecommendationStage,
        candidates: impl IntoIterator<Item = ProductId>,
    ) -> usize {
        let before = self.items.len();
        for product_id in candidates {
            if self.is_full() {
                break;
            }
            if product_id == self.anchor || !self.seen.insert(product_id) {
                continue;
            }
            self.items.push(Recommendation { product_id, stage });
        }
        self.items.len() - before
    }

    fn finish(self) -> Recommendations {
        Recommendations { anchor: self.anchor, items: self.items }
    }
}

/// Cascading recommender over a read-only [`CatalogSource`].
#[derive(Debug, Clone)]
pub struct RecommendationEngine<S> {
    source: S,
}

impl<S> RecommendationEngine<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: CatalogSource> RecommendationEngine<S> {
    /// Recommend products for the request, with the random stage seeded from OS entropy.
    pub async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> RecommendationResult<Recommendations> {
        let mut rng = StdRng::from_entropy();
        self.recommend_with_rng(request, &mut rng).await
    }

    /// Recommend products using `rng` for the random fallback stage.
    ///
    /// Stages run in order and each only runs while the result is short of
    /// `request.limit`. Fails only when the anchor product does not exist or the
    /// store cannot be read.
    pub async fn recommend_with_rng<R>(
        &self,
        request: &RecommendationRequest,
        rng: &mut R,
    ) -> RecommendationResult<Recommendations>
    where
        R: Rng + Send,
    {
        let anchor = self
            .source
            .find_product(request.anchor)
            .await?
            .ok_or(RecommendationError::AnchorNotFound(request.anchor))?;

        let mut picks = Picks::new(anchor.id, request.limit);

        if request.user.is_some() && !picks.is_full() {
            self.collaborative_stage(&anchor, &mut picks).await?;
        }
        if !picks.is_full() {
            self.same_category_stage(&anchor, &mut picks).await?;
        }
        if !picks.is_full() {
            self.popularity_stage(&mut picks).await?;
        }
        if !picks.is_full() {
            self.random_stage(&mut picks, rng).await?;
        }

        Ok(picks.finish())
    }

    /// Products engaged with by anyone who saved or cart-added the anchor.
    async fn collaborative_stage(
        &self,
        anchor: &Product,
        picks: &mut Picks,
    ) -> RecommendationResult<()> {
        let candidates = self
            .source
            .products_engaged_with_audience_of(anchor.id, &[anchor.id])
            .await?
            .into_iter()
            .collect::<BTreeSet<_>>();

        picks.extend(RecommendationStage::Collaborative, candidates);
        Ok(())
    }

    async fn same_category_stage(
        &self,
        anchor: &Product,
        picks: &mut Picks,
    ) -> RecommendationResult<()> {
        let candidates = self
            .source
            .products_in_category(anchor.category_id, &picks.excluded())
            .await?
            .into_iter()
            .collect::<BTreeSet<_>>();

        picks.extend(RecommendationStage::SameCategory, candidates);
        Ok(())
    }

    async fn popularity_stage(&self, picks: &mut Picks) -> RecommendationResult<()> {
        let saves = self.source.save_counts().await?;
        let carts = self.source.cart_counts().await?;
        let tally = PopularityTally::from_counts(saves, carts);

        picks.extend(
            RecommendationStage::Popular,
            tally.ranked().into_iter().map(|(product_id, _)| product_id),
        );
        Ok(())
    }

    async fn random_stage<R>(&self, picks: &mut Picks, rng: &mut R) -> RecommendationResult<()>
    where
        R: Rng + Send,
    {
        // Sorted so a seeded rng yields the same picks whatever order the store returns.
        let candidates = self
            .source
            .products_excluding(&picks.excluded())
            .await?
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();

        let filler = fill_randomly(candidates, picks.remaining(), rng);
        picks.extend(RecommendationStage::Random, filler);
        Ok(())
    }
}
