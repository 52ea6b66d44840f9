//! Low-relevance filler for the last cascade stage.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::catalog::ProductId;

/// Pick up to `needed` candidates in uniformly random order.
///
/// The output depends only on the candidate order and the rng state, so callers
/// that sort candidates first get reproducible picks from a seeded rng.
pub fn fill_randomly<R>(
    mut candidates: Vec<ProductId>,
    needed: usize,
    rng: &mut R,
) -> Vec<ProductId>
where
    R: Rng + ?Sized,
{
    let amount = needed.min(candidates.len());
    if amount == 0 {
        return Vec::new();
    }

    let (picked, _) = candidates.partial_shuffle(rng, amount);
    picked.to_vec()
}
