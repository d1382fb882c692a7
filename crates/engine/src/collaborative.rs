use std::collections::{HashMap, HashSet};

use storerec_core::{CustomerId, ProductId};

use crate::recommender::Recommender;
use crate::request::{Algorithm, RecommendationRequest};
use crate::result::{ScoredProduct, rank};
use crate::snapshot::StoreSnapshot;

const NEIGHBOURS: usize = 10;
const PURCHASE_BONUS: f64 = 3.0;
const SCORE_SCALE: f64 = 10.0;

/// User-based collaborative filtering.
///
/// Neighbours are the shoppers with the most interactions on the target's
/// products. Their other products are scored by `interactions + 3 * purchases`
/// and normalised with `min(score / 10, 1)`.
#[derive(Debug, Clone, Copy)]
pub struct CollaborativeEngine {
    algorithm: Algorithm,
}

impl Default for CollaborativeEngine {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::CollaborativeFiltering,
        }
    }
}

impl CollaborativeEngine {
    /// Same model, reported under the `similar_users` label.
    pub fn similar_users() -> Self {
        Self {
            algorithm: Algorithm::SimilarUsers,
        }
    }
}

impl Recommender for CollaborativeEngine {
    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn recommend(&self, snapshot: &StoreSnapshot, request: &RecommendationRequest) -> Vec<ScoredProduct> {
        let Some(customer) = request.customer_id else {
            return Vec::new();
        };

        let seen: HashSet<ProductId> = snapshot
            .interactions_of(customer)
            .filter_map(|i| i.product_id)
            .collect();
        if seen.is_empty() {
            return Vec::new();
        }

        let mut overlap: HashMap<CustomerId, u64> = HashMap::new();
        for i in &snapshot.interactions {
            let (Some(other), Some(pid)) = (i.customer_id, i.product_id) else {
                continue;
            };
            if other != customer && seen.contains(&pid) {
                *overlap.entry(other).or_default() += 1;
            }
        }
        let mut neighbours: Vec<(CustomerId, u64)> = overlap.into_iter().collect();
        neighbours.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let neighbours: HashSet<CustomerId> =
            neighbours.into_iter().take(NEIGHBOURS).map(|(c, _)| c).collect();
        if neighbours.is_empty() {
            return Vec::new();
        }

        let mut candidates: HashMap<ProductId, f64> = HashMap::new();
        for i in &snapshot.interactions {
            let (Some(other), Some(pid)) = (i.customer_id, i.product_id) else {
                continue;
            };
            if !neighbours.contains(&other) || seen.contains(&pid) {
                continue;
            }
            *candidates.entry(pid).or_default() += if i.is_purchase() { 1.0 + PURCHASE_BONUS } else { 1.0 };
        }

        let scored = candidates
            .into_iter()
            .filter(|(pid, _)| snapshot.product(pid).is_some_and(|p| request.filter.allows(p)))
            .map(|(pid, s)| {
                ScoredProduct::new(
                    pid,
                    (s / SCORE_SCALE).min(1.0),
                    "Users with similar interests also liked this",
                )
            })
            .collect();
        rank(scored, request.max_results)
    }
}
