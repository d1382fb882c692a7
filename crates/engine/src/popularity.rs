use std::collections::HashMap;

use chrono::Duration;

use storerec_core::ProductId;

use crate::recommender::Recommender;
use crate::request::{Algorithm, RecommendationRequest};
use crate::result::ScoredProduct;
use crate::snapshot::StoreSnapshot;

/// Look-back window for popularity.
pub const POPULARITY_WINDOW_DAYS: i64 = 30;
const PURCHASE_BONUS: f64 = 5.0;

/// Most-interacted products of the last 30 days, purchases boosted.
///
/// Raw popularity is `interactions + 5 * purchases`; the score decays with
/// rank: `min(popularity / rank / 100, 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PopularityEngine;

impl Recommender for PopularityEngine {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Popularity
    }

    fn recommend(&self, snapshot: &StoreSnapshot, request: &RecommendationRequest) -> Vec<ScoredProduct> {
        let since = snapshot.now - Duration::days(POPULARITY_WINDOW_DAYS);
        let mut counts: HashMap<ProductId, (u64, u64)> = HashMap::new();
        for i in snapshot.interactions_since(since) {
            let Some(pid) = i.product_id else { continue };
            let e = counts.entry(pid).or_default();
            e.0 += 1;
            if i.is_purchase() {
                e.1 += 1;
            }
        }

        let mut ranked: Vec<(ProductId, f64)> = counts
            .into_iter()
            .filter(|(pid, _)| {
                snapshot
                    .product(pid)
                    .is_some_and(|p| request.filter.allows(p))
            })
            .map(|(pid, (n, purchases))| (pid, n as f64 + purchases as f64 * PURCHASE_BONUS))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        ranked
            .into_iter()
            .take(request.max_results)
            .enumerate()
            .map(|(idx, (pid, popularity))| {
                ScoredProduct::new(
                    pid,
                    (popularity / (idx + 1) as f64 / 100.0).min(1.0),
                    format!("Popular item with {popularity} interactions"),
                )
            })
            .collect()
    }
}
