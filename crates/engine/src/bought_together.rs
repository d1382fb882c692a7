use std::collections::{HashMap, HashSet};

use storerec_core::{CustomerId, ProductId};

use crate::recommender::Recommender;
use crate::request::{Algorithm, RecommendationRequest};
use crate::result::{ScoredProduct, rank};
use crate::snapshot::StoreSnapshot;

/// Products purchased by the shoppers who purchased the context product.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoughtTogetherEngine;

impl Recommender for BoughtTogetherEngine {
    fn algorithm(&self) -> Algorithm {
        Algorithm::FrequentlyBoughtTogether
    }

    fn recommend(&self, snapshot: &StoreSnapshot, request: &RecommendationRequest) -> Vec<ScoredProduct> {
        let Some(source) = request.context_product.and_then(|p| snapshot.product(&p)) else {
            return Vec::new();
        };

        let buyers: HashSet<CustomerId> = snapshot
            .interactions
            .iter()
            .filter(|i| i.is_purchase() && i.product_id == Some(source.id))
            .filter_map(|i| i.customer_id)
            .collect();

        let mut counts: HashMap<ProductId, f64> = HashMap::new();
        for i in snapshot.interactions.iter().filter(|i| i.is_purchase()) {
            let (Some(c), Some(pid)) = (i.customer_id, i.product_id) else {
                continue;
            };
            if pid != source.id && buyers.contains(&c) {
                *counts.entry(pid).or_default() += 1.0;
            }
        }
        counts.retain(|pid, _| snapshot.product(pid).is_some_and(|p| request.filter.allows(p)));

        let max = counts.values().copied().fold(0.0, f64::max);
        if max <= 0.0 {
            return Vec::new();
        }
        let explanation = format!("Frequently bought together with {}", source.title);
        let scored = counts
            .into_iter()
            .map(|(pid, n)| ScoredProduct::new(pid, n / max, explanation.clone()))
            .collect();
        rank(scored, request.max_results)
    }
}
