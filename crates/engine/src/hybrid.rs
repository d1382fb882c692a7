use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use storerec_core::ProductId;

use crate::collaborative::CollaborativeEngine;
use crate::content::ContentEngine;
use crate::popularity::PopularityEngine;
use crate::recommender::Recommender;
use crate::request::{Algorithm, RecommendationRequest};
use crate::result::ScoredProduct;
use crate::snapshot::StoreSnapshot;

/// Blend weights per component engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub collaborative: f64,
    pub content: f64,
    pub popularity: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            collaborative: 0.4,
            content: 0.35,
            popularity: 0.25,
        }
    }
}

/// Weighted blend of popularity, collaborative and content engines.
///
/// Each component is asked for twice the requested count. A product's score is
/// the weighted mean over the components that returned it, so a product found
/// by a single engine keeps that engine's score.
#[derive(Debug, Clone, Copy, Default)]
pub struct HybridEngine {
    weights: HybridWeights,
}

impl HybridEngine {
    pub fn new(weights: HybridWeights) -> Self {
        Self { weights }
    }
}

struct Blend {
    weighted: f64,
    total_weight: f64,
    explanations: Vec<String>,
    order: usize,
}

impl Recommender for HybridEngine {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Hybrid
    }

    fn recommend(&self, snapshot: &StoreSnapshot, request: &RecommendationRequest) -> Vec<ScoredProduct> {
        let widened = request.widened(request.max_results * 2);
        let components: [(&dyn Recommender, f64); 3] = [
            (&PopularityEngine, self.weights.popularity),
            (&CollaborativeEngine::default(), self.weights.collaborative),
            (&ContentEngine, self.weights.content),
        ];

        let mut blends: HashMap<ProductId, Blend> = HashMap::new();
        for (engine, weight) in components {
            if weight <= 0.0 {
                continue;
            }
            for rec in engine.recommend(snapshot, &widened) {
                let next = blends.len();
                let blend = blends.entry(rec.product_id).or_insert_with(|| Blend {
                    weighted: 0.0,
                    total_weight: 0.0,
                    explanations: Vec::new(),
                    order: next,
                });
                blend.weighted += rec.score * weight;
                blend.total_weight += weight;
                if !blend.explanations.contains(&rec.explanation) {
                    blend.explanations.push(rec.explanation);
                }
            }
        }

        let mut merged: Vec<(ProductId, f64, String, usize)> = blends
            .into_iter()
            .map(|(pid, b)| {
                (
                    pid,
                    b.weighted / b.total_weight,
                    combine_explanations(&b.explanations),
                    b.order,
                )
            })
            .collect();
        // Stable with respect to first discovery, like an insertion-ordered map.
        merged.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.3.cmp(&b.3)));

        merged
            .into_iter()
            .take(request.max_results)
            .map(|(pid, score, explanation, _)| ScoredProduct::new(pid, score, explanation))
            .collect()
    }
}

/// None -> generic, one -> itself, several -> "first and second".
pub fn combine_explanations(explanations: &[String]) -> String {
    match explanations {
        [] => "Recommended for you".to_string(),
        [only] => only.clone(),
        [first, second, ..] => {
            let mut chars = second.chars();
            let lowered = match chars.next() {
                Some(c) => c.to_lowercase().chain(chars).collect::<String>(),
                None => String::new(),
            };
            format!("{first} and {lowered}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use storerec_core::CustomerId;
    use storerec_tracking::InteractionType;

    #[test]
    fn explanation_combination() {
        assert_eq!(combine_explanations(&[]), "Recommended for you");
        assert_eq!(combine_explanations(&["Trending now".into()]), "Trending now");
        assert_eq!(
            combine_explanations(&[
                "Popular item with 3 interactions".into(),
                "Users with similar interests also liked this".into(),
            ]),
            "Popular item with 3 interactions and users with similar interests also liked this"
        );
    }

    #[test]
    fn anonymous_requests_fall_back_to_popularity() {
        let now = now();
        let a = product("a", "X", 1);
        let snap = snapshot(now, vec![a.clone()], vec![event(None, a.id, InteractionType::View, now)]);
        let out = HybridEngine::default().recommend(&snap, &RecommendationRequest::new(Some(5)));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].explanation, "Popular item with 1 interactions");
        assert!((out[0].score - 0.01).abs() < 1e-9);
    }

    #[test]
    fn blends_scores_as_weighted_mean() {
        let now = now();
        let seen = product("seen", "Shoes", 100);
        let target = product("target", "Shoes", 100);
        let (me, other) = (CustomerId::new(), CustomerId::new());
        let interactions = vec![
            event(Some(me), seen.id, InteractionType::View, now),
            event(Some(other), seen.id, InteractionType::View, now),
            event(Some(other), target.id, InteractionType::Purchase, now),
        ];
        let snap = snapshot(now, vec![seen, target.clone()], interactions);

        let out = HybridEngine::default()
            .recommend(&snap, &RecommendationRequest::new(Some(5)).for_customer(Some(me)));
        let rec = out.iter().find(|r| r.product_id == target.id).unwrap();
        // popularity: rank 1 of (1 + 5) -> 0.06; collaborative: 4/10; content: 1/10
        let expected = 0.06 * 0.25 + 0.4 * 0.4 + 0.1 * 0.35;
        assert!((rec.score - expected).abs() < 1e-9);
        assert!(rec.explanation.starts_with("Popular item with 6 interactions and users"));
    }

    #[test]
    fn respects_max_results() {
        let now = now();
        let products: Vec<_> = (0..30).map(|i| product(&format!("p{i}"), "X", 1)).collect();
        let interactions = products
            .iter()
            .map(|p| event(None, p.id, InteractionType::View, now))
            .collect();
        let snap = snapshot(now, products, interactions);
        let out = HybridEngine::default().recommend(&snap, &RecommendationRequest::new(Some(7)));
        assert_eq!(out.len(), 7);
    }
}
