use std::collections::{HashMap, HashSet};

use storerec_core::ProductId;

use crate::recommender::Recommender;
use crate::request::{Algorithm, RecommendationRequest};
use crate::result::{ScoredProduct, rank};
use crate::snapshot::{ProductFacts, StoreSnapshot};

const TOP_CATEGORIES: usize = 5;
const PURCHASE_BONUS: f64 = 2.0;
const SCORE_SCALE: f64 = 10.0;
/// Price band used when the source product has no price, in cents.
const UNPRICED_BAND: (u64, u64) = (0, 100_000);

/// Content-based recommendations.
///
/// With a shopper: products from their strongest categories they have not
/// interacted with, nothing when they have no history yet. Without one:
/// products similar to the product in context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentEngine;

impl Recommender for ContentEngine {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ContentBased
    }

    fn recommend(&self, snapshot: &StoreSnapshot, request: &RecommendationRequest) -> Vec<ScoredProduct> {
        if request.customer_id.is_some() {
            return by_customer_categories(snapshot, request);
        }
        match request.context_product {
            Some(pid) => similar_to(snapshot, &pid, request),
            None => Vec::new(),
        }
    }
}

fn by_customer_categories(snapshot: &StoreSnapshot, request: &RecommendationRequest) -> Vec<ScoredProduct> {
    let Some(customer) = request.customer_id else {
        return Vec::new();
    };

    let mut weights: HashMap<&str, f64> = HashMap::new();
    let mut seen: HashSet<ProductId> = HashSet::new();
    for i in snapshot.interactions_of(customer) {
        if let Some(pid) = i.product_id {
            seen.insert(pid);
        }
        if let Some(category) = snapshot.category_of(i) {
            *weights.entry(category).or_default() += if i.is_purchase() { 1.0 + PURCHASE_BONUS } else { 1.0 };
        }
    }

    let mut top: Vec<(&str, f64)> = weights.into_iter().collect();
    top.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(b.0)));
    top.truncate(TOP_CATEGORIES);
    if top.is_empty() {
        return Vec::new();
    }

    let scored = snapshot
        .products
        .iter()
        .filter(|p| !seen.contains(&p.id) && request.filter.allows(p))
        .filter_map(|p| {
            let category = p.category.as_deref()?;
            let (name, weight) = top.iter().find(|(c, _)| *c == category)?;
            Some(ScoredProduct::new(
                p.id,
                (weight / SCORE_SCALE).min(1.0),
                format!("Matches your interest in {name}"),
            ))
        })
        .collect();
    rank(scored, request.max_results)
}

/// Same-category products within ±50 % of the source price.
///
/// Score is `0.7 + 0.3 * (1 - |delta| / source price)`, capped at 1.
pub fn similar_to(snapshot: &StoreSnapshot, source: &ProductId, request: &RecommendationRequest) -> Vec<ScoredProduct> {
    let Some(src) = snapshot.product(source) else {
        return Vec::new();
    };
    let Some(category) = src.category.as_deref() else {
        return Vec::new();
    };

    let (lo, hi) = match src.price_cents {
        Some(p) => (p / 2, p + p / 2),
        None => UNPRICED_BAND,
    };

    let scored = snapshot
        .products
        .iter()
        .filter(|p| p.id != src.id && p.category.as_deref() == Some(category))
        .filter(|p| p.price_cents.is_some_and(|price| price >= lo && price <= hi))
        .filter(|p| request.filter.allows(p))
        .map(|p| ScoredProduct::new(p.id, similarity_score(src, p), format!("Similar to {}", src.title)))
        .collect();
    rank(scored, request.max_results)
}

fn similarity_score(src: &ProductFacts, candidate: &ProductFacts) -> f64 {
    match (src.price_cents, candidate.price_cents) {
        (Some(a), Some(b)) if a > 0 => {
            let diff = (a as f64 - b as f64).abs();
            (0.7 + 0.3 * (1.0 - diff / a as f64)).min(1.0)
        }
        _ => 0.7,
    }
}
