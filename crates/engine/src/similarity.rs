use serde::{Deserialize, Serialize};

use storerec_core::ProductId;

use crate::snapshot::{ProductFacts, StoreSnapshot};

/// Neighbours kept per product.
pub const SIMILAR_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarPair {
    pub product_id: ProductId,
    pub similar_product_id: ProductId,
    pub similarity_score: f64,
    pub similarity_type: String,
    pub features_used: Vec<String>,
}

/// Same-category neighbours for every active product.
///
/// Score is `0.7 + 0.3 * (1 - |delta| / max(price))` when both are priced,
/// otherwise 0.7.
pub fn precompute_similar(snapshot: &StoreSnapshot) -> Vec<SimilarPair> {
    let active: Vec<&ProductFacts> = snapshot.products.iter().filter(|p| p.is_active).collect();
    let mut out = Vec::new();

    for src in &active {
        let Some(category) = src.category.as_deref() else {
            continue;
        };
        let mut neighbours: Vec<(ProductId, f64)> = active
            .iter()
            .filter(|p| p.id != src.id && p.category.as_deref() == Some(category))
            .map(|p| (p.id, price_similarity(src, p)))
            .collect();
        neighbours.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        neighbours.truncate(SIMILAR_LIMIT);

        out.extend(neighbours.into_iter().map(|(pid, score)| SimilarPair {
            product_id: src.id,
            similar_product_id: pid,
            similarity_score: score,
            similarity_type: "content_based".to_string(),
            features_used: vec!["category".to_string(), "price".to_string()],
        }));
    }
    out
}

fn price_similarity(a: &ProductFacts, b: &ProductFacts) -> f64 {
    match (a.price_cents, b.price_cents) {
        (Some(x), Some(y)) if x.max(y) > 0 => {
            let diff = (x as f64 - y as f64).abs();
            0.7 + 0.3 * (1.0 - diff / x.max(y) as f64)
        }
        _ => 0.7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use proptest::prelude::*;

    #[test]
    fn pairs_stay_within_category() {
        let (a, b, c) = (product("a", "X", 1_000), product("b", "X", 500), product("c", "Y", 1_000));
        let pairs = precompute_similar(&snapshot(now(), vec![a.clone(), b.clone(), c], vec![]));
        assert_eq!(pairs.len(), 2);
        let ab = pairs.iter().find(|p| p.product_id == a.id).unwrap();
        assert_eq!(ab.similar_product_id, b.id);
        assert!((ab.similarity_score - 0.85).abs() < 1e-9);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 500,
            ..ProptestConfig::default()
        })]

        /// Property: price similarity is symmetric and within 0.7..=1.
        #[test]
        fn price_similarity_bounded_and_symmetric(x in 0u64..1_000_000, y in 0u64..1_000_000) {
            let (mut a, mut b) = (product("a", "X", 0), product("b", "X", 0));
            a.price_cents = Some(x);
            b.price_cents = Some(y);
            let s = price_similarity(&a, &b);
            prop_assert!((0.7..=1.0).contains(&s));
            prop_assert!((s - price_similarity(&b, &a)).abs() < 1e-12);
        }
    }
}
