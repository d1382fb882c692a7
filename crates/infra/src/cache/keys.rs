//! Cache key layout. Every key starts with the store prefix so a store's
//! entries can be dropped together.

use storerec_core::{CustomerId, StoreId};
use storerec_engine::{Algorithm, Audience};

pub fn store_prefix(store_id: StoreId) -> String {
    format!("store:{store_id}:")
}

pub fn catalog_prefix(store_id: StoreId) -> String {
    format!("store:{store_id}:catalog:")
}

pub fn categories(store_id: StoreId) -> String {
    format!("{}categories", catalog_prefix(store_id))
}

pub fn brands(store_id: StoreId) -> String {
    format!("{}brands", catalog_prefix(store_id))
}

pub fn catalog_stats(store_id: StoreId) -> String {
    format!("{}stats", catalog_prefix(store_id))
}

fn audience_segment(audience: &Audience) -> String {
    match (&audience.customer_id, &audience.session_key) {
        (Some(c), _) => format!("c:{c}"),
        (None, Some(s)) => format!("s:{s}"),
        (None, None) => "anon".to_string(),
    }
}

pub fn all_recommendations_prefix(store_id: StoreId) -> String {
    format!("store:{store_id}:recs:")
}

/// All cached recommendation lists of one audience.
pub fn recommendations_prefix(store_id: StoreId, audience: &Audience) -> String {
    format!("{}{}:", all_recommendations_prefix(store_id), audience_segment(audience))
}

pub fn customer_recommendations_prefix(store_id: StoreId, customer_id: CustomerId) -> String {
    format!("store:{store_id}:recs:c:{customer_id}:")
}

pub fn session_recommendations_prefix(store_id: StoreId, session_key: &str) -> String {
    format!("store:{store_id}:recs:s:{session_key}:")
}

pub fn recommendations(
    store_id: StoreId,
    audience: &Audience,
    algorithm: Algorithm,
    max_results: usize,
    context_product: Option<&str>,
) -> String {
    format!(
        "{}{algorithm}:{max_results}:{}",
        recommendations_prefix(store_id, audience),
        context_product.unwrap_or("-")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn recommendation_keys_nest_under_audience_prefix() {
        let store = StoreId::new();
        let customer = CustomerId::new();
        let audience = Audience {
            customer_id: Some(customer),
            session_key: Some("s1".to_string()),
        };
        let key = recommendations(store, &audience, Algorithm::Hybrid, 10, None);
        assert!(key.starts_with(&customer_recommendations_prefix(store, customer)));
        assert!(key.starts_with(&store_prefix(store)));
        assert!(key.ends_with(":hybrid:10:-"));

        let anon = recommendations(store, &Audience::default(), Algorithm::Trending, 5, Some("sku-1"));
        assert!(anon.contains(":recs:anon:"));
        assert!(anon.ends_with("sku-1"));
    }

    proptest! {
        /// Property: a session's keys never fall under another session's prefix.
        #[test]
        fn session_prefixes_do_not_overlap(
            a in "[a-z0-9-]{1,16}",
            b in "[a-z0-9-]{1,16}",
            max in 1usize..50,
        ) {
            prop_assume!(a != b);
            let store = StoreId::new();
            let audience = Audience { customer_id: None, session_key: Some(a.clone()) };
            let key = recommendations(store, &audience, Algorithm::SessionBased, max, None);
            prop_assert!(key.starts_with(&session_recommendations_prefix(store, &a)));
            prop_assert!(!key.starts_with(&session_recommendations_prefix(store, &b)));
        }
    }
}
