//! Per-shopper behaviour profile, rebuilt from raw history.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use storerec_catalog::Product;
use storerec_core::{CustomerId, Entity, ProductId, RecordId, StoreId};

use crate::{Interaction, InteractionType, TrackingSession};

const TOP_PREFERENCES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseFrequency {
    Frequent,
    Occasional,
    Rare,
}

impl PurchaseFrequency {
    pub fn from_purchases(purchases: u64) -> Self {
        if purchases > 10 {
            PurchaseFrequency::Frequent
        } else if purchases > 3 {
            PurchaseFrequency::Occasional
        } else {
            PurchaseFrequency::Rare
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowsingPattern {
    Explorer,
    Focused,
    Browser,
}

impl BrowsingPattern {
    pub fn classify(interactions: u64, views: u64, purchases: u64) -> Self {
        if views as f64 > interactions as f64 * 0.8 {
            BrowsingPattern::Explorer
        } else if purchases as f64 / views.max(1) as f64 > 0.1 {
            BrowsingPattern::Focused
        } else {
            BrowsingPattern::Browser
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePreference {
    pub min_cents: u64,
    pub max_cents: u64,
    pub avg_cents: u64,
}

/// Weighted affinity for a category or brand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affinity {
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    pub id: RecordId,
    pub store_id: StoreId,
    pub customer_id: CustomerId,
    pub total_interactions: u64,
    pub total_views: u64,
    pub total_purchases: u64,
    pub total_cart_adds: u64,
    pub avg_session_duration_seconds: f64,
    pub avg_days_between_sessions: f64,
    pub last_active_date: Option<NaiveDate>,
    pub preferred_categories: Vec<Affinity>,
    pub preferred_brands: Vec<Affinity>,
    pub price_preference: Option<PricePreference>,
    pub purchase_frequency: PurchaseFrequency,
    pub browsing_pattern: BrowsingPattern,
    pub avg_order_value_cents: u64,
    pub feature_vector: BTreeMap<String, f64>,
    pub updated_at: DateTime<Utc>,
}

impl BehaviorProfile {
    /// Rebuild the profile from the customer's full history.
    ///
    /// `products` resolves brands; interactions whose product is unknown still
    /// count toward category affinity through the denormalised category.
    pub fn compute(
        store_id: StoreId,
        customer_id: CustomerId,
        existing: Option<RecordId>,
        interactions: &[&Interaction],
        sessions: &[&TrackingSession],
        products: &HashMap<ProductId, &Product>,
        now: DateTime<Utc>,
    ) -> Self {
        let count = |kind: InteractionType| interactions.iter().filter(|i| i.is(kind)).count() as u64;
        let total = interactions.len() as u64;
        let views = count(InteractionType::View);
        let purchases = count(InteractionType::Purchase);
        let cart_adds = count(InteractionType::CartAdd);

        let purchase_values: Vec<u64> = interactions
            .iter()
            .filter(|i| i.is(InteractionType::Purchase) && i.value_cents > 0)
            .map(|i| i.value_cents)
            .collect();
        let purchase_value: u64 = interactions
            .iter()
            .filter(|i| i.is(InteractionType::Purchase))
            .map(|i| i.value_cents)
            .sum();
        let avg_order_value_cents = if purchases > 0 { purchase_value / purchases } else { 0 };

        let mut category_weights: HashMap<String, f64> = HashMap::new();
        let mut brand_weights: HashMap<String, f64> = HashMap::new();
        for i in interactions.iter().filter(|i| i.product_id.is_some()) {
            let product = i.product_id.and_then(|id| products.get(&id));
            let category = i
                .product_category
                .clone()
                .or_else(|| product.and_then(|p| p.category.clone()));
            if let Some(category) = category {
                *category_weights.entry(category).or_default() += i.weight;
            }
            if let Some(brand) = product.and_then(|p| p.brand.clone()) {
                *brand_weights.entry(brand).or_default() += i.weight;
            }
        }

        let ended: Vec<&&TrackingSession> = sessions.iter().filter(|s| !s.is_active()).collect();
        let avg_session_duration_seconds = if ended.is_empty() {
            0.0
        } else {
            ended.iter().map(|s| s.duration_seconds as f64).sum::<f64>() / ended.len() as f64
        };

        let mut starts: Vec<DateTime<Utc>> = sessions.iter().map(|s| s.start_time).collect();
        starts.sort();
        let avg_days_between_sessions = match (starts.first(), starts.last()) {
            (Some(first), Some(last)) if starts.len() > 1 => {
                (*last - *first).num_days() as f64 / (starts.len() - 1) as f64
            }
            _ => 0.0,
        };

        let feature_vector = feature_vector(total, views, purchases, cart_adds, avg_order_value_cents);

        Self {
            id: existing.unwrap_or_default(),
            store_id,
            customer_id,
            total_interactions: total,
            total_views: views,
            total_purchases: purchases,
            total_cart_adds: cart_adds,
            avg_session_duration_seconds,
            avg_days_between_sessions,
            last_active_date: interactions.iter().map(|i| i.created_at).max().map(|t| t.date_naive()),
            preferred_categories: top_affinities(category_weights),
            preferred_brands: top_affinities(brand_weights),
            price_preference: price_preference(&purchase_values),
            purchase_frequency: PurchaseFrequency::from_purchases(purchases),
            browsing_pattern: BrowsingPattern::classify(total, views, purchases),
            avg_order_value_cents,
            feature_vector,
            updated_at: now,
        }
    }

    /// Names of the strongest `n` category affinities.
    pub fn top_categories(&self, n: usize) -> Vec<&str> {
        self.preferred_categories
            .iter()
            .take(n)
            .map(|a| a.name.as_str())
            .collect()
    }
}

impl Entity for BehaviorProfile {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn top_affinities(weights: HashMap<String, f64>) -> Vec<Affinity> {
    let mut out: Vec<Affinity> = weights
        .into_iter()
        .map(|(name, weight)| Affinity { name, weight })
        .collect();
    out.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.name.cmp(&b.name)));
    out.truncate(TOP_PREFERENCES);
    out
}

fn price_preference(values: &[u64]) -> Option<PricePreference> {
    let min = *values.iter().min()?;
    let max = *values.iter().max()?;
    let avg = values.iter().sum::<u64>() / values.len() as u64;
    Some(PricePreference {
        min_cents: min,
        max_cents: max,
        avg_cents: avg,
    })
}

/// Ratios and saturating scales, each within 0..=1.
fn feature_vector(
    total: u64,
    views: u64,
    purchases: u64,
    cart_adds: u64,
    avg_order_value_cents: u64,
) -> BTreeMap<String, f64> {
    let ratio = |n: u64, d: u64| if d == 0 { 0.0 } else { (n as f64 / d as f64).min(1.0) };
    let saturate = |n: f64, half: f64| n / (n + half);
    BTreeMap::from([
        ("activity".to_string(), saturate(total as f64, 50.0)),
        ("purchase_intensity".to_string(), saturate(purchases as f64, 5.0)),
        ("view_ratio".to_string(), ratio(views, total)),
        ("cart_ratio".to_string(), ratio(cart_adds, total)),
        ("conversion_ratio".to_string(), ratio(purchases, views.max(1))),
        (
            "order_value".to_string(),
            saturate(avg_order_value_cents as f64 / 100.0, 100.0),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewSession;
    use crate::interaction::test_support::interaction;
    use chrono::Duration;
    use storerec_catalog::NewProduct;

    fn product(store: StoreId, id: &str, category: &str, brand: &str) -> Product {
        Product::create(
            store,
            NewProduct {
                store_product_id: id.into(),
                title: id.into(),
                category: Some(category.into()),
                brand: Some(brand.into()),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn classifications() {
        assert_eq!(PurchaseFrequency::from_purchases(11), PurchaseFrequency::Frequent);
        assert_eq!(PurchaseFrequency::from_purchases(4), PurchaseFrequency::Occasional);
        assert_eq!(PurchaseFrequency::from_purchases(3), PurchaseFrequency::Rare);

        assert_eq!(BrowsingPattern::classify(10, 9, 0), BrowsingPattern::Explorer);
        assert_eq!(BrowsingPattern::classify(10, 5, 1), BrowsingPattern::Focused);
        assert_eq!(BrowsingPattern::classify(10, 5, 0), BrowsingPattern::Browser);
        assert_eq!(BrowsingPattern::classify(0, 0, 0), BrowsingPattern::Browser);
    }

    #[test]
    fn compute_profile_from_history() {
        let store = StoreId::new();
        let customer = CustomerId::new();
        let now = Utc::now();
        let shoe = product(store, "shoe", "Shoes", "Peak");
        let hat = product(store, "hat", "Hats", "Alp");
        let products: HashMap<ProductId, &Product> = [(shoe.id, &shoe), (hat.id, &hat)].into();

        let mut v = interaction(InteractionType::View, Some(customer), Some(hat.id), now);
        v.product_category = Some("Hats".into());
        let mut buy = interaction(InteractionType::Purchase, Some(customer), Some(shoe.id), now);
        buy.value_cents = 6_000;
        buy.product_category = Some("Shoes".into());
        let mut cheap = interaction(InteractionType::Purchase, Some(customer), Some(shoe.id), now);
        cheap.value_cents = 2_000;
        let cart = interaction(InteractionType::CartAdd, Some(customer), Some(shoe.id), now);
        let items = [&v, &buy, &cheap, &cart];

        let mut s1 = TrackingSession::start(store, Some(customer), NewSession { session_id: "a".into(), ..Default::default() }, now - Duration::days(4)).unwrap();
        s1.end(now - Duration::days(4) + Duration::seconds(100));
        let mut s2 = TrackingSession::start(store, Some(customer), NewSession { session_id: "b".into(), ..Default::default() }, now).unwrap();
        s2.end(now + Duration::seconds(300));

        let profile = BehaviorProfile::compute(store, customer, None, &items, &[&s1, &s2], &products, now);

        assert_eq!(profile.total_interactions, 4);
        assert_eq!(profile.total_purchases, 2);
        assert_eq!(profile.avg_order_value_cents, 4_000);
        assert_eq!(
            profile.price_preference,
            Some(PricePreference { min_cents: 2_000, max_cents: 6_000, avg_cents: 4_000 })
        );
        assert_eq!(profile.top_categories(1), vec!["Shoes"]);
        assert_eq!(profile.preferred_brands[0].name, "Peak");
        assert_eq!(profile.avg_session_duration_seconds, 200.0);
        assert_eq!(profile.avg_days_between_sessions, 4.0);
        assert_eq!(profile.browsing_pattern, BrowsingPattern::Focused);
        assert!(profile.feature_vector.values().all(|v| (0.0..=1.0).contains(v)));
    }
}
