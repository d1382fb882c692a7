//! Record collections, one store-partitioned repository per record type.

use std::sync::Arc;

use sqlx::PgPool;

use storerec_analytics::{DailyMetrics, Report};
use storerec_catalog::Product;
use storerec_core::{Entity, StoreId};
use storerec_customers::{Customer, UserPreference};
use storerec_engine::{
    ModelRecord, Recommendation, RecommendationConfig, RecommendationFeedback, SimilarProduct, TrendingProduct,
    UserRecommendationProfile,
};
use storerec_tenancy::{Store, StoreApiKey};
use storerec_tracking::{AbTest, BehaviorProfile, DailyProductView, Interaction, InteractionEvent, TrackingSession};

use super::{ServiceResult, not_found};
use crate::read_model::{Document, InMemoryScopedStore, PostgresScopedStore, ScopedStore, StoreError};

/// Repository of `V`, keyed by the record's own id.
pub type Repo<V> = Arc<dyn ScopedStore<<V as Entity>::Id, V>>;

macro_rules! documents {
    ($($ty:ty => $collection:literal),* $(,)?) => {
        $(impl Document for $ty {
            const COLLECTION: &'static str = $collection;
        })*

        /// Names of every document collection.
        pub fn document_collections() -> &'static [&'static str] {
            &[$($collection),*]
        }
    };
}

documents! {
    Store => "stores",
    StoreApiKey => "store_api_keys",
    Product => "products",
    Customer => "customers",
    UserPreference => "user_preferences",
    Interaction => "interactions",
    TrackingSession => "sessions",
    InteractionEvent => "interaction_events",
    DailyProductView => "daily_product_views",
    BehaviorProfile => "behavior_profiles",
    AbTest => "ab_tests",
    Recommendation => "recommendations",
    RecommendationFeedback => "recommendation_feedback",
    RecommendationConfig => "recommendation_configs",
    UserRecommendationProfile => "user_recommendation_profiles",
    SimilarProduct => "similar_products",
    TrendingProduct => "trending_products",
    ModelRecord => "models",
    DailyMetrics => "daily_metrics",
    Report => "reports",
}

#[derive(Clone)]
pub struct Repositories {
    pub stores: Repo<Store>,
    pub api_keys: Repo<StoreApiKey>,
    pub products: Repo<Product>,
    pub customers: Repo<Customer>,
    pub preferences: Repo<UserPreference>,
    pub interactions: Repo<Interaction>,
    pub sessions: Repo<TrackingSession>,
    pub events: Repo<InteractionEvent>,
    pub product_views: Repo<DailyProductView>,
    pub behavior_profiles: Repo<BehaviorProfile>,
    pub ab_tests: Repo<AbTest>,
    pub recommendations: Repo<Recommendation>,
    pub feedback: Repo<RecommendationFeedback>,
    pub rec_configs: Repo<RecommendationConfig>,
    pub user_rec_profiles: Repo<UserRecommendationProfile>,
    pub similar_products: Repo<SimilarProduct>,
    pub trending: Repo<TrendingProduct>,
    pub models: Repo<ModelRecord>,
    pub daily_metrics: Repo<DailyMetrics>,
    pub reports: Repo<Report>,
}

macro_rules! repositories {
    ($make:expr) => {
        Repositories {
            stores: $make,
            api_keys: $make,
            products: $make,
            customers: $make,
            preferences: $make,
            interactions: $make,
            sessions: $make,
            events: $make,
            product_views: $make,
            behavior_profiles: $make,
            ab_tests: $make,
            recommendations: $make,
            feedback: $make,
            rec_configs: $make,
            user_rec_profiles: $make,
            similar_products: $make,
            trending: $make,
            models: $make,
            daily_metrics: $make,
            reports: $make,
        }
    };
}

impl Repositories {
    pub fn in_memory() -> Self {
        repositories!(Arc::new(InMemoryScopedStore::new()))
    }

    /// Postgres document tables. Must be called inside a multi-threaded
    /// Tokio runtime.
    pub fn postgres(pool: PgPool) -> Result<Self, StoreError> {
        Ok(repositories!(Arc::new(PostgresScopedStore::new(pool.clone())?)))
    }
}

/// Record-level helpers over a store-partitioned repository.
pub trait RecordRepo<V: Entity> {
    /// Insert or replace `record` under its own id.
    fn save(&self, store_id: StoreId, record: &V) -> ServiceResult<()>;

    /// Fetch or report `what` as not found.
    fn require(&self, store_id: StoreId, id: &V::Id, what: &str) -> ServiceResult<V>;
}

impl<V, R> RecordRepo<V> for R
where
    V: Entity + Clone,
    R: ScopedStore<V::Id, V> + ?Sized,
{
    fn save(&self, store_id: StoreId, record: &V) -> ServiceResult<()> {
        Ok(self.upsert(store_id, record.id().clone(), record.clone())?)
    }

    fn require(&self, store_id: StoreId, id: &V::Id, what: &str) -> ServiceResult<V> {
        self.get(store_id, id)?.ok_or_else(|| not_found(what))
    }
}
