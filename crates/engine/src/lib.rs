//! `storerec-engine`
//!
//! **Responsibility:** recommendation scoring.
//!
//! This crate is intentionally **not** part of the domain model:
//! - It reads immutable store snapshots supplied by callers (infra/workers).
//! - It must not mutate domain state.
//! - It emits **scored products**, which higher layers persist as recommendations.
//!
//! Every engine is deterministic: the same snapshot and request produce the
//! same ranking, with ties broken by product id.

pub mod bought_together;
pub mod collaborative;
pub mod config;
pub mod content;
pub mod evaluation;
pub mod hybrid;
pub mod model;
pub mod popularity;
pub mod recommender;
pub mod record;
pub mod request;
pub mod result;
pub mod scope;
pub mod session;
pub mod similarity;
pub mod snapshot;
pub mod trending;

pub use config::{NewRecommendationConfig, RecommendationConfig, active_config, hybrid_weights};
pub use evaluation::{EVALUATION_K, EvaluationMetrics, evaluate};
pub use hybrid::HybridWeights;
pub use model::{ModelRecord, ModelStatus, ModelType, activate_model};
pub use recommender::{Recommender, recommender_for};
pub use record::{
    Audience, FeedbackType, NewFeedback, Recommendation, RecommendationFeedback, RecommendationFilter,
    SimilarProduct, TrendingProduct, UserRecommendationProfile,
};
pub use request::{Algorithm, CandidateFilter, RecommendationRequest};
pub use result::{EngineError, ScoredProduct};
pub use scope::{LocalRunner, StoreScope};
pub use similarity::{SimilarPair, precompute_similar};
pub use snapshot::{InteractionFacts, ProductFacts, SnapshotReader, StoreSnapshot};
pub use trending::{TrendingEntry, TrendingWindow, compute_trending};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};
    use storerec_core::{CustomerId, ProductId, SessionId, StoreId};
    use storerec_tracking::InteractionType;

    use crate::snapshot::{InteractionFacts, ProductFacts, StoreSnapshot};

    pub fn now() -> DateTime<Utc> {
        Utc::now()
    }

    pub fn store() -> StoreId {
        StoreId::from_uuid(Default::default())
    }

    pub fn product(title: &str, category: &str, price_cents: u64) -> ProductFacts {
        ProductFacts {
            id: ProductId::new(),
            title: title.to_string(),
            category: Some(category.to_string()),
            brand: None,
            price_cents: Some(price_cents),
            is_active: true,
            in_stock: true,
        }
    }

    pub fn event(
        customer: Option<CustomerId>,
        product: ProductId,
        kind: InteractionType,
        at: DateTime<Utc>,
    ) -> InteractionFacts {
        InteractionFacts {
            customer_id: customer,
            session_id: None,
            product_id: Some(product),
            kind,
            category: None,
            at,
        }
    }

    pub fn in_session(mut facts: InteractionFacts, session: SessionId) -> InteractionFacts {
        facts.session_id = Some(session);
        facts
    }

    pub fn snapshot(
        now: DateTime<Utc>,
        products: Vec<ProductFacts>,
        interactions: Vec<InteractionFacts>,
    ) -> StoreSnapshot {
        StoreSnapshot::new(store(), now, products, interactions)
    }
}
