use crate::bought_together::BoughtTogetherEngine;
use crate::collaborative::CollaborativeEngine;
use crate::content::ContentEngine;
use crate::hybrid::{HybridEngine, HybridWeights};
use crate::popularity::PopularityEngine;
use crate::request::{Algorithm, RecommendationRequest};
use crate::result::ScoredProduct;
use crate::session::SessionEngine;
use crate::snapshot::StoreSnapshot;
use crate::trending::TrendingEngine;

/// A store-scoped recommendation strategy.
///
/// Engines consume a snapshot supplied by the caller and never mutate it.
/// Missing inputs (unknown customer, empty session) yield an empty ranking
/// rather than an error.
pub trait Recommender: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    fn recommend(&self, snapshot: &StoreSnapshot, request: &RecommendationRequest) -> Vec<ScoredProduct>;
}

/// Engine implementing `algorithm`; hybrid uses `weights`.
pub fn recommender_for(algorithm: Algorithm, weights: HybridWeights) -> Box<dyn Recommender> {
    match algorithm {
        Algorithm::CollaborativeFiltering => Box::new(CollaborativeEngine::default()),
        Algorithm::SimilarUsers => Box::new(CollaborativeEngine::similar_users()),
        Algorithm::ContentBased => Box::new(ContentEngine),
        Algorithm::Hybrid => Box::new(HybridEngine::new(weights)),
        Algorithm::Popularity => Box::new(PopularityEngine),
        Algorithm::SessionBased => Box::new(SessionEngine),
        Algorithm::Trending => Box::new(TrendingEngine),
        Algorithm::FrequentlyBoughtTogether => Box::new(BoughtTogetherEngine),
    }
}
