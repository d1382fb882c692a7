use storerec_core::StoreId;

use crate::recommender::Recommender;
use crate::request::RecommendationRequest;
use crate::result::{EngineError, ScoredProduct};
use crate::snapshot::StoreSnapshot;

/// Store scope for execution.
///
/// - `Any`: run for any store (shared background workers).
/// - `Store`: only accept snapshots of the specified store (request handlers).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StoreScope {
    Any,
    Store(StoreId),
}

impl StoreScope {
    pub fn allows(&self, store_id: StoreId) -> bool {
        match self {
            StoreScope::Any => true,
            StoreScope::Store(s) => *s == store_id,
        }
    }
}

/// Synchronous runner that executes engines in-process after a scope check.
#[derive(Debug, Copy, Clone)]
pub struct LocalRunner {
    scope: StoreScope,
}

impl LocalRunner {
    pub fn new(scope: StoreScope) -> Self {
        Self { scope }
    }

    pub fn for_store(store_id: StoreId) -> Self {
        Self::new(StoreScope::Store(store_id))
    }

    pub fn scope(&self) -> StoreScope {
        self.scope
    }

    pub fn run(
        &self,
        engine: &dyn Recommender,
        snapshot: &StoreSnapshot,
        request: &RecommendationRequest,
    ) -> Result<Vec<ScoredProduct>, EngineError> {
        if !self.scope.allows(snapshot.store_id) {
            return Err(EngineError::ScopeViolation(
                "snapshot store not allowed by runner scope".to_string(),
            ));
        }
        if request.max_results == 0 {
            return Err(EngineError::InvalidInput("max_results must be >= 1".to_string()));
        }
        Ok(engine.recommend(snapshot, request))
    }
}
