use serde::{Deserialize, Serialize};
use thiserror::Error;

use storerec_core::ProductId;

/// One ranked candidate produced by an engine.
///
/// This is *not* a stored recommendation. Persistence, expiry and counters are
/// handled by higher layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredProduct {
    pub product_id: ProductId,
    /// Normalised score in \[0, 1\].
    pub score: f64,
    pub explanation: String,
}

impl ScoredProduct {
    pub fn new(product_id: ProductId, score: f64, explanation: impl Into<String>) -> Self {
        Self {
            product_id,
            score: score.clamp(0.0, 1.0),
            explanation: explanation.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine input: {0}")]
    InvalidInput(String),

    #[error("snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    #[error("scope violation: {0}")]
    ScopeViolation(String),
}

/// Sort by score descending, ties by product id, and keep `limit`.
pub(crate) fn rank(mut items: Vec<ScoredProduct>, limit: usize) -> Vec<ScoredProduct> {
    items.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.product_id.cmp(&b.product_id))
    });
    items.truncate(limit);
    items
}
