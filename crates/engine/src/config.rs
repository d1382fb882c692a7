use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storerec_core::{DomainError, DomainResult, Entity, RecordId, StoreId};

use crate::hybrid::HybridWeights;
use crate::request::{Algorithm, CandidateFilter, MAX_RESULTS_LIMIT};

#[derive(Debug, Clone, Deserialize)]
pub struct NewRecommendationConfig {
    pub algorithm: Algorithm,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub filters: CandidateFilter,
    #[serde(default = "default_max")]
    pub max_recommendations: usize,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

fn default_max() -> usize {
    10
}

/// Per-store tuning for one algorithm; unique per (store, algorithm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationConfig {
    pub id: RecordId,
    pub store_id: StoreId,
    pub algorithm: Algorithm,
    pub is_active: bool,
    pub weight: f64,
    pub filters: CandidateFilter,
    pub max_recommendations: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecommendationConfig {
    pub fn create(store_id: StoreId, input: NewRecommendationConfig, now: DateTime<Utc>) -> DomainResult<Self> {
        validate(input.weight, input.max_recommendations)?;
        Ok(Self {
            id: RecordId::new(),
            store_id,
            algorithm: input.algorithm,
            is_active: input.is_active,
            weight: input.weight,
            filters: input.filters,
            max_recommendations: input.max_recommendations,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update(&mut self, input: NewRecommendationConfig, now: DateTime<Utc>) -> DomainResult<()> {
        validate(input.weight, input.max_recommendations)?;
        if input.algorithm != self.algorithm {
            return Err(DomainError::validation("algorithm of a config cannot change"));
        }
        self.is_active = input.is_active;
        self.weight = input.weight;
        self.filters = input.filters;
        self.max_recommendations = input.max_recommendations;
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for RecommendationConfig {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn validate(weight: f64, max: usize) -> DomainResult<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(DomainError::validation("weight must be non-negative"));
    }
    if !(1..=MAX_RESULTS_LIMIT).contains(&max) {
        return Err(DomainError::validation(format!(
            "max_recommendations must be between 1 and {MAX_RESULTS_LIMIT}"
        )));
    }
    Ok(())
}

/// Hybrid blend weights with active per-algorithm overrides applied.
pub fn hybrid_weights(configs: &[RecommendationConfig]) -> HybridWeights {
    let mut weights = HybridWeights::default();
    for c in configs.iter().filter(|c| c.is_active) {
        match c.algorithm {
            Algorithm::CollaborativeFiltering => weights.collaborative = c.weight,
            Algorithm::ContentBased => weights.content = c.weight,
            Algorithm::Popularity => weights.popularity = c.weight,
            _ => {}
        }
    }
    weights
}

/// Active config for `algorithm`, if any.
pub fn active_config(configs: &[RecommendationConfig], algorithm: Algorithm) -> Option<&RecommendationConfig> {
    configs.iter().find(|c| c.is_active && c.algorithm == algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(algorithm: Algorithm, weight: f64, active: bool) -> RecommendationConfig {
        RecommendationConfig::create(
            StoreId::new(),
            NewRecommendationConfig {
                algorithm,
                is_active: active,
                weight,
                filters: CandidateFilter::default(),
                max_recommendations: 10,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn overrides_apply_only_when_active() {
        let weights = hybrid_weights(&[
            config(Algorithm::Popularity, 0.9, true),
            config(Algorithm::ContentBased, 0.0, false),
        ]);
        assert_eq!(weights.popularity, 0.9);
        assert_eq!(weights.content, 0.35);
    }

    #[test]
    fn validation() {
        let input = NewRecommendationConfig {
            algorithm: Algorithm::Hybrid,
            is_active: true,
            weight: -1.0,
            filters: CandidateFilter::default(),
            max_recommendations: 10,
        };
        assert!(RecommendationConfig::create(StoreId::new(), input.clone(), Utc::now()).is_err());
        let input = NewRecommendationConfig { weight: 1.0, max_recommendations: 0, ..input };
        assert!(RecommendationConfig::create(StoreId::new(), input, Utc::now()).is_err());
    }
}
