use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use storerec_core::{DomainError, DomainResult, Entity, RecordId, StoreId};

use crate::evaluation::EvaluationMetrics;
use crate::hybrid::HybridWeights;
use crate::request::Algorithm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    CollaborativeFiltering,
    ContentBased,
    Hybrid,
    SessionBased,
}

impl ModelType {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            ModelType::CollaborativeFiltering => Algorithm::CollaborativeFiltering,
            ModelType::ContentBased => Algorithm::ContentBased,
            ModelType::Hybrid => Algorithm::Hybrid,
            ModelType::SessionBased => Algorithm::SessionBased,
        }
    }

    /// Model type backing `algorithm`, if it is a trainable one.
    pub fn for_algorithm(algorithm: Algorithm) -> Option<Self> {
        match algorithm {
            Algorithm::CollaborativeFiltering | Algorithm::SimilarUsers => {
                Some(ModelType::CollaborativeFiltering)
            }
            Algorithm::ContentBased => Some(ModelType::ContentBased),
            Algorithm::Hybrid => Some(ModelType::Hybrid),
            Algorithm::SessionBased => Some(ModelType::SessionBased),
            _ => None,
        }
    }

    pub fn features_used(&self) -> Vec<String> {
        let names: &[&str] = match self {
            ModelType::CollaborativeFiltering => &["customer_product_interactions", "purchases"],
            ModelType::ContentBased => &["category", "price", "interaction_weight"],
            ModelType::Hybrid => &[
                "customer_product_interactions",
                "purchases",
                "category",
                "price",
                "popularity",
            ],
            ModelType::SessionBased => &["session_co_occurrence"],
        };
        names.iter().map(|s| s.to_string()).collect()
    }
}

impl core::str::FromStr for ModelType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let algorithm: Algorithm = s.parse()?;
        ModelType::for_algorithm(algorithm)
            .filter(|m| m.algorithm() == algorithm)
            .ok_or_else(|| DomainError::validation(format!("'{s}' is not a trainable model type")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Training,
    Active,
    Inactive,
    Failed,
}

/// A trained (evaluated) model version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: RecordId,
    pub store_id: StoreId,
    pub name: String,
    pub model_type: ModelType,
    pub version: String,
    pub config: Value,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub training_loss: f64,
    pub training_data_size: u64,
    pub features_used: Vec<String>,
    pub feature_importance: BTreeMap<String, f64>,
    pub status: ModelStatus,
    pub is_active: bool,
    pub description: String,
    pub trained_at: Option<DateTime<Utc>>,
    pub training_duration_secs: f64,
    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ModelRecord {
    /// A model in `training` status, before evaluation finishes.
    pub fn start_training(store_id: StoreId, model_type: ModelType, config: Value, now: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new(),
            store_id,
            name: format!("{} model", model_type.algorithm()),
            model_type,
            version: now.format("v%Y%m%d_%H%M%S").to_string(),
            config,
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            training_loss: 0.0,
            training_data_size: 0,
            features_used: model_type.features_used(),
            feature_importance: BTreeMap::new(),
            status: ModelStatus::Training,
            is_active: false,
            description: String::new(),
            trained_at: None,
            training_duration_secs: 0.0,
            last_used: None,
            created_at: now,
        }
    }

    /// Record evaluation results. The caller activates the model afterwards.
    pub fn complete_training(
        &mut self,
        metrics: &EvaluationMetrics,
        training_data_size: u64,
        weights: Option<HybridWeights>,
        duration_secs: f64,
        now: DateTime<Utc>,
    ) {
        self.accuracy = metrics.accuracy;
        self.precision = metrics.precision;
        self.recall = metrics.recall;
        self.f1_score = metrics.f1_score;
        self.training_loss = metrics.training_loss;
        self.training_data_size = training_data_size;
        self.feature_importance = weights.map(feature_importance).unwrap_or_default();
        self.description = if metrics.evaluated_users == 0 {
            "insufficient data for offline evaluation".to_string()
        } else {
            format!(
                "leave-last-out evaluation over {} shoppers at k={}",
                metrics.evaluated_users, metrics.k
            )
        };
        self.trained_at = Some(now);
        self.training_duration_secs = duration_secs;
        self.status = ModelStatus::Inactive;
    }

    pub fn fail(&mut self, reason: &str, now: DateTime<Utc>) {
        self.status = ModelStatus::Failed;
        self.is_active = false;
        self.description = reason.to_string();
        self.trained_at = Some(now);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_used = Some(now);
    }
}

impl Entity for ModelRecord {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn feature_importance(w: HybridWeights) -> BTreeMap<String, f64> {
    let total = w.collaborative + w.content + w.popularity;
    if total <= 0.0 {
        return BTreeMap::new();
    }
    BTreeMap::from([
        ("collaborative".to_string(), w.collaborative / total),
        ("content".to_string(), w.content / total),
        ("popularity".to_string(), w.popularity / total),
    ])
}

/// Activate `id` and deactivate every other model of the same type.
///
/// Returns the ids whose record changed. Failed models cannot be activated.
pub fn activate_model(models: &mut [ModelRecord], id: RecordId) -> DomainResult<Vec<RecordId>> {
    let target = models
        .iter()
        .find(|m| m.id == id)
        .ok_or_else(|| DomainError::not_found("model"))?;
    if target.status == ModelStatus::Failed {
        return Err(DomainError::invariant("a failed model cannot be activated"));
    }
    let (store, kind) = (target.store_id, target.model_type);

    let mut changed = Vec::new();
    for m in models.iter_mut().filter(|m| m.store_id == store && m.model_type == kind) {
        let activate = m.id == id;
        if m.is_active != activate || (activate && m.status != ModelStatus::Active) {
            changed.push(m.id);
        }
        m.is_active = activate;
        if activate {
            m.status = ModelStatus::Active;
        } else if m.status == ModelStatus::Active {
            m.status = ModelStatus::Inactive;
        }
    }
    Ok(changed)
}
