//! Recommendation generation, feedback loops, configs and the model registry.

use std::time::Instant;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use storerec_analytics::RecommendationPerformance;
use storerec_catalog::Product;
use storerec_core::{CustomerId, DomainError, ProductId, RecommendationId, RecordId, StoreId};
use storerec_engine::request::clamp_max_results;
use storerec_engine::{
    Algorithm, Audience, EVALUATION_K, LocalRunner, ModelRecord, ModelType, NewFeedback, NewRecommendationConfig,
    Recommendation, RecommendationConfig, RecommendationFeedback, RecommendationFilter, RecommendationRequest,
    SimilarPair, SimilarProduct, SnapshotReader, TrendingProduct, TrendingWindow, UserRecommendationProfile,
    active_config, activate_model, compute_trending, content, evaluate, hybrid_weights, precompute_similar,
    recommender_for,
};

use super::{AppServices, RecordRepo, ServiceError, ServiceResult, invalid};
use crate::cache::{self, keys};
use crate::jobs::{JobId, JobKind};

const PREDICTION_LIMIT: usize = 10;
const RECOMMENDATION_RETENTION_DAYS: i64 = 30;

/// Input of one generation request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub algorithm: Option<Algorithm>,
}

impl GenerateRequest {
    /// Store product id the shopper is looking at, from `context.product_id`.
    fn context_product(&self) -> Option<&str> {
        self.context
            .as_ref()
            .and_then(|c| c.get("product_id"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchGenerateResult {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A product with the score that surfaced it.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendedProduct {
    pub product: Product,
    pub score: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionQuery {
    pub user_id: Option<String>,
    pub product_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum Prediction {
    User {
        user_id: String,
        recommendations: Vec<Recommendation>,
    },
    Product {
        product_id: String,
        similar_products: Vec<SimilarProduct>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingTicket {
    pub model_id: RecordId,
    pub job_id: JobId,
    pub model_type: ModelType,
}

/// Which counter a shopper response increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopperResponse {
    Impression,
    Click,
    Purchase,
}

impl AppServices {
    /// Recommendations for a shopper or session, served from cache when fresh.
    pub fn generate_recommendations(
        &self,
        store_id: StoreId,
        request: &GenerateRequest,
    ) -> ServiceResult<Vec<Recommendation>> {
        let now = self.now();
        let algorithm = request.algorithm.unwrap_or_default();
        let configs = self.repos.rec_configs.list(store_id)?;
        let config = active_config(&configs, algorithm);

        let customer = match request.user_id.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(user) => self.find_customer(store_id, user)?,
            None => None,
        };
        let session_key = request
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let session = match session_key.as_deref() {
            Some(key) => self.find_session(store_id, key)?,
            None => None,
        };
        let audience = Audience {
            customer_id: customer.as_ref().map(|c| c.id),
            session_key,
        };

        let max_results = clamp_max_results(request.max_results.or(config.map(|c| c.max_recommendations)));
        let cache_key = keys::recommendations(store_id, &audience, algorithm, max_results, request.context_product());
        if let Some(hit) = cache::get_json::<Vec<Recommendation>>(self.cache.as_ref(), &cache_key) {
            debug!(store = %store_id, key = %cache_key, "recommendation cache hit");
            return Ok(hit);
        }

        let context_product = match request.context_product() {
            Some(sku) => self.find_product(store_id, sku)?.map(|p| p.id),
            None => None,
        };
        let engine_request = RecommendationRequest::new(Some(max_results))
            .for_customer(audience.customer_id)
            .in_session(session.as_ref().map(|s| s.id))
            .viewing(context_product)
            .with_filter(config.map(|c| c.filters.clone()).unwrap_or_default());

        let snapshot = self.snapshot(store_id)?;
        let engine = recommender_for(algorithm, hybrid_weights(&configs));
        let scored = LocalRunner::for_store(store_id).run(engine.as_ref(), &snapshot, &engine_request)?;

        let context = request.context.clone().unwrap_or_else(|| json!({}));
        let existing = self.repos.recommendations.list(store_id)?;
        let mut out = Vec::with_capacity(scored.len());
        for (rank, item) in scored.iter().enumerate() {
            let fresh = Recommendation::from_scored(
                store_id,
                &audience,
                algorithm,
                item,
                rank as u32 + 1,
                context.clone(),
                self.settings.recommendation_ttl,
                now,
            );
            let record = match existing.iter().find(|r| r.same_slot(&fresh)) {
                Some(current) => {
                    let mut current = current.clone();
                    current.refresh_from(&fresh);
                    current
                }
                None => fresh,
            };
            self.repos.recommendations.save(store_id, &record)?;
            out.push(record);
        }

        self.mark_model_used(store_id, algorithm)?;
        cache::set_json(self.cache.as_ref(), &cache_key, &out, self.settings.cache_ttl);
        debug!(store = %store_id, algorithm = %algorithm, count = out.len(), "recommendations generated");
        Ok(out)
    }

    fn mark_model_used(&self, store_id: StoreId, algorithm: Algorithm) -> ServiceResult<()> {
        let Some(model_type) = ModelType::for_algorithm(algorithm) else {
            return Ok(());
        };
        let active = self
            .repos
            .models
            .list(store_id)?
            .into_iter()
            .find(|m| m.model_type == model_type && m.is_active);
        if let Some(mut model) = active {
            model.touch(self.now());
            self.repos.models.save(store_id, &model)?;
        }
        Ok(())
    }

    /// Run every request; a failing one reports its error in place.
    pub fn batch_generate_recommendations(
        &self,
        store_id: StoreId,
        requests: Vec<GenerateRequest>,
    ) -> ServiceResult<Vec<BatchGenerateResult>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let (recommendations, error) = match self.generate_recommendations(store_id, &request) {
                Ok(recs) => (recs, None),
                Err(ServiceError::Storage(e)) => return Err(ServiceError::Storage(e)),
                Err(e) => (Vec::new(), Some(e.to_string())),
            };
            results.push(BatchGenerateResult {
                user_id: request.user_id,
                session_id: request.session_id,
                recommendations,
                error,
            });
        }
        Ok(results)
    }

    pub fn record_response(
        &self,
        store_id: StoreId,
        id: RecommendationId,
        response: ShopperResponse,
    ) -> ServiceResult<Recommendation> {
        let mut recommendation = self.get_recommendation(store_id, id)?;
        match response {
            ShopperResponse::Impression => recommendation.record_impression(),
            ShopperResponse::Click => recommendation.record_click(),
            ShopperResponse::Purchase => recommendation.record_purchase(),
        }
        self.repos.recommendations.save(store_id, &recommendation)?;
        if let Some(customer_id) = recommendation.customer_id {
            self.refresh_user_recommendation_profile(store_id, customer_id)?;
        }
        Ok(recommendation)
    }

    pub(crate) fn refresh_user_recommendation_profile(
        &self,
        store_id: StoreId,
        customer_id: CustomerId,
    ) -> ServiceResult<UserRecommendationProfile> {
        let existing = self
            .repos
            .user_rec_profiles
            .list(store_id)?
            .into_iter()
            .find(|p| p.customer_id == customer_id)
            .map(|p| p.id);
        let recommendations = self.repos.recommendations.list(store_id)?;
        let profile =
            UserRecommendationProfile::compute(store_id, customer_id, existing, &recommendations, self.now());
        self.repos.user_rec_profiles.save(store_id, &profile)?;
        Ok(profile)
    }

    pub fn list_recommendations(
        &self,
        store_id: StoreId,
        filter: &RecommendationFilter,
    ) -> ServiceResult<Vec<Recommendation>> {
        Ok(filter.apply(self.repos.recommendations.list(store_id)?, self.now()))
    }

    pub fn get_recommendation(&self, store_id: StoreId, id: RecommendationId) -> ServiceResult<Recommendation> {
        self.repos.recommendations.require(store_id, &id, "recommendation")
    }

    pub fn delete_recommendation(&self, store_id: StoreId, id: RecommendationId) -> ServiceResult<()> {
        let recommendation = self.get_recommendation(store_id, id)?;
        self.repos.recommendations.remove(store_id, &id)?;
        self.invalidate_audience(
            store_id,
            recommendation.customer_id,
            recommendation.session_key.as_deref(),
        );
        Ok(())
    }

    /// Content similarity for a store product id; results are kept as
    /// precomputed pairs.
    pub fn similar_products(
        &self,
        store_id: StoreId,
        store_product_id: Option<&str>,
        max_results: Option<usize>,
    ) -> ServiceResult<Vec<RecommendedProduct>> {
        let sku = store_product_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("product_id parameter is required"))?;
        let source = self
            .find_product(store_id, sku)?
            .ok_or_else(|| DomainError::not_found("product"))?;

        let snapshot = self.snapshot(store_id)?;
        let request = RecommendationRequest::new(max_results).viewing(Some(source.id));
        let scored = content::similar_to(&snapshot, &source.id, &request);

        let now = self.now();
        let mut stored = self.repos.similar_products.list(store_id)?;
        let mut out = Vec::with_capacity(scored.len());
        for item in scored {
            let existing = stored
                .iter()
                .find(|s| s.same_pair(source.id, item.product_id))
                .map(|s| s.id);
            let row = SimilarProduct::new(
                store_id,
                SimilarPair {
                    product_id: source.id,
                    similar_product_id: item.product_id,
                    similarity_score: item.score,
                    similarity_type: "content_based".to_string(),
                    features_used: vec!["category".to_string(), "price".to_string()],
                },
                existing,
                now,
            );
            self.repos.similar_products.save(store_id, &row)?;
            stored.push(row);
            if let Some(product) = self.repos.products.get(store_id, &item.product_id)? {
                out.push(RecommendedProduct {
                    product,
                    score: item.score,
                    explanation: item.explanation,
                });
            }
        }
        Ok(out)
    }

    /// Precomputed similar pairs, optionally for one source product.
    pub fn list_similar_products(
        &self,
        store_id: StoreId,
        product: Option<ProductId>,
    ) -> ServiceResult<Vec<SimilarProduct>> {
        let mut rows: Vec<SimilarProduct> = self
            .repos
            .similar_products
            .list(store_id)?
            .into_iter()
            .filter(|r| product.is_none_or(|p| r.pair.product_id == p))
            .collect();
        rows.sort_by(|a, b| {
            b.pair
                .similarity_score
                .total_cmp(&a.pair.similarity_score)
                .then(a.pair.similar_product_id.cmp(&b.pair.similar_product_id))
        });
        Ok(rows)
    }

    pub fn trending_products(
        &self,
        store_id: StoreId,
        window: Option<&str>,
        max_results: Option<usize>,
    ) -> ServiceResult<Vec<TrendingProduct>> {
        let window: TrendingWindow = match window.filter(|w| !w.is_empty()) {
            Some(w) => w.parse()?,
            None => TrendingWindow::default(),
        };
        let mut rows: Vec<TrendingProduct> = self
            .repos
            .trending
            .list(store_id)?
            .into_iter()
            .filter(|r| r.in_window(window))
            .collect();
        rows.sort_by(|a, b| {
            b.entry
                .trend_score
                .total_cmp(&a.entry.trend_score)
                .then(a.entry.product_id.cmp(&b.entry.product_id))
        });
        rows.truncate(clamp_max_results(max_results));
        Ok(rows)
    }

    pub fn recommendation_performance(
        &self,
        store_id: StoreId,
        days: Option<i64>,
    ) -> ServiceResult<RecommendationPerformance> {
        Ok(storerec_analytics::performance(
            store_id,
            &self.repos.recommendations.list(store_id)?,
            self.now(),
            days.unwrap_or(30).max(1),
        ))
    }

    // Feedback

    pub fn create_feedback(&self, store_id: StoreId, input: NewFeedback) -> ServiceResult<RecommendationFeedback> {
        let recommendation = self.get_recommendation(store_id, input.recommendation_id)?;
        let feedback = RecommendationFeedback::create(store_id, &recommendation, input, self.now())?;
        self.repos.feedback.save(store_id, &feedback)?;
        Ok(feedback)
    }

    pub fn list_feedback(&self, store_id: StoreId) -> ServiceResult<Vec<RecommendationFeedback>> {
        let mut feedback = self.repos.feedback.list(store_id)?;
        feedback.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(feedback)
    }

    // Configs

    pub fn list_rec_configs(&self, store_id: StoreId) -> ServiceResult<Vec<RecommendationConfig>> {
        let mut configs = self.repos.rec_configs.list(store_id)?;
        configs.sort_by_key(|c| c.algorithm);
        Ok(configs)
    }

    pub fn get_rec_config(&self, store_id: StoreId, id: RecordId) -> ServiceResult<RecommendationConfig> {
        self.repos.rec_configs.require(store_id, &id, "recommendation config")
    }

    pub fn create_rec_config(
        &self,
        store_id: StoreId,
        input: NewRecommendationConfig,
    ) -> ServiceResult<RecommendationConfig> {
        let _guard = self.guards.store(store_id);
        if self
            .repos
            .rec_configs
            .list(store_id)?
            .iter()
            .any(|c| c.algorithm == input.algorithm)
        {
            return Err(DomainError::conflict(format!("a config for '{}' already exists", input.algorithm)).into());
        }
        let config = RecommendationConfig::create(store_id, input, self.now())?;
        self.repos.rec_configs.save(store_id, &config)?;
        self.drop_recommendation_cache(store_id);
        Ok(config)
    }

    pub fn update_rec_config(
        &self,
        store_id: StoreId,
        id: RecordId,
        input: NewRecommendationConfig,
    ) -> ServiceResult<RecommendationConfig> {
        let mut config = self.get_rec_config(store_id, id)?;
        config.update(input, self.now())?;
        self.repos.rec_configs.save(store_id, &config)?;
        self.drop_recommendation_cache(store_id);
        Ok(config)
    }

    pub fn delete_rec_config(&self, store_id: StoreId, id: RecordId) -> ServiceResult<()> {
        if !self.repos.rec_configs.remove(store_id, &id)? {
            return Err(DomainError::not_found("recommendation config").into());
        }
        self.drop_recommendation_cache(store_id);
        Ok(())
    }

    fn drop_recommendation_cache(&self, store_id: StoreId) {
        cache::invalidate(self.cache.as_ref(), &keys::all_recommendations_prefix(store_id));
    }

    // Profiles

    pub fn list_user_rec_profiles(&self, store_id: StoreId) -> ServiceResult<Vec<UserRecommendationProfile>> {
        let mut profiles = self.repos.user_rec_profiles.list(store_id)?;
        profiles.sort_by(|a, b| b.profile_updated_at.cmp(&a.profile_updated_at));
        Ok(profiles)
    }

    pub fn get_user_rec_profile(&self, store_id: StoreId, id: RecordId) -> ServiceResult<UserRecommendationProfile> {
        self.repos.user_rec_profiles.require(store_id, &id, "user recommendation profile")
    }

    // Models

    pub fn list_models(&self, store_id: StoreId) -> ServiceResult<Vec<ModelRecord>> {
        let mut models = self.repos.models.list(store_id)?;
        models.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(models)
    }

    pub fn get_model(&self, store_id: StoreId, id: RecordId) -> ServiceResult<ModelRecord> {
        self.repos.models.require(store_id, &id, "model")
    }

    /// Register a model in training and queue its evaluation.
    pub fn train_model(&self, store_id: StoreId, model_type: &str, config: Option<Value>) -> ServiceResult<TrainingTicket> {
        let model_type: ModelType = model_type.trim().parse()?;
        let model = ModelRecord::start_training(store_id, model_type, config.unwrap_or_else(|| json!({})), self.now());
        self.repos.models.save(store_id, &model)?;
        let job_id = self.enqueue(
            store_id,
            JobKind::TrainModel,
            json!({ "model_id": model.id, "model_type": model_type }),
        )?;
        info!(store = %store_id, model = %model.id, %job_id, "model training queued");
        Ok(TrainingTicket {
            model_id: model.id,
            job_id,
            model_type,
        })
    }

    pub fn activate_model(&self, store_id: StoreId, id: RecordId) -> ServiceResult<ModelRecord> {
        let mut models = self.repos.models.list(store_id)?;
        let changed = activate_model(&mut models, id)?;
        let mut activated = None;
        for model in models {
            if changed.contains(&model.id) {
                self.repos.models.save(store_id, &model)?;
            }
            if model.id == id {
                activated = Some(model);
            }
        }
        activated.ok_or_else(|| DomainError::not_found("model").into())
    }

    pub fn predictions(&self, store_id: StoreId, query: &PredictionQuery) -> ServiceResult<Prediction> {
        let now = self.now();
        if let Some(user_id) = query.user_id.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            let customer = self
                .find_customer(store_id, user_id)?
                .ok_or_else(|| DomainError::not_found("user"))?;
            let mut recommendations: Vec<Recommendation> = self
                .repos
                .recommendations
                .list(store_id)?
                .into_iter()
                .filter(|r| r.customer_id == Some(customer.id) && !r.is_expired(now))
                .collect();
            recommendations.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.rank.cmp(&b.rank)));
            recommendations.truncate(PREDICTION_LIMIT);
            return Ok(Prediction::User {
                user_id: user_id.to_string(),
                recommendations,
            });
        }

        if let Some(sku) = query.product_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            let product = self
                .find_product(store_id, sku)?
                .ok_or_else(|| DomainError::not_found("product"))?;
            let mut similar_products = self.list_similar_products(store_id, Some(product.id))?;
            similar_products.truncate(PREDICTION_LIMIT);
            return Ok(Prediction::Product {
                product_id: sku.to_string(),
                similar_products,
            });
        }

        Err(invalid("user_id or product_id parameter is required"))
    }

    // Background work

    /// Evaluate a model in training, then activate it.
    pub fn run_training(&self, store_id: StoreId, model_id: RecordId) -> ServiceResult<ModelRecord> {
        let mut model = self.get_model(store_id, model_id)?;
        let started = Instant::now();
        let snapshot = match self.snapshot(store_id) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                model.fail(&e.to_string(), self.now());
                self.repos.models.save(store_id, &model)?;
                return Err(e.into());
            }
        };

        let weights = hybrid_weights(&self.repos.rec_configs.list(store_id)?);
        let engine = recommender_for(model.model_type.algorithm(), weights);
        let metrics = evaluate(engine.as_ref(), &snapshot, EVALUATION_K);
        model.complete_training(
            &metrics,
            snapshot.interactions.len() as u64,
            (model.model_type == ModelType::Hybrid).then_some(weights),
            started.elapsed().as_secs_f64(),
            self.now(),
        );
        self.repos.models.save(store_id, &model)?;
        info!(
            store = %store_id,
            model = %model.id,
            evaluated = metrics.evaluated_users,
            recall = metrics.recall,
            "model trained"
        );
        self.activate_model(store_id, model.id)
    }

    /// Recompute every trending window; rows that dropped out are removed.
    pub fn refresh_trending(&self, store_id: StoreId) -> ServiceResult<usize> {
        let snapshot = self.snapshot(store_id)?;
        let now = self.now();
        let stored = self.repos.trending.list(store_id)?;
        let mut written = 0;
        for window in TrendingWindow::ALL {
            let entries = compute_trending(&snapshot, window);
            for row in stored.iter().filter(|r| r.in_window(window)) {
                if !entries.iter().any(|e| e.product_id == row.entry.product_id) {
                    self.repos.trending.remove(store_id, &row.id)?;
                }
            }
            for entry in entries {
                let existing = stored
                    .iter()
                    .find(|r| r.in_window(window) && r.entry.product_id == entry.product_id)
                    .map(|r| r.id);
                self.repos
                    .trending
                    .save(store_id, &TrendingProduct::new(store_id, entry, existing, now))?;
                written += 1;
            }
        }
        debug!(store = %store_id, written, "trending refreshed");
        Ok(written)
    }

    /// Precompute similar pairs for the whole catalog.
    pub fn precompute_similar_products(&self, store_id: StoreId) -> ServiceResult<usize> {
        let snapshot = self.snapshot(store_id)?;
        let now = self.now();
        let stored = self.repos.similar_products.list(store_id)?;
        let pairs = precompute_similar(&snapshot);
        let count = pairs.len();
        for pair in pairs {
            let existing = stored
                .iter()
                .find(|s| s.same_pair(pair.product_id, pair.similar_product_id))
                .map(|s| s.id);
            self.repos
                .similar_products
                .save(store_id, &SimilarProduct::new(store_id, pair, existing, now))?;
        }
        debug!(store = %store_id, pairs = count, "similar products precomputed");
        Ok(count)
    }

    /// Drop expired recommendations and those past the retention window.
    pub fn cleanup_recommendations(&self, store_id: StoreId) -> ServiceResult<usize> {
        let now = self.now();
        let cutoff = now - Duration::days(RECOMMENDATION_RETENTION_DAYS);
        let mut removed = 0;
        for r in self.repos.recommendations.list(store_id)? {
            if (r.is_expired(now) || r.created_at < cutoff) && self.repos.recommendations.remove(store_id, &r.id)? {
                removed += 1;
            }
        }
        if removed > 0 {
            self.drop_recommendation_cache(store_id);
            info!(store = %store_id, removed, "stale recommendations removed");
        }
        Ok(removed)
    }
}
