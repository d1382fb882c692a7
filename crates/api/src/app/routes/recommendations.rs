//! Recommendation generation, stored results, feedback and per-store
//! algorithm configuration.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use storerec_core::{RecommendationId, RecordId};
use storerec_engine::{NewFeedback, NewRecommendationConfig, RecommendationFilter};
use storerec_infra::AppServices;
use storerec_infra::services::{GenerateRequest, ShopperResponse};

use crate::app::{dto, errors};
use crate::context::StoreContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_recommendations))
        .route("/generate", post(generate))
        .route("/batch-generate", post(batch_generate))
        .route("/similar-products", get(similar_products))
        .route("/trending", get(trending))
        .route("/performance", get(performance))
        .route("/similar", get(list_similar))
        .route("/feedback", get(list_feedback).post(create_feedback))
        .route("/configs", get(list_configs).post(create_config))
        .route("/configs/:id", get(get_config).patch(update_config).delete(delete_config))
        .route("/user-profiles", get(list_user_profiles))
        .route("/user-profiles/:id", get(get_user_profile))
        .route("/:id", get(get_recommendation).delete(delete_recommendation))
        .route("/:id/impression", post(impression))
        .route("/:id/click", post(click))
        .route("/:id/purchase", post(purchase))
}

pub async fn generate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond_items(services.generate_recommendations(store.store_id(), &request))
}

pub async fn batch_generate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Result<Json<dto::BatchGenerateRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond_items(services.batch_generate_recommendations(store.store_id(), body.requests))
}

pub async fn list_recommendations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    filter: Result<Query<RecommendationFilter>, QueryRejection>,
) -> axum::response::Response {
    let filter = match dto::query(filter) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    errors::respond_items(services.list_recommendations(store.store_id(), &filter))
}

pub async fn get_recommendation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecommendationId = match dto::parse_id(&id, "recommendation") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.get_recommendation(store.store_id(), id))
}

pub async fn delete_recommendation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecommendationId = match dto::parse_id(&id, "recommendation") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.delete_recommendation(store.store_id(), id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn impression(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    record_response(&services, &store, &id, ShopperResponse::Impression)
}

pub async fn click(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    record_response(&services, &store, &id, ShopperResponse::Click)
}

pub async fn purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    record_response(&services, &store, &id, ShopperResponse::Purchase)
}

fn record_response(
    services: &AppServices,
    store: &StoreContext,
    raw_id: &str,
    response: ShopperResponse,
) -> axum::response::Response {
    let id: RecommendationId = match dto::parse_id(raw_id, "recommendation") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.record_response(store.store_id(), id, response))
}

/// Products similar to `product_id` (the store's own product id).
pub async fn similar_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    query: Result<Query<dto::SimilarProductsQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    errors::respond_items(services.similar_products(
        store.store_id(),
        query.product_id.as_deref(),
        query.max_results,
    ))
}

pub async fn list_similar(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    query: Result<Query<dto::SimilarListQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    errors::respond_items(services.list_similar_products(store.store_id(), query.product))
}

pub async fn trending(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    query: Result<Query<dto::TrendingQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    errors::respond_items(services.trending_products(
        store.store_id(),
        query.window.as_deref(),
        query.max_results,
    ))
}

pub async fn performance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    query: Result<Query<dto::DaysQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    errors::respond(
        StatusCode::OK,
        services.recommendation_performance(store.store_id(), query.days),
    )
}

pub async fn create_feedback(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Result<Json<NewFeedback>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::CREATED, services.create_feedback(store.store_id(), body))
}

pub async fn list_feedback(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond_items(services.list_feedback(store.store_id()))
}

pub async fn list_configs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond_items(services.list_rec_configs(store.store_id()))
}

pub async fn create_config(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Result<Json<NewRecommendationConfig>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::CREATED, services.create_rec_config(store.store_id(), body))
}

pub async fn get_config(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecordId = match dto::parse_id(&id, "recommendation config") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.get_rec_config(store.store_id(), id))
}

pub async fn update_config(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
    body: Result<Json<NewRecommendationConfig>, JsonRejection>,
) -> axum::response::Response {
    let id: RecordId = match dto::parse_id(&id, "recommendation config") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.update_rec_config(store.store_id(), id, body))
}

pub async fn delete_config(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecordId = match dto::parse_id(&id, "recommendation config") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.delete_rec_config(store.store_id(), id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_user_profiles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond_items(services.list_user_rec_profiles(store.store_id()))
}

pub async fn get_user_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecordId = match dto::parse_id(&id, "user recommendation profile") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.get_user_rec_profile(store.store_id(), id))
}
