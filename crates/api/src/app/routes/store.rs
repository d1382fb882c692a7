//! The calling store and its API keys.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, patch, post},
};
use serde_json::Value;

use storerec_core::RecordId;
use storerec_infra::AppServices;

use crate::app::{dto, errors};
use crate::context::StoreContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_store))
        .route("/config", patch(update_config))
        .route("/regenerate-api-key", post(regenerate_store_key))
}

pub fn api_keys_router() -> Router {
    Router::new()
        .route("/", get(list_api_keys).post(create_api_key))
        .route("/:id/regenerate", post(regenerate_api_key))
        .route("/:id/deactivate", post(deactivate_api_key))
}

pub async fn get_store(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond(StatusCode::OK, services.get_store(store.store_id()))
}

pub async fn update_config(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> axum::response::Response {
    let patch = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.update_store_config(store.store_id(), patch))
}

pub async fn regenerate_store_key(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond(StatusCode::OK, services.regenerate_store_key(store.store_id()))
}

pub async fn list_api_keys(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond_items(services.list_api_keys(store.store_id()))
}

pub async fn create_api_key(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Result<Json<dto::CreateApiKeyRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::CREATED, services.create_api_key(store.store_id(), &body.name))
}

pub async fn regenerate_api_key(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecordId = match dto::parse_id(&id, "api key") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.regenerate_api_key(store.store_id(), id))
}

pub async fn deactivate_api_key(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecordId = match dto::parse_id(&id, "api key") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.deactivate_api_key(store.store_id(), id))
}
