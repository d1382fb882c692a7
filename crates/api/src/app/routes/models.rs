use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{get, post},
};

use storerec_core::RecordId;
use storerec_infra::AppServices;
use storerec_infra::services::PredictionQuery;

use crate::app::{dto, errors};
use crate::context::StoreContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_models))
        .route("/train", post(train))
        .route("/predictions", get(predictions))
        .route("/:id", get(get_model))
        .route("/:id/activate", post(activate))
}

pub async fn list_models(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond_items(services.list_models(store.store_id()))
}

pub async fn get_model(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecordId = match dto::parse_id(&id, "model") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.get_model(store.store_id(), id))
}

/// Register a model and queue its training; answers 202 with the job id.
pub async fn train(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Result<Json<dto::TrainModelRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(
        StatusCode::ACCEPTED,
        services.train_model(store.store_id(), &body.model_type, body.config),
    )
}

pub async fn activate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecordId = match dto::parse_id(&id, "model") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.activate_model(store.store_id(), id))
}

pub async fn predictions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    query: Result<Query<PredictionQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.predictions(store.store_id(), &query))
}
