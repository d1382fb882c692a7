//! Store shoppers.

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

use storerec_core::CustomerId;
use storerec_customers::{CustomerFilter, CustomerPatch, NewCustomer};
use storerec_infra::AppServices;

use crate::app::{dto, errors};
use crate::context::StoreContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/stats", get(stats))
        .route("/segments", get(segments))
        .route("/:id", get(get_user).patch(update_user).delete(delete_user))
        .route("/:id/interactions", get(history))
        .route("/:id/touch", post(touch))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    filter: Result<Query<CustomerFilter>, QueryRejection>,
) -> axum::response::Response {
    let filter = match dto::query(filter) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    errors::respond_items(services.list_customers(store.store_id(), &filter))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Result<Json<NewCustomer>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::CREATED, services.create_customer(store.store_id(), body))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CustomerId = match dto::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.get_customer(store.store_id(), id))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
    body: Result<Json<CustomerPatch>, JsonRejection>,
) -> axum::response::Response {
    let id: CustomerId = match dto::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.update_customer(store.store_id(), id, patch))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CustomerId = match dto::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.delete_customer(store.store_id(), id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Most recent interactions of one shopper.
pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CustomerId = match dto::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond_items(services.customer_history(store.store_id(), id))
}

pub async fn touch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CustomerId = match dto::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.touch_customer(store.store_id(), id))
}

pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond(StatusCode::OK, services.customer_stats(store.store_id()))
}

pub async fn segments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond_items(services.customer_segments(store.store_id()))
}
