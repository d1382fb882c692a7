//! Raw tracking events, converted into interactions by the workers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{get, post},
};

use storerec_infra::AppServices;
use storerec_tracking::NewEvent;

use crate::app::{dto, errors};
use crate::context::StoreContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/batch", post(create_events))
}

pub async fn create_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Result<Json<NewEvent>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::CREATED, services.create_event(store.store_id(), body))
}

pub async fn create_events(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Result<Json<dto::BatchEventsRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::CREATED, services.create_events(store.store_id(), body.events))
}

pub async fn list_events(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    query: Result<Query<dto::EventsQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    errors::respond_items(services.list_events(store.store_id(), query.processed))
}
