//! Interaction ingestion and the analytics over it.

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

use storerec_core::InteractionId;
use storerec_infra::AppServices;
use storerec_tracking::{InteractionFilter, NewInteraction};

use crate::app::{dto, errors};
use crate::context::StoreContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_interactions).post(record_interaction))
        .route("/bulk", post(bulk_record))
        .route("/analytics", get(analytics))
        .route("/popular-products", get(popular_products))
        .route("/user-activity", get(user_activity))
        .route("/:id", get(get_interaction))
}

pub async fn record_interaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Result<Json<NewInteraction>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::CREATED, services.record_interaction(store.store_id(), body))
}

pub async fn bulk_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Result<Json<dto::BulkInteractionsRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(
        StatusCode::CREATED,
        services.bulk_record_interactions(store.store_id(), body.interactions),
    )
}

pub async fn list_interactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    filter: Result<Query<InteractionFilter>, QueryRejection>,
) -> axum::response::Response {
    let filter = match dto::query(filter) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    errors::respond_items(services.list_interactions(store.store_id(), &filter))
}

pub async fn get_interaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InteractionId = match dto::parse_id(&id, "interaction") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.get_interaction(store.store_id(), id))
}

pub async fn analytics(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    query: Result<Query<dto::InteractionAnalyticsQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    errors::respond(
        StatusCode::OK,
        services.interaction_analytics(
            store.store_id(),
            query.date_range.as_deref(),
            query.interaction_type.as_deref(),
            query.group_by.as_deref(),
        ),
    )
}

pub async fn popular_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    query: Result<Query<dto::DaysQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    errors::respond_items(services.popular_products(store.store_id(), query.days))
}

pub async fn user_activity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    query: Result<Query<dto::UserQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    errors::respond(
        StatusCode::OK,
        services.user_activity(store.store_id(), query.user_id.as_deref()),
    )
}
