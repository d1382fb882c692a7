//! Aggregates maintained by the workers: daily product views and behaviour
//! profiles.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path, Query, rejection::QueryRejection},
    http::StatusCode,
    routing::get,
};

use storerec_core::RecordId;
use storerec_infra::AppServices;

use crate::app::{dto, errors};
use crate::context::StoreContext;

pub fn product_views_router() -> Router {
    Router::new().route("/", get(list_product_views))
}

pub fn profiles_router() -> Router {
    Router::new()
        .route("/", get(list_profiles))
        .route("/:id", get(get_profile))
        .route("/:id/recommendations", get(profile_recommendations))
}

pub async fn list_product_views(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    query: Result<Query<dto::ProductViewsQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    errors::respond_items(services.list_product_views(store.store_id(), query.product, query.date))
}

pub async fn list_profiles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond_items(services.list_behavior_profiles(store.store_id()))
}

pub async fn get_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecordId = match dto::parse_id(&id, "behavior profile") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.get_behavior_profile(store.store_id(), id))
}

/// Active products from the profile's favourite categories.
pub async fn profile_recommendations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecordId = match dto::parse_id(&id, "behavior profile") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond_items(services.profile_recommendations(store.store_id(), id))
}
