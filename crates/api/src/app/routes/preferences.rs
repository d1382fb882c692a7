use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::get,
};

use storerec_customers::NewPreference;
use storerec_infra::AppServices;

use crate::app::{dto, errors};
use crate::context::StoreContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_preferences).post(upsert_preference))
        .route("/popular-categories", get(popular_categories))
}

pub async fn list_preferences(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    query: Result<Query<dto::PreferenceQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    errors::respond_items(services.list_preferences(store.store_id(), query.user))
}

/// Create the preference, or raise the existing score for the same category.
pub async fn upsert_preference(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Result<Json<NewPreference>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::CREATED, services.upsert_preference(store.store_id(), body))
}

pub async fn popular_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond_items(services.popular_categories(store.store_id()))
}
