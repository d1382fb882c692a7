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

use storerec_catalog::{NewProduct, ProductFilter, ProductPatch};
use storerec_core::ProductId;
use storerec_infra::AppServices;

use crate::app::{dto, errors};
use crate::context::StoreContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/bulk", post(bulk_create_products))
        .route("/categories", get(categories))
        .route("/brands", get(brands))
        .route("/stats", get(stats))
        .route("/search", get(search))
        .route("/:id", get(get_product).patch(update_product).delete(delete_product))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    filter: Result<Query<ProductFilter>, QueryRejection>,
) -> axum::response::Response {
    let filter = match dto::query(filter) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    errors::respond_items(services.list_products(store.store_id(), &filter))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Result<Json<NewProduct>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::CREATED, services.create_product(store.store_id(), body))
}

pub async fn bulk_create_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Result<Json<dto::BulkProductsRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(
        StatusCode::CREATED,
        services.bulk_create_products(store.store_id(), body.products),
    )
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match dto::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.get_product(store.store_id(), id))
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
    body: Result<Json<ProductPatch>, JsonRejection>,
) -> axum::response::Response {
    let id: ProductId = match dto::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.update_product(store.store_id(), id, patch))
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match dto::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.delete_product(store.store_id(), id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond_items(services.product_categories(store.store_id()))
}

pub async fn brands(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond_items(services.product_brands(store.store_id()))
}

pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond(StatusCode::OK, services.catalog_stats(store.store_id()))
}

pub async fn search(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    query: Result<Query<dto::SearchQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    errors::respond_items(services.search_products(store.store_id(), query.q.as_deref().unwrap_or_default()))
}
