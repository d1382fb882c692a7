//! Store provisioning, guarded by the admin token.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    routing::{patch, post},
};

use storerec_core::StoreId;
use storerec_infra::AppServices;
use storerec_tenancy::{NewStore, StorePatch};

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/stores", post(create_store).get(list_stores))
        .route("/stores/:id", patch(update_store))
}

pub async fn create_store(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<NewStore>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::CREATED, services.provision_store(body))
}

pub async fn list_stores(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    errors::respond_items(services.list_stores())
}

pub async fn update_store(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<StorePatch>, JsonRejection>,
) -> axum::response::Response {
    let id: StoreId = match dto::parse_id(&id, "store") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch = match dto::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.update_store(id, patch))
}
