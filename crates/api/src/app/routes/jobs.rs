//! Job inspection and dead-letter recovery.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};

use storerec_infra::AppServices;
use storerec_infra::jobs::JobId;

use crate::app::{dto, errors};
use crate::context::StoreContext;

pub fn router() -> Router {
    Router::new()
        .route("/stats", get(stats))
        .route("/dead-letters", get(dead_letters))
        .route("/dead-letters/:id/retry", post(retry_dead_letter))
        .route("/:id", get(get_job))
}

pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond(StatusCode::OK, services.job_stats(store.store_id()))
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: JobId = match dto::parse_id(&id, "job") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.get_job(store.store_id(), id))
}

pub async fn dead_letters(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond_items(services.list_dead_letters(store.store_id()))
}

/// Move a dead-lettered job back to pending with a fresh attempt budget.
pub async fn retry_dead_letter(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: JobId = match dto::parse_id(&id, "job") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.retry_dead_letter(store.store_id(), id))
}
