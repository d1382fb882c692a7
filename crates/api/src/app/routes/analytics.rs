use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::get,
};

use storerec_core::RecordId;
use storerec_infra::AppServices;
use storerec_infra::services::DashboardQuery;

use crate::app::{dto, errors};
use crate::context::StoreContext;

pub fn router() -> Router {
    Router::new()
        .route("/metrics", get(list_metrics))
        .route("/dashboard", get(dashboard))
        .route("/reports", get(list_reports).post(generate_report))
        .route("/reports/:id", get(get_report))
}

pub async fn list_metrics(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond_items(services.list_daily_metrics(store.store_id()))
}

pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    query: Result<Query<DashboardQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.dashboard(store.store_id(), &query))
}

/// Generate a report from stored daily metrics; the body is optional.
pub async fn generate_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    body: Option<Json<dto::GenerateReportRequest>>,
) -> axum::response::Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    errors::respond(
        StatusCode::CREATED,
        services.generate_report(store.store_id(), body.report_type.as_deref()),
    )
}

pub async fn list_reports(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
) -> axum::response::Response {
    errors::respond_items(services.list_reports(store.store_id()))
}

pub async fn get_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(store): Extension<StoreContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecordId = match dto::parse_id(&id, "report") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.get_report(store.store_id(), id))
}
