use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::context::StoreContext;

pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "service": "storerec" })),
    )
}

pub async fn whoami(Extension(store): Extension<StoreContext>) -> impl IntoResponse {
    let store = store.store();
    Json(serde_json::json!({
        "store_id": store.id.to_string(),
        "name": store.name,
        "domain": store.domain,
        "platform": store.platform,
    }))
}
