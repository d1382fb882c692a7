//! Router assembly.
//!
//! - `services.rs`: picks Postgres or memory for records, Redis or memory for the cache
//! - `routes/`: one file per resource area
//! - `dto.rs`: request bodies, query strings, extraction helpers
//! - `errors.rs`: error-to-response mapping

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use storerec_infra::AppServices;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// The whole HTTP surface: `/health`, `/admin` behind the admin token, the
/// rest behind a store API key.
pub fn build_app(services: Arc<AppServices>, admin_token: impl Into<Arc<str>>) -> Router {
    let auth_state = middleware::AuthState {
        services: services.clone(),
        admin_token: admin_token.into(),
    };

    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state.clone(),
            middleware::api_key_middleware,
        ));

    let admin = routes::admin::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(auth_state, middleware::admin_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/admin", admin)
        .merge(protected)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::request_log)))
}
