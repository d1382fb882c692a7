use axum::{Router, routing::get};

pub mod admin;
pub mod analytics;
pub mod behavior;
pub mod events;
pub mod interactions;
pub mod jobs;
pub mod models;
pub mod preferences;
pub mod products;
pub mod recommendations;
pub mod sessions;
pub mod store;
pub mod system;
pub mod users;

/// Router for all API-key (store-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/store", store::router())
        .nest("/api-keys", store::api_keys_router())
        .nest("/products", products::router())
        .nest("/users", users::router())
        .nest("/preferences", preferences::router())
        .nest("/interactions", interactions::router())
        .nest("/sessions", sessions::router())
        .nest("/product-views", behavior::product_views_router())
        .nest("/behavior-profiles", behavior::profiles_router())
        .nest("/ab-tests", ab_tests::router())
        .nest("/events", events::router())
        .nest("/recommendations", recommendations::router())
        .nest("/models", models::router())
        .nest("/analytics", analytics::router())
        .nest("/jobs", jobs::router())
}
