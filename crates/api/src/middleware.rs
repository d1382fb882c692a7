use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::HeaderMap, http::StatusCode, middleware::Next, response::Response};
use tracing::{debug, info, warn};

use storerec_infra::AppServices;

use crate::app::errors;
use crate::context::StoreContext;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct AuthState {
    pub services: Arc<AppServices>,
    pub admin_token: Arc<str>,
}

/// Resolve `X-API-Key` to an active store and attach its context.
pub async fn api_key_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let presented = match extract_api_key(req.headers()) {
        Some(key) => key.to_string(),
        None => return errors::json_error(StatusCode::UNAUTHORIZED, "missing_api_key", "API key is required"),
    };

    let store = match state.services.authenticate(&presented) {
        Ok(Some(store)) => store,
        Ok(None) => {
            return errors::json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                "Invalid API key or store is inactive",
            );
        }
        Err(e) => return errors::service_error_to_response(e),
    };

    debug!(store = %store.id, path = %req.uri().path(), "request authenticated");
    req.extensions_mut().insert(StoreContext::new(store));
    next.run(req).await
}

/// Guard store provisioning behind the admin bearer token.
pub async fn admin_middleware(
    State(state): State<AuthState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    match extract_bearer(req.headers()) {
        Some(token) if token == &*state.admin_token => next.run(req).await,
        Some(_) => errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid admin token"),
        None => errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "admin token is required"),
    }
}

/// One log line per request with status and latency.
pub async fn request_log(req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let resp = next.run(req).await;
    let status = resp.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if resp.status().is_server_error() {
        warn!(%method, %path, status, elapsed_ms, "request failed");
    } else {
        info!(%method, %path, status, elapsed_ms, "request");
    }
    resp
}

fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn api_key_header_is_trimmed_and_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_api_key(&headers), None);
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("  sk_abc "));
        assert_eq!(extract_api_key(&headers), Some("sk_abc"));
    }

    #[test]
    fn bearer_requires_scheme_and_token() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(extract_bearer(&headers), None);
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer(&headers), None);
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer admin"));
        assert_eq!(extract_bearer(&headers), Some("admin"));
    }
}
