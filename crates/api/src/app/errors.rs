use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::json;
use tracing::error;

use storerec_core::DomainError;
use storerec_engine::EngineError;
use storerec_infra::ServiceError;
use storerec_infra::jobs::JobStoreError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
    }
}

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Engine(EngineError::InvalidInput(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        ServiceError::Engine(e) => {
            error!(error = %e, "recommendation engine failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "engine_error", e.to_string())
        }
        ServiceError::Storage(e) => {
            error!(error = %e, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", e.to_string())
        }
        ServiceError::Jobs(JobStoreError::NotFound(_) | JobStoreError::StoreIsolation) => {
            json_error(StatusCode::NOT_FOUND, "not_found", "job not found")
        }
        ServiceError::Jobs(JobStoreError::AlreadyExists(id)) => {
            json_error(StatusCode::CONFLICT, "conflict", format!("job {id} already exists"))
        }
        ServiceError::Jobs(e @ JobStoreError::Storage(_)) => {
            error!(error = %e, "job store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "job_store_error", e.to_string())
        }
    }
}

/// Render a service result as JSON with `status`, or its error.
pub fn respond<T: Serialize>(status: StatusCode, result: Result<T, ServiceError>) -> axum::response::Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(e) => service_error_to_response(e),
    }
}

/// Render a listing as `{"count": n, "items": [...]}`.
pub fn respond_items<T: Serialize>(result: Result<Vec<T>, ServiceError>) -> axum::response::Response {
    match result {
        Ok(items) => (
            StatusCode::OK,
            axum::Json(json!({ "count": items.len(), "items": items })),
        )
            .into_response(),
        Err(e) => service_error_to_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (DomainError::validation("x"), StatusCode::BAD_REQUEST),
            (DomainError::invalid_id("x"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("store"), StatusCode::NOT_FOUND),
            (DomainError::conflict("x"), StatusCode::CONFLICT),
            (DomainError::invariant("x"), StatusCode::UNPROCESSABLE_ENTITY),
        ];
        for (err, status) in cases {
            assert_eq!(domain_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn job_lookups_outside_the_store_are_not_found() {
        let resp = service_error_to_response(ServiceError::Jobs(JobStoreError::StoreIsolation));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
