use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Json, Query};
use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use storerec_catalog::NewProduct;
use storerec_core::{CustomerId, ProductId};
use storerec_infra::services::GenerateRequest;
use storerec_tracking::{NewEvent, NewInteraction};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkProductsRequest {
    pub products: Vec<NewProduct>,
}

#[derive(Debug, Deserialize)]
pub struct BulkInteractionsRequest {
    pub interactions: Vec<NewInteraction>,
}

#[derive(Debug, Deserialize)]
pub struct BatchEventsRequest {
    pub events: Vec<NewEvent>,
}

#[derive(Debug, Deserialize)]
pub struct BatchGenerateRequest {
    pub requests: Vec<GenerateRequest>,
}

#[derive(Debug, Deserialize)]
pub struct TrainModelRequest {
    pub model_type: String,
    #[serde(default)]
    pub config: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateReportRequest {
    #[serde(default)]
    pub report_type: Option<String>,
}

// -------------------------
// Query strings
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PreferenceQuery {
    pub user: Option<CustomerId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InteractionAnalyticsQuery {
    pub date_range: Option<String>,
    pub interaction_type: Option<String>,
    pub group_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionListQuery {
    pub active_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductViewsQuery {
    pub product: Option<ProductId>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub processed: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SimilarProductsQuery {
    pub product_id: Option<String>,
    pub max_results: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendingQuery {
    pub window: Option<String>,
    pub max_results: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SimilarListQuery {
    pub product: Option<ProductId>,
}

// -------------------------
// Extraction helpers
// -------------------------

/// Parse a path id, answering 400 `invalid_id` when malformed.
pub fn parse_id<T: core::str::FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}

/// Unwrap a query string, answering 400 when it does not parse.
pub fn query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, axum::response::Response> {
    query
        .map(|Query(q)| q)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_query", e.body_text()))
}

/// Unwrap a JSON body, answering 400 when it is malformed or mistyped.
pub fn body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    body.map(|Json(b)| b)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use storerec_core::RecordId;

    #[test]
    fn malformed_ids_are_bad_requests() {
        let err = parse_id::<RecordId>("not-a-uuid", "report").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let id = RecordId::new();
        assert_eq!(parse_id::<RecordId>(&id.to_string(), "report").unwrap(), id);
    }
}
