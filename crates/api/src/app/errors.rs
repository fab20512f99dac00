use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use serde_json::json;

use pharmacy_core::DomainError;

/// Map a domain failure to its HTTP status and error code.
///
/// Storage failures are logged in full and reported with a generic message.
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    if err.is_client_error() {
        tracing::debug!(error = %err, "request rejected");
    }

    match err {
        DomainError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        DomainError::DuplicateResource(msg) => {
            json_error(StatusCode::CONFLICT, "duplicate_resource", msg)
        }
        DomainError::InvalidArgument(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_argument", msg)
        }
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InsufficientStock(msg) => {
            json_error(StatusCode::BAD_REQUEST, "insufficient_stock", msg)
        }
        DomainError::Storage(detail) => {
            tracing::error!(error = %detail, "storage failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "an unexpected error occurred",
            )
        }
    }
}

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
            "status": status.as_u16(),
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

/// Unwrap a JSON body or answer 400 `validation_error`.
pub fn json_body<T>(
    body: Result<axum::Json<T>, JsonRejection>,
) -> Result<T, axum::response::Response> {
    body.map(|axum::Json(v)| v)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()))
}

/// Unwrap query parameters or answer 400 `validation_error`.
pub fn query_params<T>(
    query: Result<axum::extract::Query<T>, QueryRejection>,
) -> Result<T, axum::response::Response> {
    query
        .map(|axum::extract::Query(v)| v)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()))
}

/// Parse a path or query value (ids, enum names) into a domain type.
pub fn parse<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.parse().map_err(domain_error_to_response)
}
