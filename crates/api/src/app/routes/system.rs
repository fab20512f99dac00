use axum::{http::StatusCode, Json};
use serde_json::json;

use crate::app::errors;

pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "UP" })))
}

/// JSON 404 for unknown routes.
pub async fn not_found() -> axum::response::Response {
    errors::json_error(StatusCode::NOT_FOUND, "not_found", "no such route")
}
