use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use pharmacy_core::{BranchId, ProductId};
use pharmacy_infra::InventoryServices;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_stock).post(upsert_stock))
        .route("/alerts", get(low_stock_alerts))
        .route("/availability", get(check_availability))
        .route("/:branch_id", get(stock_by_branch))
        .route("/:branch_id/:product_id", get(get_stock))
}

pub async fn upsert_stock(
    Extension(services): Extension<Arc<InventoryServices>>,
    body: Result<Json<dto::StockRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services
        .stock
        .upsert(body.branch_id, body.product_id, body.levels())
        .await
    {
        Ok(upsert) => {
            (StatusCode::CREATED, Json(dto::stock_to_json(&upsert.stock))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_stock(
    Extension(services): Extension<Arc<InventoryServices>>,
) -> axum::response::Response {
    match services.stock.list().await {
        Ok(rows) => Json(dto::list_to_json(&rows, dto::stock_to_json)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn stock_by_branch(
    Extension(services): Extension<Arc<InventoryServices>>,
    Path(branch_id): Path<String>,
) -> axum::response::Response {
    let branch_id: BranchId = match errors::parse(&branch_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.stock.list_by_branch(branch_id).await {
        Ok(rows) => Json(dto::list_to_json(&rows, dto::stock_to_json)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_stock(
    Extension(services): Extension<Arc<InventoryServices>>,
    Path((branch_id, product_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (branch_id, product_id): (BranchId, ProductId) =
        match (errors::parse(&branch_id), errors::parse(&product_id)) {
            (Ok(b), Ok(p)) => (b, p),
            (Err(resp), _) | (_, Err(resp)) => return resp,
        };

    match services.stock.get(branch_id, product_id).await {
        Ok(row) => Json(dto::stock_to_json(&row)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Rows below their minimum, optionally for one branch.
pub async fn low_stock_alerts(
    Extension(services): Extension<Arc<InventoryServices>>,
    query: Result<Query<dto::AlertsQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match errors::query_params(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let branch_id = match query.branch_id.as_deref().map(errors::parse::<BranchId>) {
        Some(Ok(id)) => Some(id),
        Some(Err(resp)) => return resp,
        None => None,
    };

    match services.stock.below_minimum(branch_id).await {
        Ok(rows) => Json(dto::list_to_json(&rows, dto::stock_to_json)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn check_availability(
    Extension(services): Extension<Arc<InventoryServices>>,
    query: Result<Query<dto::AvailabilityQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match errors::query_params(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let (branch_id, product_id): (BranchId, ProductId) =
        match (errors::parse(&query.branch_id), errors::parse(&query.product_id)) {
            (Ok(b), Ok(p)) => (b, p),
            (Err(resp), _) | (_, Err(resp)) => return resp,
        };

    match services
        .availability
        .check(branch_id, product_id, query.quantity)
        .await
    {
        Ok(available) => Json(json!({ "available": available })).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
