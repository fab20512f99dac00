use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use pharmacy_core::{BranchId, ProductId};
use pharmacy_infra::InventoryServices;
use pharmacy_inventory::MovementType;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_movements).post(record_movement))
        .route("/branch/:id", get(movements_by_branch))
        .route(
            "/branch/:branch_id/product/:product_id",
            get(movements_by_branch_and_product),
        )
        .route("/product/:id", get(movements_by_product))
}

pub async fn record_movement(
    Extension(services): Extension<Arc<InventoryServices>>,
    body: Result<Json<dto::MovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.movements.record(body.into()).await {
        Ok(view) => (StatusCode::CREATED, Json(dto::movement_to_json(&view))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Movements of one type (`?type=`); every movement when absent.
pub async fn list_movements(
    Extension(services): Extension<Arc<InventoryServices>>,
    query: Result<Query<dto::MovementTypeQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match errors::query_params(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    let result = match query.movement_type.as_deref() {
        Some(raw) => match errors::parse::<MovementType>(raw) {
            Ok(t) => services.movements.by_type(t).await,
            Err(resp) => return resp,
        },
        None => services.movements.all().await,
    };

    match result {
        Ok(views) => Json(dto::list_to_json(&views, dto::movement_to_json)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn movements_by_branch(
    Extension(services): Extension<Arc<InventoryServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BranchId = match errors::parse(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.movements.by_branch(id).await {
        Ok(views) => Json(dto::list_to_json(&views, dto::movement_to_json)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn movements_by_product(
    Extension(services): Extension<Arc<InventoryServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.movements.by_product(id).await {
        Ok(views) => Json(dto::list_to_json(&views, dto::movement_to_json)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn movements_by_branch_and_product(
    Extension(services): Extension<Arc<InventoryServices>>,
    Path((branch_id, product_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (branch_id, product_id): (BranchId, ProductId) =
        match (errors::parse(&branch_id), errors::parse(&product_id)) {
            (Ok(b), Ok(p)) => (b, p),
            (Err(resp), _) | (_, Err(resp)) => return resp,
        };

    match services
        .movements
        .by_branch_and_product(branch_id, product_id)
        .await
    {
        Ok(views) => Json(dto::list_to_json(&views, dto::movement_to_json)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
