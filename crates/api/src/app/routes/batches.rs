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
use pharmacy_inventory::BatchStatus;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_batches).post(create_batch))
        .route("/branch/:id", get(batches_by_branch))
        .route("/product/:id", get(batches_by_product))
        .route("/expiring", get(expiring_batches))
        .route("/expired", get(expired_batches))
}

pub async fn create_batch(
    Extension(services): Extension<Arc<InventoryServices>>,
    body: Result<Json<dto::BatchRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.batches.create(body.into()).await {
        Ok(view) => (StatusCode::CREATED, Json(dto::batch_to_json(&view))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_batches(
    Extension(services): Extension<Arc<InventoryServices>>,
    query: Result<Query<dto::StatusQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match errors::query_params(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    let result = match query.status.as_deref() {
        Some(raw) => match errors::parse::<BatchStatus>(raw) {
            Ok(status) => services.batches.by_status(status).await,
            Err(resp) => return resp,
        },
        None => services.batches.list().await,
    };
    batches_response(result)
}

pub async fn batches_by_branch(
    Extension(services): Extension<Arc<InventoryServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match errors::parse::<BranchId>(&id) {
        Ok(id) => batches_response(services.batches.by_branch(id).await),
        Err(resp) => resp,
    }
}

pub async fn batches_by_product(
    Extension(services): Extension<Arc<InventoryServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match errors::parse::<ProductId>(&id) {
        Ok(id) => batches_response(services.batches.by_product(id).await),
        Err(resp) => resp,
    }
}

pub async fn expiring_batches(
    Extension(services): Extension<Arc<InventoryServices>>,
) -> axum::response::Response {
    batches_response(services.batches.expiring_soon().await)
}

pub async fn expired_batches(
    Extension(services): Extension<Arc<InventoryServices>>,
) -> axum::response::Response {
    batches_response(services.batches.expired().await)
}

fn batches_response(
    result: pharmacy_core::DomainResult<Vec<pharmacy_infra::services::BatchView>>,
) -> axum::response::Response {
    match result {
        Ok(views) => Json(dto::list_to_json(&views, dto::batch_to_json)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
