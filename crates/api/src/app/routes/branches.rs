use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use pharmacy_core::BranchId;
use pharmacy_infra::InventoryServices;
use pharmacy_inventory::BranchStatus;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_branches).post(create_branch))
        .route("/code/:code", get(get_branch_by_code))
        .route("/:id", get(get_branch).put(update_branch).delete(delete_branch))
}

pub async fn create_branch(
    Extension(services): Extension<Arc<InventoryServices>>,
    body: Result<Json<dto::BranchRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.branches.create(body.into()).await {
        Ok(branch) => (StatusCode::CREATED, Json(dto::branch_to_json(&branch))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_branches(
    Extension(services): Extension<Arc<InventoryServices>>,
    query: Result<Query<dto::StatusQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match errors::query_params(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    let result = match query.status.as_deref() {
        Some(raw) => match errors::parse::<BranchStatus>(raw) {
            Ok(status) => services.branches.list_by_status(status).await,
            Err(resp) => return resp,
        },
        None => services.branches.list().await,
    };

    match result {
        Ok(branches) => Json(dto::list_to_json(&branches, dto::branch_to_json)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_branch(
    Extension(services): Extension<Arc<InventoryServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BranchId = match errors::parse(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.branches.get(id).await {
        Ok(branch) => Json(dto::branch_to_json(&branch)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_branch_by_code(
    Extension(services): Extension<Arc<InventoryServices>>,
    Path(code): Path<String>,
) -> axum::response::Response {
    match services.branches.find_by_code(&code).await {
        Ok(branch) => Json(dto::branch_to_json(&branch)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_branch(
    Extension(services): Extension<Arc<InventoryServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::BranchRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: BranchId = match errors::parse(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.branches.update(id, body.into()).await {
        Ok(branch) => Json(dto::branch_to_json(&branch)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_branch(
    Extension(services): Extension<Arc<InventoryServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BranchId = match errors::parse(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.branches.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
