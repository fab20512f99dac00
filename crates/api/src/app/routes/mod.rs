use axum::Router;

pub mod batches;
pub mod branches;
pub mod movements;
pub mod stock;
pub mod system;

/// Router for the inventory endpoints (mounted under `/api`).
pub fn router() -> Router {
    Router::new()
        .nest("/branches", branches::router())
        .nest("/stock", stock::router())
        .nest("/movements", movements::router())
        .nest("/batches", batches::router())
}
