//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and service construction from config
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{middleware::from_fn, routing::get, Extension, Router};
use tower::ServiceBuilder;

use pharmacy_core::DomainResult;
use pharmacy_infra::{InventoryConfig, InventoryServices};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router from configuration (public entrypoint used by `main.rs`).
pub async fn build_app(config: &InventoryConfig) -> DomainResult<Router> {
    let services = services::build_services(config).await?;
    Ok(router(services))
}

/// Router over already-built services.
pub fn router(services: InventoryServices) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", routes::router())
        .fallback(routes::system::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(middleware::request_context))
                .layer(Extension(Arc::new(services))),
        )
}
