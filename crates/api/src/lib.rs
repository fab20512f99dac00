//! HTTP API for the pharmacy inventory service: routing, request/response
//! mapping and process wiring.

pub mod app;
pub mod middleware;
