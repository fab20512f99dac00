//! Infrastructure layer: storage backends, services and configuration.
//!
//! - `store`: the persistence seams (`BranchStore`, `StockLedger`, `MovementLog`,
//!   `BatchStore`) with in-memory and PostgreSQL implementations
//! - `services`: branch directory, stock ledger, availability checker, movement
//!   recorder and batch tracker, composed over any `InventoryStore`
//! - `config`: environment-driven configuration

pub mod config;
pub mod services;
pub mod store;

pub use config::{ConfigError, InventoryConfig};
pub use services::InventoryServices;
pub use store::{InMemoryInventoryStore, InventoryStore, PgInventoryStore};
