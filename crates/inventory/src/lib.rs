//! Inventory domain module.
//!
//! This crate contains business rules for branches, the per-branch stock ledger,
//! stock movements and batch expiry, implemented purely as deterministic domain
//! logic (no IO, no HTTP, no storage).

pub mod batch;
pub mod branch;
pub mod movement;
pub mod stock;

pub use batch::{expiry_window_end, Batch, BatchStatus, NewBatch, EXPIRY_WINDOW_DAYS};
pub use branch::{Branch, BranchDetails, BranchStatus};
pub use movement::{ledger_deltas, LedgerDelta, MovementType, NewMovement, StockMovement};
pub use stock::{resulting_quantity, Stock, StockLevels};
