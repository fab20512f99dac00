//! Inventory services composed over an [`InventoryStore`].
//!
//! The services own validation, branch resolution and logging; the store owns
//! atomicity. Reads come back as views carrying resolved branch names and the
//! derived flags (`below_minimum`, `expiring_soon`).

use std::collections::HashMap;
use std::sync::Arc;

use pharmacy_core::{BranchId, Clock, DomainError, DomainResult};
use pharmacy_inventory::{Batch, Branch, Stock, StockMovement};

use crate::store::InventoryStore;

pub mod availability;
pub mod batches;
pub mod branches;
pub mod movements;
pub mod stock;

pub use availability::AvailabilityChecker;
pub use batches::BatchTracker;
pub use branches::BranchDirectory;
pub use movements::MovementRecorder;
pub use stock::{StockService, StockUpsert};

/// Stock row with its branch name and the derived `below_minimum` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockView {
    pub stock: Stock,
    pub branch_name: String,
    pub below_minimum: bool,
}

impl StockView {
    fn new(stock: Stock, branch_name: String) -> Self {
        Self {
            below_minimum: stock.below_minimum(),
            stock,
            branch_name,
        }
    }
}

/// Movement record with resolved branch names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementView {
    pub movement: StockMovement,
    pub branch_name: String,
    pub destination_branch_name: Option<String>,
}

/// Batch with its branch name and the `expiring_soon` flag as of the service clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchView {
    pub batch: Batch,
    pub branch_name: String,
    pub expiring_soon: bool,
}

/// All inventory services over one store and one clock.
#[derive(Clone)]
pub struct InventoryServices {
    pub branches: BranchDirectory,
    pub stock: StockService,
    pub availability: AvailabilityChecker,
    pub movements: MovementRecorder,
    pub batches: BatchTracker,
}

impl InventoryServices {
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>) -> Self {
        let branches = BranchDirectory::new(store.clone(), clock.clone());
        let availability = AvailabilityChecker::new(store.clone());
        Self {
            stock: StockService::new(store.clone(), branches.clone(), clock.clone()),
            movements: MovementRecorder::new(
                store.clone(),
                branches.clone(),
                availability.clone(),
                clock.clone(),
            ),
            batches: BatchTracker::new(store, branches.clone(), clock),
            availability,
            branches,
        }
    }
}

/// Branch id -> name, loaded once per listing.
pub(crate) struct BranchNames(HashMap<BranchId, String>);

impl BranchNames {
    pub(crate) async fn load(store: &dyn InventoryStore) -> DomainResult<Self> {
        let names = store
            .branches(None)
            .await?
            .into_iter()
            .map(|b: Branch| (b.id, b.details.name))
            .collect();
        Ok(Self(names))
    }

    /// Name of a branch referenced by a stored row; the store guarantees it exists.
    pub(crate) fn name(&self, id: BranchId) -> DomainResult<String> {
        self.0
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::storage(format!("row references unknown branch {id}")))
    }
}
