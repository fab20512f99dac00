//! Persistence seams for the inventory service.
//!
//! Every method returns `DomainResult`: backends map their own failures into
//! `DomainError::Storage` (or a more specific variant when a constraint is hit).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use pharmacy_core::{BranchId, DomainResult, ProductId};
use pharmacy_inventory::{
    Batch, BatchStatus, Branch, BranchDetails, BranchStatus, MovementType, NewBatch, NewMovement,
    Stock, StockLevels, StockMovement,
};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PgInventoryStore;

/// Branch directory storage. Codes are unique across all branches.
#[async_trait]
pub trait BranchStore: Send + Sync {
    /// Insert a branch; fails `DuplicateResource` if the code is taken.
    async fn insert_branch(&self, details: BranchDetails, now: DateTime<Utc>)
    -> DomainResult<Branch>;

    /// Replace a branch's details; fails `NotFound` or `DuplicateResource`.
    async fn update_branch(&self, id: BranchId, details: BranchDetails) -> DomainResult<Branch>;

    /// Remove a branch; fails `NotFound`, or `InvalidArgument` while inventory
    /// records still reference it.
    async fn delete_branch(&self, id: BranchId) -> DomainResult<()>;

    async fn branch(&self, id: BranchId) -> DomainResult<Option<Branch>>;

    async fn branch_by_code(&self, code: &str) -> DomainResult<Option<Branch>>;

    /// All branches (optionally of one status), ordered by id.
    async fn branches(&self, status: Option<BranchStatus>) -> DomainResult<Vec<Branch>>;
}

/// Which stock rows to list.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct StockFilter {
    pub branch_id: Option<BranchId>,
    pub product_id: Option<ProductId>,
    /// Only rows with `quantity < minimum_stock`.
    pub below_minimum: bool,
}

impl StockFilter {
    pub fn matches(&self, stock: &Stock) -> bool {
        self.branch_id.is_none_or(|b| stock.branch_id == b)
            && self.product_id.is_none_or(|p| stock.product_id == p)
            && (!self.below_minimum || stock.below_minimum())
    }
}

/// The authoritative `(branch, product) -> quantity` store.
#[async_trait]
pub trait StockLedger: Send + Sync {
    async fn stock(&self, branch_id: BranchId, product_id: ProductId)
    -> DomainResult<Option<Stock>>;

    /// Create the row (stamping `last_restock_date`) or replace its levels.
    ///
    /// Returns the row and whether it was created.
    async fn upsert_stock(
        &self,
        branch_id: BranchId,
        product_id: ProductId,
        levels: StockLevels,
        now: DateTime<Utc>,
    ) -> DomainResult<(Stock, bool)>;

    /// Atomically add `delta` to the row's quantity.
    ///
    /// Fails `NotFound` if the row does not exist and `InvalidArgument` if the
    /// result would be negative; in both cases nothing is written.
    async fn apply_delta(
        &self,
        branch_id: BranchId,
        product_id: ProductId,
        delta: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Stock>;

    /// Rows matching the filter, ordered by id.
    async fn stock_rows(&self, filter: StockFilter) -> DomainResult<Vec<Stock>>;
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MovementFilter {
    pub branch_id: Option<BranchId>,
    pub product_id: Option<ProductId>,
    pub movement_type: Option<MovementType>,
}

impl MovementFilter {
    pub fn matches(&self, movement: &StockMovement) -> bool {
        self.branch_id.is_none_or(|b| movement.branch_id == b)
            && self.product_id.is_none_or(|p| movement.product_id == p)
            && self.movement_type.is_none_or(|t| movement.movement_type == t)
    }
}

/// Append-only movement audit trail, bound to the ledger it drives.
#[async_trait]
pub trait MovementLog: Send + Sync {
    /// Persist the audit record and apply its ledger deltas as one unit.
    ///
    /// Deltas are applied in order (debit before credit). If any delta fails,
    /// neither the record nor any ledger change survives.
    async fn record_movement(
        &self,
        movement: NewMovement,
        now: DateTime<Utc>,
    ) -> DomainResult<StockMovement>;

    /// Movements matching the filter, in recording order.
    async fn movements(&self, filter: MovementFilter) -> DomainResult<Vec<StockMovement>>;
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BatchFilter {
    pub branch_id: Option<BranchId>,
    pub product_id: Option<ProductId>,
    pub status: Option<BatchStatus>,
    /// Inclusive lower bound on the expiration date; excludes undated batches.
    pub expires_on_or_after: Option<NaiveDate>,
    /// Inclusive upper bound on the expiration date; excludes undated batches.
    pub expires_on_or_before: Option<NaiveDate>,
}

impl BatchFilter {
    pub fn matches(&self, batch: &Batch) -> bool {
        let dated = |bound: Option<NaiveDate>, ok: fn(NaiveDate, NaiveDate) -> bool| match bound {
            None => true,
            Some(bound) => batch.expiration_date.is_some_and(|exp| ok(exp, bound)),
        };

        self.branch_id.is_none_or(|b| batch.branch_id == b)
            && self.product_id.is_none_or(|p| batch.product_id == p)
            && self.status.is_none_or(|s| batch.status == s)
            && dated(self.expires_on_or_after, |exp, bound| exp >= bound)
            && dated(self.expires_on_or_before, |exp, bound| exp <= bound)
    }
}

#[async_trait]
pub trait BatchStore: Send + Sync {
    async fn insert_batch(&self, batch: NewBatch, now: DateTime<Utc>) -> DomainResult<Batch>;

    /// Batches matching the filter, ordered by id.
    async fn batches(&self, filter: BatchFilter) -> DomainResult<Vec<Batch>>;
}

/// Everything the inventory services need from a backend.
pub trait InventoryStore: BranchStore + StockLedger + MovementLog + BatchStore {}

impl<T> InventoryStore for T where T: BranchStore + StockLedger + MovementLog + BatchStore {}
