//! In-memory inventory store for tests/dev.
//!
//! All tables live behind one `RwLock`, so every mutating call (including a
//! movement and its ledger deltas) is applied under a single write guard: the
//! equivalent of one database transaction with row locks held to commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pharmacy_core::{
    entity::sort_by_id, BatchId, BranchId, DomainError, DomainResult, MovementId, ProductId,
    StockId,
};
use pharmacy_inventory::{
    Batch, Branch, BranchDetails, BranchStatus, NewBatch, NewMovement, Stock, StockLevels,
    StockMovement,
};

use super::{
    BatchFilter, BatchStore, BranchStore, MovementFilter, MovementLog, StockFilter, StockLedger,
};

type StockKey = (BranchId, ProductId);

#[derive(Debug, Default)]
struct Tables {
    branches: BTreeMap<BranchId, Branch>,
    stock: HashMap<StockKey, Stock>,
    movements: Vec<StockMovement>,
    batches: BTreeMap<BatchId, Batch>,
    last_branch_id: i64,
    last_stock_id: i64,
    last_movement_id: i64,
    last_batch_id: i64,
}

impl Tables {
    fn code_taken(&self, code: &str, except: Option<BranchId>) -> bool {
        self.branches
            .values()
            .any(|b| b.code() == code && Some(b.id) != except)
    }

    fn branch_referenced(&self, id: BranchId) -> bool {
        self.stock.keys().any(|(b, _)| *b == id)
            || self
                .movements
                .iter()
                .any(|m| m.branch_id == id || m.destination_branch_id == Some(id))
            || self.batches.values().any(|b| b.branch_id == id)
    }

    fn require_branch(&self, id: BranchId) -> DomainResult<()> {
        if self.branches.contains_key(&id) {
            Ok(())
        } else {
            Err(DomainError::not_found(format!("branch {id} not found")))
        }
    }
}

fn stock_not_found(branch_id: BranchId, product_id: ProductId) -> DomainError {
    DomainError::not_found(format!(
        "stock not found for product {product_id} in branch {branch_id}"
    ))
}

/// In-memory inventory store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| DomainError::storage("lock poisoned"))
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| DomainError::storage("lock poisoned"))
    }
}

#[async_trait]
impl BranchStore for InMemoryInventoryStore {
    async fn insert_branch(
        &self,
        details: BranchDetails,
        now: DateTime<Utc>,
    ) -> DomainResult<Branch> {
        let mut t = self.write()?;
        if t.code_taken(&details.code, None) {
            return Err(DomainError::duplicate(format!(
                "a branch with code {} already exists",
                details.code
            )));
        }

        t.last_branch_id += 1;
        let branch = Branch {
            id: BranchId::new(t.last_branch_id),
            details,
            created_at: now,
        };
        t.branches.insert(branch.id, branch.clone());
        Ok(branch)
    }

    async fn update_branch(&self, id: BranchId, details: BranchDetails) -> DomainResult<Branch> {
        let mut t = self.write()?;
        t.require_branch(id)?;
        if t.code_taken(&details.code, Some(id)) {
            return Err(DomainError::duplicate(format!(
                "a branch with code {} already exists",
                details.code
            )));
        }

        let branch = t
            .branches
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("branch {id} not found")))?;
        branch.details = details;
        Ok(branch.clone())
    }

    async fn delete_branch(&self, id: BranchId) -> DomainResult<()> {
        let mut t = self.write()?;
        t.require_branch(id)?;
        if t.branch_referenced(id) {
            return Err(DomainError::invalid_argument(format!(
                "branch {id} is still referenced by stock, movements or batches"
            )));
        }
        t.branches.remove(&id);
        Ok(())
    }

    async fn branch(&self, id: BranchId) -> DomainResult<Option<Branch>> {
        Ok(self.read()?.branches.get(&id).cloned())
    }

    async fn branch_by_code(&self, code: &str) -> DomainResult<Option<Branch>> {
        Ok(self
            .read()?
            .branches
            .values()
            .find(|b| b.code() == code)
            .cloned())
    }

    async fn branches(&self, status: Option<BranchStatus>) -> DomainResult<Vec<Branch>> {
        Ok(self
            .read()?
            .branches
            .values()
            .filter(|b| status.is_none_or(|s| b.status() == s))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StockLedger for InMemoryInventoryStore {
    async fn stock(
        &self,
        branch_id: BranchId,
        product_id: ProductId,
    ) -> DomainResult<Option<Stock>> {
        Ok(self.read()?.stock.get(&(branch_id, product_id)).cloned())
    }

    async fn upsert_stock(
        &self,
        branch_id: BranchId,
        product_id: ProductId,
        levels: StockLevels,
        now: DateTime<Utc>,
    ) -> DomainResult<(Stock, bool)> {
        let mut t = self.write()?;
        t.require_branch(branch_id)?;

        if let Some(existing) = t.stock.get_mut(&(branch_id, product_id)) {
            existing.reconfigure(levels, now);
            return Ok((existing.clone(), false));
        }

        t.last_stock_id += 1;
        let stock = Stock::create(
            StockId::new(t.last_stock_id),
            branch_id,
            product_id,
            levels,
            now,
        );
        t.stock.insert((branch_id, product_id), stock.clone());
        Ok((stock, true))
    }

    async fn apply_delta(
        &self,
        branch_id: BranchId,
        product_id: ProductId,
        delta: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Stock> {
        let mut t = self.write()?;
        let row = t
            .stock
            .get_mut(&(branch_id, product_id))
            .ok_or_else(|| stock_not_found(branch_id, product_id))?;
        row.apply_delta(delta, now)?;
        Ok(row.clone())
    }

    async fn stock_rows(&self, filter: StockFilter) -> DomainResult<Vec<Stock>> {
        let mut rows: Vec<Stock> = self
            .read()?
            .stock
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        sort_by_id(&mut rows);
        Ok(rows)
    }
}

#[async_trait]
impl MovementLog for InMemoryInventoryStore {
    async fn record_movement(
        &self,
        movement: NewMovement,
        now: DateTime<Utc>,
    ) -> DomainResult<StockMovement> {
        let mut t = self.write()?;
        t.require_branch(movement.branch_id)?;
        if let Some(destination) = movement.destination_branch_id {
            t.require_branch(destination)?;
        }

        // Stage every delta against copies; commit only when all succeed.
        let mut staged: Vec<(StockKey, Stock)> = Vec::new();
        for d in movement.ledger_deltas() {
            let key = (d.branch_id, d.product_id);
            let mut row = match staged.iter().rev().find(|(k, _)| *k == key) {
                Some((_, s)) => s.clone(),
                None => t
                    .stock
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| stock_not_found(d.branch_id, d.product_id))?,
            };
            row.apply_delta(d.delta, now)?;
            staged.push((key, row));
        }

        t.last_movement_id += 1;
        let record = StockMovement::record(MovementId::new(t.last_movement_id), movement, now);
        t.movements.push(record.clone());
        for (key, row) in staged {
            t.stock.insert(key, row);
        }
        Ok(record)
    }

    async fn movements(&self, filter: MovementFilter) -> DomainResult<Vec<StockMovement>> {
        Ok(self
            .read()?
            .movements
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BatchStore for InMemoryInventoryStore {
    async fn insert_batch(&self, batch: NewBatch, now: DateTime<Utc>) -> DomainResult<Batch> {
        let mut t = self.write()?;
        t.require_branch(batch.branch_id)?;

        t.last_batch_id += 1;
        let batch = Batch::create(BatchId::new(t.last_batch_id), batch, now);
        t.batches.insert(batch.id, batch.clone());
        Ok(batch)
    }

    async fn batches(&self, filter: BatchFilter) -> DomainResult<Vec<Batch>> {
        Ok(self
            .read()?
            .batches
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pharmacy_inventory::MovementType;

    const P: ProductId = ProductId::new(100);

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap()
    }

    async fn store_with_branches() -> (InMemoryInventoryStore, BranchId, BranchId) {
        let store = InMemoryInventoryStore::new();
        let a = store
            .insert_branch(BranchDetails::new("A", "Alpha", BranchStatus::Active), now())
            .await
            .unwrap();
        let b = store
            .insert_branch(BranchDetails::new("B", "Beta", BranchStatus::Active), now())
            .await
            .unwrap();
        (store, a.id, b.id)
    }

    #[tokio::test]
    async fn ids_are_sequential_from_one() {
        let (_store, a, b) = store_with_branches().await;
        assert_eq!(a, BranchId::new(1));
        assert_eq!(b, BranchId::new(2));
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected_on_insert_and_update() {
        let (store, a, _b) = store_with_branches().await;
        let err = store
            .insert_branch(BranchDetails::new("B", "Other", BranchStatus::Active), now())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateResource(_)));

        let err = store
            .update_branch(a, BranchDetails::new("B", "Alpha", BranchStatus::Active))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateResource(_)));

        // Keeping its own code is fine.
        let updated = store
            .update_branch(a, BranchDetails::new("A", "Alpha II", BranchStatus::Inactive))
            .await
            .unwrap();
        assert_eq!(updated.name(), "Alpha II");
    }

    #[tokio::test]
    async fn upsert_creates_once_per_pair() {
        let (store, a, _b) = store_with_branches().await;
        let (first, created) = store
            .upsert_stock(a, P, StockLevels::new(5, 1, 10), now())
            .await
            .unwrap();
        assert!(created);

        let (second, created) = store
            .upsert_stock(a, P, StockLevels::new(8, 2, 20), now())
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 8);
        assert_eq!(store.stock_rows(StockFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_requires_existing_branch() {
        let store = InMemoryInventoryStore::new();
        let err = store
            .upsert_stock(BranchId::new(9), P, StockLevels::new(1, 0, 2), now())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn apply_delta_on_missing_row_is_not_found() {
        let (store, a, _b) = store_with_branches().await;
        let err = store.apply_delta(a, P, 3, now()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_transfer_credit_rolls_back_debit_and_record() {
        let (store, a, b) = store_with_branches().await;
        store
            .upsert_stock(a, P, StockLevels::new(20, 0, 100), now())
            .await
            .unwrap();

        // Destination row does not exist yet.
        let err = store
            .record_movement(NewMovement::transfer(a, b, P, 20), now())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        assert_eq!(store.stock(a, P).await.unwrap().unwrap().quantity, 20);
        assert!(store.movements(MovementFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_applies_deltas_and_appends() {
        let (store, a, b) = store_with_branches().await;
        store.upsert_stock(a, P, StockLevels::new(20, 0, 100), now()).await.unwrap();
        store.upsert_stock(b, P, StockLevels::new(0, 0, 100), now()).await.unwrap();

        let rec = store
            .record_movement(NewMovement::transfer(a, b, P, 15), now())
            .await
            .unwrap();
        assert_eq!(rec.id, MovementId::new(1));
        assert_eq!(store.stock(a, P).await.unwrap().unwrap().quantity, 5);
        assert_eq!(store.stock(b, P).await.unwrap().unwrap().quantity, 15);

        let by_type = store
            .movements(MovementFilter {
                movement_type: Some(MovementType::Transfer),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_type, vec![rec]);
    }

    #[tokio::test]
    async fn referenced_branch_cannot_be_deleted() {
        let (store, a, b) = store_with_branches().await;
        store.upsert_stock(a, P, StockLevels::new(1, 0, 2), now()).await.unwrap();

        let err = store.delete_branch(a).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));

        store.delete_branch(b).await.unwrap();
        assert!(store.branch(b).await.unwrap().is_none());
        assert!(matches!(
            store.delete_branch(b).await.unwrap_err(),
            DomainError::NotFound(_)
        ));
    }
}
