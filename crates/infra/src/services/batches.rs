use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, instrument};

use pharmacy_core::{BranchId, Clock, DomainResult, ProductId};
use pharmacy_inventory::{expiry_window_end, Batch, BatchStatus, NewBatch};

use super::{BatchView, BranchDirectory, BranchNames};
use crate::store::{BatchFilter, InventoryStore};

/// Batch (lot) tracking. Independent of the stock ledger.
#[derive(Clone)]
pub struct BatchTracker {
    store: Arc<dyn InventoryStore>,
    branches: BranchDirectory,
    clock: Arc<dyn Clock>,
}

impl BatchTracker {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        branches: BranchDirectory,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            branches,
            clock,
        }
    }

    #[instrument(
        skip(self, batch),
        fields(branch_id = %batch.branch_id, product_id = %batch.product_id)
    )]
    pub async fn create(&self, batch: NewBatch) -> DomainResult<BatchView> {
        debug!(batch_number = %batch.batch_number, "creating batch");
        batch.validate(self.clock.today())?;
        let branch = self.branches.get(batch.branch_id).await?;

        let batch = self.store.insert_batch(batch, self.clock.now()).await?;
        info!(batch_id = %batch.id, "batch created");
        Ok(self.view(batch, branch.details.name))
    }

    pub async fn list(&self) -> DomainResult<Vec<BatchView>> {
        self.query(BatchFilter::default()).await
    }

    pub async fn by_branch(&self, branch_id: BranchId) -> DomainResult<Vec<BatchView>> {
        self.branches.get(branch_id).await?;
        self.query(BatchFilter {
            branch_id: Some(branch_id),
            ..Default::default()
        })
        .await
    }

    pub async fn by_product(&self, product_id: ProductId) -> DomainResult<Vec<BatchView>> {
        self.query(BatchFilter {
            product_id: Some(product_id),
            ..Default::default()
        })
        .await
    }

    pub async fn by_status(&self, status: BatchStatus) -> DomainResult<Vec<BatchView>> {
        self.query(BatchFilter {
            status: Some(status),
            ..Default::default()
        })
        .await
    }

    /// AVAILABLE batches expiring within `[today, today + 30 days]`.
    pub async fn expiring_soon(&self) -> DomainResult<Vec<BatchView>> {
        let today = self.clock.today();
        self.query(BatchFilter {
            status: Some(BatchStatus::Available),
            expires_on_or_after: Some(today),
            expires_on_or_before: Some(expiry_window_end(today)),
            ..Default::default()
        })
        .await
    }

    /// AVAILABLE batches whose expiration date is already past.
    pub async fn expired(&self) -> DomainResult<Vec<BatchView>> {
        let yesterday = self.clock.today() - Duration::days(1);
        self.query(BatchFilter {
            status: Some(BatchStatus::Available),
            expires_on_or_before: Some(yesterday),
            ..Default::default()
        })
        .await
    }

    async fn query(&self, filter: BatchFilter) -> DomainResult<Vec<BatchView>> {
        let batches = self.store.batches(filter).await?;
        let names = BranchNames::load(self.store.as_ref()).await?;
        batches
            .into_iter()
            .map(|b| {
                let name = names.name(b.branch_id)?;
                Ok(self.view(b, name))
            })
            .collect()
    }

    fn view(&self, batch: Batch, branch_name: String) -> BatchView {
        BatchView {
            expiring_soon: batch.expiring_soon(self.clock.today()),
            batch,
            branch_name,
        }
    }
}
