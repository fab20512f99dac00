use std::sync::Arc;

use tracing::{debug, info, instrument};

use pharmacy_core::{BranchId, Clock, DomainError, DomainResult, ProductId};
use pharmacy_inventory::StockLevels;

use super::{BranchDirectory, BranchNames, StockView};
use crate::store::{InventoryStore, StockFilter};

/// Result of an upsert: the row and whether it was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockUpsert {
    pub stock: StockView,
    pub created: bool,
}

/// The per-branch stock ledger.
#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn InventoryStore>,
    branches: BranchDirectory,
    clock: Arc<dyn Clock>,
}

impl StockService {
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

    pub async fn get(&self, branch_id: BranchId, product_id: ProductId) -> DomainResult<StockView> {
        let branch = self.branches.get(branch_id).await?;
        let stock = self
            .store
            .stock(branch_id, product_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!(
                    "stock not found for product {product_id} in branch {branch_id}"
                ))
            })?;
        Ok(StockView::new(stock, branch.details.name))
    }

    /// Create the row or fully replace its three numeric fields.
    #[instrument(skip(self, levels), fields(branch_id = %branch_id, product_id = %product_id))]
    pub async fn upsert(
        &self,
        branch_id: BranchId,
        product_id: ProductId,
        levels: StockLevels,
    ) -> DomainResult<StockUpsert> {
        debug!(quantity = levels.quantity, "upserting stock");
        levels.validate()?;
        let branch = self.branches.get(branch_id).await?;

        let (stock, created) = self
            .store
            .upsert_stock(branch_id, product_id, levels, self.clock.now())
            .await?;
        if created {
            info!(stock_id = %stock.id, quantity = stock.quantity, "stock created");
        } else {
            info!(stock_id = %stock.id, quantity = stock.quantity, "stock updated");
        }

        Ok(StockUpsert {
            stock: StockView::new(stock, branch.details.name),
            created,
        })
    }

    /// Add a signed delta to an existing row.
    #[instrument(skip(self), fields(branch_id = %branch_id, product_id = %product_id))]
    pub async fn apply_delta(
        &self,
        branch_id: BranchId,
        product_id: ProductId,
        delta: i64,
    ) -> DomainResult<StockView> {
        debug!("applying ledger delta");
        let branch = self.branches.get(branch_id).await?;
        let stock = self
            .store
            .apply_delta(branch_id, product_id, delta, self.clock.now())
            .await?;
        info!(quantity = stock.quantity, "ledger delta applied");
        Ok(StockView::new(stock, branch.details.name))
    }

    pub async fn list(&self) -> DomainResult<Vec<StockView>> {
        self.rows(StockFilter::default()).await
    }

    pub async fn list_by_branch(&self, branch_id: BranchId) -> DomainResult<Vec<StockView>> {
        self.branches.get(branch_id).await?;
        self.rows(StockFilter {
            branch_id: Some(branch_id),
            ..Default::default()
        })
        .await
    }

    pub async fn list_by_product(&self, product_id: ProductId) -> DomainResult<Vec<StockView>> {
        self.rows(StockFilter {
            product_id: Some(product_id),
            ..Default::default()
        })
        .await
    }

    /// Rows with `quantity < minimum_stock`, across all branches or one.
    pub async fn below_minimum(&self, branch_id: Option<BranchId>) -> DomainResult<Vec<StockView>> {
        if let Some(id) = branch_id {
            self.branches.get(id).await?;
        }
        self.rows(StockFilter {
            branch_id,
            below_minimum: true,
            ..Default::default()
        })
        .await
    }

    async fn rows(&self, filter: StockFilter) -> DomainResult<Vec<StockView>> {
        let rows = self.store.stock_rows(filter).await?;
        let names = BranchNames::load(self.store.as_ref()).await?;
        rows.into_iter()
            .map(|s| {
                let name = names.name(s.branch_id)?;
                Ok(StockView::new(s, name))
            })
            .collect()
    }
}
