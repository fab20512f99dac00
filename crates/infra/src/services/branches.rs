use std::sync::Arc;

use tracing::{debug, info, instrument};

use pharmacy_core::{BranchId, Clock, DomainError, DomainResult};
use pharmacy_inventory::{Branch, BranchDetails, BranchStatus};

use crate::store::InventoryStore;

/// Branch CRUD plus the validating lookup the ledger services depend on.
#[derive(Clone)]
pub struct BranchDirectory {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
}

impl BranchDirectory {
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[instrument(skip(self, details), fields(code = %details.code))]
    pub async fn create(&self, details: BranchDetails) -> DomainResult<Branch> {
        debug!("creating branch");
        let details = details.normalized();
        details.validate()?;

        let branch = self.store.insert_branch(details, self.clock.now()).await?;
        info!(branch_id = %branch.id, "branch created");
        Ok(branch)
    }

    #[instrument(skip(self, details), fields(branch_id = %id))]
    pub async fn update(&self, id: BranchId, details: BranchDetails) -> DomainResult<Branch> {
        debug!("updating branch");
        let details = details.normalized();
        details.validate()?;

        let branch = self.store.update_branch(id, details).await?;
        info!(code = %branch.code(), "branch updated");
        Ok(branch)
    }

    #[instrument(skip(self), fields(branch_id = %id))]
    pub async fn delete(&self, id: BranchId) -> DomainResult<()> {
        debug!("deleting branch");
        self.store.delete_branch(id).await?;
        info!("branch deleted");
        Ok(())
    }

    /// Resolve a branch or fail `NotFound`.
    pub async fn get(&self, id: BranchId) -> DomainResult<Branch> {
        self.store
            .branch(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("branch {id} not found")))
    }

    pub async fn find_by_code(&self, code: &str) -> DomainResult<Branch> {
        self.store
            .branch_by_code(code.trim())
            .await?
            .ok_or_else(|| DomainError::not_found(format!("branch with code {code} not found")))
    }

    pub async fn list(&self) -> DomainResult<Vec<Branch>> {
        self.store.branches(None).await
    }

    pub async fn list_by_status(&self, status: BranchStatus) -> DomainResult<Vec<Branch>> {
        self.store.branches(Some(status)).await
    }
}
