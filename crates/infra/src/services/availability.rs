use std::sync::Arc;

use tracing::debug;

use pharmacy_core::{BranchId, DomainError, DomainResult, ProductId};

use crate::store::InventoryStore;

/// Read-only pre-check for EXIT and TRANSFER.
///
/// A fast-fail gate only: the store re-checks the quantity atomically when it
/// applies the delta.
#[derive(Clone)]
pub struct AvailabilityChecker {
    store: Arc<dyn InventoryStore>,
}

impl AvailabilityChecker {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// `true` iff the row exists and holds at least `quantity` units. A missing
    /// row is `false`, not an error; a non-positive quantity is `InvalidArgument`.
    pub async fn check(
        &self,
        branch_id: BranchId,
        product_id: ProductId,
        quantity: i64,
    ) -> DomainResult<bool> {
        if quantity <= 0 {
            return Err(DomainError::invalid_argument("quantity must be positive"));
        }
        let available = self
            .store
            .stock(branch_id, product_id)
            .await?
            .is_some_and(|s| s.can_supply(quantity));
        debug!(%branch_id, %product_id, quantity, available, "availability checked");
        Ok(available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{branch, services};
    use pharmacy_inventory::StockLevels;

    #[tokio::test]
    async fn missing_row_is_unavailable() {
        let (s, _) = services();
        let a = branch(&s, "A", "Alpha").await;
        assert!(!s.availability.check(a, ProductId::new(1), 1).await.unwrap());
    }

    #[tokio::test]
    async fn boundary_is_inclusive() {
        let (s, _) = services();
        let a = branch(&s, "A", "Alpha").await;
        let p = ProductId::new(1);
        s.stock.upsert(a, p, StockLevels::new(5, 1, 10)).await.unwrap();

        assert!(s.availability.check(a, p, 5).await.unwrap());
        assert!(!s.availability.check(a, p, 6).await.unwrap());
    }

    #[tokio::test]
    async fn non_positive_quantity_is_rejected() {
        let (s, _) = services();
        let a = branch(&s, "A", "Alpha").await;
        let p = ProductId::new(1);
        s.stock.upsert(a, p, StockLevels::new(5, 1, 10)).await.unwrap();

        for q in [0, -3] {
            assert!(matches!(
                s.availability.check(a, p, q).await,
                Err(DomainError::InvalidArgument(_))
            ));
        }
    }
}
