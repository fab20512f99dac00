//! Movement recording: validate, gate on availability, then hand the audit
//! record and its ledger deltas to the store as one atomic unit.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use pharmacy_core::{BranchId, Clock, DomainError, DomainResult, ProductId};
use pharmacy_inventory::{MovementType, NewMovement, StockMovement};

use super::{AvailabilityChecker, BranchDirectory, BranchNames, MovementView};
use crate::store::{InventoryStore, MovementFilter};

#[derive(Clone)]
pub struct MovementRecorder {
    store: Arc<dyn InventoryStore>,
    branches: BranchDirectory,
    availability: AvailabilityChecker,
    clock: Arc<dyn Clock>,
}

impl MovementRecorder {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        branches: BranchDirectory,
        availability: AvailabilityChecker,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            branches,
            availability,
            clock,
        }
    }

    /// Record a movement and apply its ledger effect.
    ///
    /// All checks run before anything is written. An EXIT or TRANSFER that asks
    /// for more than is on hand fails `InsufficientStock` with the ledger intact.
    #[instrument(
        skip(self, movement),
        fields(
            branch_id = %movement.branch_id,
            product_id = %movement.product_id,
            movement_type = movement.movement_type.as_str(),
            quantity = movement.quantity
        )
    )]
    pub async fn record(&self, mut movement: NewMovement) -> DomainResult<MovementView> {
        debug!("recording movement");
        movement.validate()?;

        let source = self.branches.get(movement.branch_id).await?;

        if movement.movement_type.requires_availability() {
            let available = self
                .availability
                .check(movement.branch_id, movement.product_id, movement.quantity)
                .await?;
            if !available {
                warn!("insufficient stock");
                return Err(DomainError::insufficient_stock(format!(
                    "insufficient stock for product {} in branch {}: requested {}",
                    movement.product_id, movement.branch_id, movement.quantity
                )));
            }
        }

        let destination = match movement.transfer_destination()? {
            Some(id) => Some(self.branches.get(id).await?),
            None => None,
        };
        // Only transfers carry a destination.
        movement.destination_branch_id = destination.as_ref().map(|b| b.id);

        let record = self
            .store
            .record_movement(movement, self.clock.now())
            .await?;
        info!(movement_id = %record.id, "movement recorded");

        Ok(MovementView {
            movement: record,
            branch_name: source.details.name,
            destination_branch_name: destination.map(|b| b.details.name),
        })
    }

    pub async fn all(&self) -> DomainResult<Vec<MovementView>> {
        self.history(MovementFilter::default()).await
    }

    pub async fn by_branch(&self, branch_id: BranchId) -> DomainResult<Vec<MovementView>> {
        self.branches.get(branch_id).await?;
        self.history(MovementFilter {
            branch_id: Some(branch_id),
            ..Default::default()
        })
        .await
    }

    pub async fn by_product(&self, product_id: ProductId) -> DomainResult<Vec<MovementView>> {
        self.history(MovementFilter {
            product_id: Some(product_id),
            ..Default::default()
        })
        .await
    }

    pub async fn by_branch_and_product(
        &self,
        branch_id: BranchId,
        product_id: ProductId,
    ) -> DomainResult<Vec<MovementView>> {
        self.branches.get(branch_id).await?;
        self.history(MovementFilter {
            branch_id: Some(branch_id),
            product_id: Some(product_id),
            ..Default::default()
        })
        .await
    }

    pub async fn by_type(&self, movement_type: MovementType) -> DomainResult<Vec<MovementView>> {
        self.history(MovementFilter {
            movement_type: Some(movement_type),
            ..Default::default()
        })
        .await
    }

    async fn history(&self, filter: MovementFilter) -> DomainResult<Vec<MovementView>> {
        let movements = self.store.movements(filter).await?;
        let names = BranchNames::load(self.store.as_ref()).await?;
        movements
            .into_iter()
            .map(|m: StockMovement| {
                let branch_name = names.name(m.branch_id)?;
                let destination_branch_name = m
                    .destination_branch_id
                    .map(|id| names.name(id))
                    .transpose()?;
                Ok(MovementView {
                    movement: m,
                    branch_name,
                    destination_branch_name,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{branch, services};
    use crate::services::InventoryServices;
    use pharmacy_inventory::StockLevels;

    const P: ProductId = ProductId::new(100);

    async fn quantity(s: &InventoryServices, b: BranchId) -> i64 {
        s.stock.get(b, P).await.unwrap().stock.quantity
    }

    #[tokio::test]
    async fn exit_scenario_with_minimum_boundary() {
        let (s, _) = services();
        let a = branch(&s, "A", "Alpha").await;
        branch(&s, "B", "Beta").await;
        s.stock.upsert(a, P, StockLevels::new(50, 10, 200)).await.unwrap();

        let err = s
            .movements
            .record(NewMovement::new(a, P, MovementType::Exit, 60))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock(_)));
        assert_eq!(quantity(&s, a).await, 50);
        assert!(s.movements.by_branch(a).await.unwrap().is_empty());

        let view = s
            .movements
            .record(NewMovement::new(a, P, MovementType::Exit, 30))
            .await
            .unwrap();
        assert_eq!(view.branch_name, "Alpha");
        assert_eq!(quantity(&s, a).await, 20);
        assert!(!s.stock.get(a, P).await.unwrap().below_minimum);

        s.movements
            .record(NewMovement::new(a, P, MovementType::Exit, 10))
            .await
            .unwrap();
        assert!(!s.stock.get(a, P).await.unwrap().below_minimum);

        s.movements
            .record(NewMovement::new(a, P, MovementType::Exit, 1))
            .await
            .unwrap();
        assert!(s.stock.get(a, P).await.unwrap().below_minimum);
    }

    #[tokio::test]
    async fn increasing_types_credit_the_source() {
        let (s, _) = services();
        let a = branch(&s, "A", "Alpha").await;
        s.stock.upsert(a, P, StockLevels::new(0, 0, 100)).await.unwrap();

        for t in [MovementType::Entry, MovementType::Return, MovementType::Adjustment] {
            s.movements.record(NewMovement::new(a, P, t, 4)).await.unwrap();
        }
        assert_eq!(quantity(&s, a).await, 12);
        assert_eq!(s.movements.by_product(P).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn transfer_moves_units_and_resolves_names() {
        let (s, _) = services();
        let a = branch(&s, "A", "Alpha").await;
        let b = branch(&s, "B", "Beta").await;
        s.stock.upsert(a, P, StockLevels::new(20, 0, 100)).await.unwrap();
        s.stock.upsert(b, P, StockLevels::new(3, 0, 100)).await.unwrap();

        let view = s
            .movements
            .record(NewMovement::transfer(a, b, P, 15))
            .await
            .unwrap();
        assert_eq!(view.destination_branch_name.as_deref(), Some("Beta"));
        assert_eq!((quantity(&s, a).await, quantity(&s, b).await), (5, 18));

        let history = s.movements.by_type(MovementType::Transfer).await.unwrap();
        assert_eq!(history, vec![view]);
    }

    #[tokio::test]
    async fn transfer_to_unstocked_destination_is_not_found_and_rolls_back() {
        let (s, _) = services();
        let a = branch(&s, "A", "Alpha").await;
        let b = branch(&s, "B", "Beta").await;
        s.stock.upsert(a, P, StockLevels::new(20, 0, 100)).await.unwrap();

        let err = s
            .movements
            .record(NewMovement::transfer(a, b, P, 20))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        assert_eq!(quantity(&s, a).await, 20);
        assert!(s.movements.by_product(P).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overdrawing_transfer_is_insufficient_stock_and_changes_nothing() {
        let (s, _) = services();
        let a = branch(&s, "A", "Alpha").await;
        let b = branch(&s, "B", "Beta").await;
        s.stock.upsert(a, P, StockLevels::new(12, 0, 100)).await.unwrap();
        s.stock.upsert(b, P, StockLevels::new(4, 0, 100)).await.unwrap();

        let err = s
            .movements
            .record(NewMovement::transfer(a, b, P, 13))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock(_)));
        assert_eq!((quantity(&s, a).await, quantity(&s, b).await), (12, 4));
        assert!(s.movements.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transfer_destination_rules() {
        let (s, _) = services();
        let a = branch(&s, "A", "Alpha").await;
        s.stock.upsert(a, P, StockLevels::new(20, 0, 100)).await.unwrap();

        let missing = NewMovement::new(a, P, MovementType::Transfer, 1);
        assert!(matches!(
            s.movements.record(missing).await,
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(matches!(
            s.movements.record(NewMovement::transfer(a, a, P, 1)).await,
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(matches!(
            s.movements
                .record(NewMovement::transfer(a, BranchId::new(77), P, 1))
                .await,
            Err(DomainError::NotFound(_))
        ));
        assert_eq!(quantity(&s, a).await, 20);
    }

    #[tokio::test]
    async fn destination_on_non_transfer_is_dropped() {
        let (s, _) = services();
        let a = branch(&s, "A", "Alpha").await;
        let b = branch(&s, "B", "Beta").await;
        s.stock.upsert(a, P, StockLevels::new(0, 0, 100)).await.unwrap();

        let view = s
            .movements
            .record(NewMovement {
                destination_branch_id: Some(b),
                ..NewMovement::new(a, P, MovementType::Entry, 2)
            })
            .await
            .unwrap();
        assert_eq!(view.movement.destination_branch_id, None);
        assert_eq!(view.destination_branch_name, None);
    }

    #[tokio::test]
    async fn validation_precedes_lookups() {
        let (s, _) = services();
        let err = s
            .movements
            .record(NewMovement::new(BranchId::new(5), P, MovementType::Entry, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));

        let err = s
            .movements
            .record(NewMovement::new(BranchId::new(5), P, MovementType::Entry, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn entry_without_stock_row_is_not_found() {
        let (s, _) = services();
        let a = branch(&s, "A", "Alpha").await;
        let err = s
            .movements
            .record(NewMovement::new(a, P, MovementType::Entry, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        assert!(s.movements.by_branch_and_product(a, P).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_exits_never_overdraw() {
        let (s, _) = services();
        let a = branch(&s, "A", "Alpha").await;
        s.stock.upsert(a, P, StockLevels::new(10, 0, 100)).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let s = s.clone();
                tokio::spawn(async move {
                    s.movements
                        .record(NewMovement::new(a, P, MovementType::Exit, 3))
                        .await
                })
            })
            .collect();

        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 3);
        assert_eq!(quantity(&s, a).await, 1);
        assert_eq!(s.movements.by_branch(a).await.unwrap().len(), 3);
    }
}
