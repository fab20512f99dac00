//! Stock movements: append-only audit records and the ledger effects they imply.
//!
//! | type       | ledger effect                                   |
//! |------------|-------------------------------------------------|
//! | ENTRY      | `+q` at source                                  |
//! | RETURN     | `+q` at source                                  |
//! | ADJUSTMENT | `+q` at source                                  |
//! | EXIT       | `-q` at source                                  |
//! | TRANSFER   | `-q` at source, then `+q` at destination        |
//!
//! `quantity` on a movement is always positive; the sign comes from the type.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pharmacy_core::{BranchId, DomainError, DomainResult, Entity, MovementId, ProductId};

const MAX_REASON_LEN: usize = 500;
const MAX_REFERENCE_LEN: usize = 100;
const MAX_PERFORMED_BY_LEN: usize = 150;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Entry,
    Exit,
    Transfer,
    Return,
    // Always an increase: a downward adjustment is recorded as EXIT.
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entry => "ENTRY",
            MovementType::Exit => "EXIT",
            MovementType::Transfer => "TRANSFER",
            MovementType::Return => "RETURN",
            MovementType::Adjustment => "ADJUSTMENT",
        }
    }

    /// EXIT and TRANSFER draw units out of the source branch and must be gated
    /// by an availability check.
    pub fn requires_availability(&self) -> bool {
        matches!(self, MovementType::Exit | MovementType::Transfer)
    }
}

impl FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ENTRY" => Ok(MovementType::Entry),
            "EXIT" => Ok(MovementType::Exit),
            "TRANSFER" => Ok(MovementType::Transfer),
            "RETURN" => Ok(MovementType::Return),
            "ADJUSTMENT" => Ok(MovementType::Adjustment),
            other => Err(DomainError::invalid_argument(format!(
                "unknown movement type '{other}'"
            ))),
        }
    }
}

/// One signed change against one ledger row.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LedgerDelta {
    pub branch_id: BranchId,
    pub product_id: ProductId,
    pub delta: i64,
}

/// Ledger deltas implied by a movement, in application order (debit before credit).
///
/// A TRANSFER without a destination yields only the debit; callers validate the
/// destination before getting here.
pub fn ledger_deltas(
    movement_type: MovementType,
    branch_id: BranchId,
    destination_branch_id: Option<BranchId>,
    product_id: ProductId,
    quantity: i64,
) -> Vec<LedgerDelta> {
    let at = |branch_id, delta| LedgerDelta {
        branch_id,
        product_id,
        delta,
    };

    match movement_type {
        MovementType::Entry | MovementType::Return | MovementType::Adjustment => {
            vec![at(branch_id, quantity)]
        }
        MovementType::Exit => vec![at(branch_id, -quantity)],
        MovementType::Transfer => {
            let mut deltas = vec![at(branch_id, -quantity)];
            if let Some(destination) = destination_branch_id {
                deltas.push(at(destination, quantity));
            }
            deltas
        }
    }
}

/// A movement request, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub branch_id: BranchId,
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub destination_branch_id: Option<BranchId>,
    pub performed_by: Option<String>,
}

impl NewMovement {
    pub fn new(
        branch_id: BranchId,
        product_id: ProductId,
        movement_type: MovementType,
        quantity: i64,
    ) -> Self {
        Self {
            branch_id,
            product_id,
            movement_type,
            quantity,
            reason: None,
            reference: None,
            destination_branch_id: None,
            performed_by: None,
        }
    }

    pub fn transfer(
        from: BranchId,
        to: BranchId,
        product_id: ProductId,
        quantity: i64,
    ) -> Self {
        Self {
            destination_branch_id: Some(to),
            ..Self::new(from, product_id, MovementType::Transfer, quantity)
        }
    }

    /// Checks that need no lookups: positive quantity and field limits.
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::invalid_argument(
                "quantity must be greater than zero",
            ));
        }
        check_opt_len("reason", self.reason.as_deref(), MAX_REASON_LEN)?;
        check_opt_len("reference", self.reference.as_deref(), MAX_REFERENCE_LEN)?;
        check_opt_len(
            "performed_by",
            self.performed_by.as_deref(),
            MAX_PERFORMED_BY_LEN,
        )?;
        Ok(())
    }

    /// Destination of a TRANSFER: present and different from the source.
    ///
    /// Returns `None` for every other movement type.
    pub fn transfer_destination(&self) -> DomainResult<Option<BranchId>> {
        if self.movement_type != MovementType::Transfer {
            return Ok(None);
        }
        match self.destination_branch_id {
            None => Err(DomainError::invalid_argument(
                "destination branch is required for transfers",
            )),
            Some(destination) if destination == self.branch_id => Err(
                DomainError::invalid_argument("destination branch must differ from source branch"),
            ),
            Some(destination) => Ok(Some(destination)),
        }
    }

    pub fn ledger_deltas(&self) -> Vec<LedgerDelta> {
        ledger_deltas(
            self.movement_type,
            self.branch_id,
            self.destination_branch_id,
            self.product_id,
            self.quantity,
        )
    }
}

/// Immutable audit record of a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub branch_id: BranchId,
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub destination_branch_id: Option<BranchId>,
    pub performed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn record(id: MovementId, movement: NewMovement, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            branch_id: movement.branch_id,
            product_id: movement.product_id,
            movement_type: movement.movement_type,
            quantity: movement.quantity,
            reason: movement.reason,
            reference: movement.reference,
            destination_branch_id: movement.destination_branch_id,
            performed_by: movement.performed_by,
            created_at,
        }
    }

    pub fn ledger_deltas(&self) -> Vec<LedgerDelta> {
        ledger_deltas(
            self.movement_type,
            self.branch_id,
            self.destination_branch_id,
            self.product_id,
            self.quantity,
        )
    }
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> MovementId {
        self.id
    }
}

fn check_opt_len(field: &str, value: Option<&str>, max: usize) -> DomainResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(DomainError::invalid_argument(format!(
            "{field} cannot exceed {max} characters"
        ))),
        _ => Ok(()),
    }
}
