//! Stock ledger rows: one per `(branch, product)` pair.
//!
//! Quantities only move through [`Stock::apply_delta`] after creation; the
//! configured levels are replaced wholesale through [`Stock::reconfigure`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pharmacy_core::{BranchId, DomainError, DomainResult, Entity, ProductId, StockId};

/// Quantity and thresholds supplied on create/reconfigure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    pub quantity: i64,
    pub minimum_stock: i64,
    pub maximum_stock: i64,
}

impl StockLevels {
    pub fn new(quantity: i64, minimum_stock: i64, maximum_stock: i64) -> Self {
        Self {
            quantity,
            minimum_stock,
            maximum_stock,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity < 0 {
            return Err(DomainError::invalid_argument("quantity cannot be negative"));
        }
        if self.minimum_stock < 0 {
            return Err(DomainError::invalid_argument(
                "minimum stock cannot be negative",
            ));
        }
        if self.maximum_stock <= 0 {
            return Err(DomainError::invalid_argument(
                "maximum stock must be greater than zero",
            ));
        }
        if self.maximum_stock <= self.minimum_stock {
            return Err(DomainError::invalid_argument(
                "maximum stock must be greater than minimum stock",
            ));
        }
        Ok(())
    }
}

/// Per-branch, per-product stock row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub id: StockId,
    pub branch_id: BranchId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub minimum_stock: i64,
    pub maximum_stock: i64,
    pub last_restock_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Stock {
    /// First write for a pair; counts as a restock.
    pub fn create(
        id: StockId,
        branch_id: BranchId,
        product_id: ProductId,
        levels: StockLevels,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            branch_id,
            product_id,
            quantity: levels.quantity,
            minimum_stock: levels.minimum_stock,
            maximum_stock: levels.maximum_stock,
            last_restock_date: Some(now),
            updated_at: now,
        }
    }

    /// Full replace of the three numeric fields. `last_restock_date` is untouched.
    pub fn reconfigure(&mut self, levels: StockLevels, now: DateTime<Utc>) {
        self.quantity = levels.quantity;
        self.minimum_stock = levels.minimum_stock;
        self.maximum_stock = levels.maximum_stock;
        self.updated_at = now;
    }

    pub fn below_minimum(&self) -> bool {
        self.quantity < self.minimum_stock
    }

    pub fn can_supply(&self, requested: i64) -> bool {
        self.quantity >= requested
    }

    /// Apply a signed quantity change, refusing to go below zero.
    ///
    /// On error the row is left untouched.
    pub fn apply_delta(&mut self, delta: i64, now: DateTime<Utc>) -> DomainResult<i64> {
        let new_quantity = resulting_quantity(self.quantity, delta)?;
        self.quantity = new_quantity;
        if delta > 0 {
            self.last_restock_date = Some(now);
        }
        self.updated_at = now;
        Ok(new_quantity)
    }
}

impl Entity for Stock {
    type Id = StockId;

    fn id(&self) -> StockId {
        self.id
    }
}

/// `current + delta`, failing if the result would be negative (or overflow).
pub fn resulting_quantity(current: i64, delta: i64) -> DomainResult<i64> {
    match current.checked_add(delta) {
        Some(q) if q >= 0 => Ok(q),
        Some(_) => Err(DomainError::invalid_argument(
            "resulting quantity cannot be negative",
        )),
        None => Err(DomainError::invalid_argument("quantity overflow")),
    }
}
