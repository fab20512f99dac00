//! Batches (lots) and expiry bookkeeping.
//!
//! Batches are tracked independently from the stock ledger: creating or
//! expiring a batch never touches `Stock.quantity`.

use core::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use pharmacy_core::{BatchId, BranchId, DomainError, DomainResult, Entity, ProductId};

/// Days ahead of today that count as "expiring soon".
pub const EXPIRY_WINDOW_DAYS: i64 = 30;

const MAX_BATCH_NUMBER_LEN: usize = 100;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Available,
    Expired,
    Depleted,
    Recalled,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Available => "AVAILABLE",
            BatchStatus::Expired => "EXPIRED",
            BatchStatus::Depleted => "DEPLETED",
            BatchStatus::Recalled => "RECALLED",
        }
    }
}

impl FromStr for BatchStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AVAILABLE" => Ok(BatchStatus::Available),
            "EXPIRED" => Ok(BatchStatus::Expired),
            "DEPLETED" => Ok(BatchStatus::Depleted),
            "RECALLED" => Ok(BatchStatus::Recalled),
            other => Err(DomainError::invalid_argument(format!(
                "unknown batch status '{other}'"
            ))),
        }
    }
}

/// Last day (inclusive) of the expiry window starting at `today`.
pub fn expiry_window_end(today: NaiveDate) -> NaiveDate {
    today + Duration::days(EXPIRY_WINDOW_DAYS)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBatch {
    pub batch_number: String,
    pub product_id: ProductId,
    pub branch_id: BranchId,
    pub quantity: i64,
    pub expiration_date: Option<NaiveDate>,
    pub manufacture_date: Option<NaiveDate>,
    pub status: BatchStatus,
}

impl NewBatch {
    pub fn validate(&self, today: NaiveDate) -> DomainResult<()> {
        let number = self.batch_number.trim();
        if number.is_empty() {
            return Err(DomainError::invalid_argument("batch number cannot be empty"));
        }
        if number.chars().count() > MAX_BATCH_NUMBER_LEN {
            return Err(DomainError::invalid_argument(format!(
                "batch number cannot exceed {MAX_BATCH_NUMBER_LEN} characters"
            )));
        }
        if self.quantity <= 0 {
            return Err(DomainError::invalid_argument(
                "quantity must be greater than zero",
            ));
        }
        if let Some(expiration) = self.expiration_date {
            if expiration <= today {
                return Err(DomainError::invalid_argument(
                    "expiration date must be in the future",
                ));
            }
        }
        if let Some(manufactured) = self.manufacture_date {
            if manufactured > today {
                return Err(DomainError::invalid_argument(
                    "manufacture date cannot be in the future",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub batch_number: String,
    pub product_id: ProductId,
    pub branch_id: BranchId,
    pub quantity: i64,
    pub expiration_date: Option<NaiveDate>,
    pub manufacture_date: Option<NaiveDate>,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn create(id: BatchId, batch: NewBatch, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            batch_number: batch.batch_number.trim().to_string(),
            product_id: batch.product_id,
            branch_id: batch.branch_id,
            quantity: batch.quantity,
            expiration_date: batch.expiration_date,
            manufacture_date: batch.manufacture_date,
            status: batch.status,
            created_at,
        }
    }

    /// Expires strictly before `today + 30 days`. Already-expired dates count too;
    /// a batch without an expiration date never does.
    pub fn expiring_soon(&self, today: NaiveDate) -> bool {
        self.expiration_date
            .is_some_and(|exp| exp < expiry_window_end(today))
    }

    /// AVAILABLE and expiring within `[from, until]`.
    pub fn available_expiring_between(&self, from: NaiveDate, until: NaiveDate) -> bool {
        self.status == BatchStatus::Available
            && self
                .expiration_date
                .is_some_and(|exp| exp >= from && exp <= until)
    }
}

impl Entity for Batch {
    type Id = BatchId;

    fn id(&self) -> BatchId {
        self.id
    }
}
