use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::{json, Value};

use pharmacy_core::{BranchId, ProductId};
use pharmacy_infra::services::{BatchView, MovementView, StockView};
use pharmacy_inventory::{
    BatchStatus, Branch, BranchDetails, BranchStatus, MovementType, NewBatch, NewMovement,
    StockLevels,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct BranchRequest {
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub manager_name: Option<String>,
    pub status: Option<BranchStatus>,
    pub opening_time: Option<NaiveTime>,
    pub closing_time: Option<NaiveTime>,
}

impl From<BranchRequest> for BranchDetails {
    fn from(r: BranchRequest) -> Self {
        BranchDetails {
            code: r.code,
            name: r.name,
            address: r.address,
            city: r.city,
            province: r.province,
            phone: r.phone,
            email: r.email,
            manager_name: r.manager_name,
            status: r.status.unwrap_or(BranchStatus::Active),
            opening_time: r.opening_time,
            closing_time: r.closing_time,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub branch_id: BranchId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub minimum_stock: i64,
    pub maximum_stock: i64,
}

impl StockRequest {
    pub fn levels(&self) -> StockLevels {
        StockLevels::new(self.quantity, self.minimum_stock, self.maximum_stock)
    }
}

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub branch_id: BranchId,
    pub product_id: ProductId,
    #[serde(rename = "type", alias = "movement_type")]
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub destination_branch_id: Option<BranchId>,
    pub performed_by: Option<String>,
}

impl From<MovementRequest> for NewMovement {
    fn from(r: MovementRequest) -> Self {
        NewMovement {
            branch_id: r.branch_id,
            product_id: r.product_id,
            movement_type: r.movement_type,
            quantity: r.quantity,
            reason: r.reason,
            reference: r.reference,
            destination_branch_id: r.destination_branch_id,
            performed_by: r.performed_by,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub batch_number: String,
    pub product_id: ProductId,
    pub branch_id: BranchId,
    pub quantity: i64,
    pub expiration_date: Option<NaiveDate>,
    pub manufacture_date: Option<NaiveDate>,
    pub status: Option<BatchStatus>,
}

impl From<BatchRequest> for NewBatch {
    fn from(r: BatchRequest) -> Self {
        NewBatch {
            batch_number: r.batch_number,
            product_id: r.product_id,
            branch_id: r.branch_id,
            quantity: r.quantity,
            expiration_date: r.expiration_date,
            manufacture_date: r.manufacture_date,
            status: r.status.unwrap_or(BatchStatus::Available),
        }
    }
}

/// `?status=` on list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

/// `?type=` on the movement list.
#[derive(Debug, Default, Deserialize)]
pub struct MovementTypeQuery {
    #[serde(rename = "type")]
    pub movement_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    pub branch_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub branch_id: String,
    pub product_id: String,
    pub quantity: i64,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn branch_to_json(b: &Branch) -> Value {
    let d = &b.details;
    json!({
        "id": b.id,
        "code": d.code,
        "name": d.name,
        "address": d.address,
        "city": d.city,
        "province": d.province,
        "phone": d.phone,
        "email": d.email,
        "manager_name": d.manager_name,
        "status": d.status,
        "opening_time": d.opening_time,
        "closing_time": d.closing_time,
        "created_at": b.created_at.to_rfc3339(),
    })
}

pub fn stock_to_json(v: &StockView) -> Value {
    let s = &v.stock;
    json!({
        "id": s.id,
        "branch_id": s.branch_id,
        "branch_name": v.branch_name,
        "product_id": s.product_id,
        "quantity": s.quantity,
        "minimum_stock": s.minimum_stock,
        "maximum_stock": s.maximum_stock,
        "below_minimum": v.below_minimum,
        "last_restock_date": s.last_restock_date.map(|t| t.to_rfc3339()),
        "updated_at": s.updated_at.to_rfc3339(),
    })
}

pub fn movement_to_json(v: &MovementView) -> Value {
    let m = &v.movement;
    json!({
        "id": m.id,
        "branch_id": m.branch_id,
        "branch_name": v.branch_name,
        "product_id": m.product_id,
        "type": m.movement_type,
        "quantity": m.quantity,
        "reason": m.reason,
        "reference": m.reference,
        "destination_branch_id": m.destination_branch_id,
        "destination_branch_name": v.destination_branch_name,
        "performed_by": m.performed_by,
        "created_at": m.created_at.to_rfc3339(),
    })
}

pub fn batch_to_json(v: &BatchView) -> Value {
    let b = &v.batch;
    json!({
        "id": b.id,
        "batch_number": b.batch_number,
        "product_id": b.product_id,
        "branch_id": b.branch_id,
        "branch_name": v.branch_name,
        "quantity": b.quantity,
        "expiration_date": b.expiration_date,
        "manufacture_date": b.manufacture_date,
        "status": b.status,
        "expiring_soon": v.expiring_soon,
        "created_at": b.created_at.to_rfc3339(),
    })
}

pub fn list_to_json<T>(items: &[T], f: fn(&T) -> Value) -> Value {
    Value::Array(items.iter().map(f).collect())
}
