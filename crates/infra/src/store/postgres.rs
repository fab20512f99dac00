//! Postgres-backed inventory store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | DomainError |
//! |------------|----------------------|-------------|
//! | Database (unique violation) | `23505` | `DuplicateResource` |
//! | Database (foreign key violation) | `23503` | `InvalidArgument` |
//! | Database (check constraint violation) | `23514` | `InvalidArgument` |
//! | Database (numeric value out of range) | `22003` | `InvalidArgument` |
//! | Database (other) / PoolClosed / Other | any | `Storage` |
//!
//! ## Ledger updates
//!
//! Quantity changes never read-modify-write. Each delta is a single conditional
//! `UPDATE ... WHERE quantity + $delta >= 0`, so two concurrent EXITs cannot both
//! pass against the same units. When the update touches no row, a follow-up
//! `SELECT` tells a missing row (`NotFound`) from a refused debit (`InvalidArgument`).
//!
//! A movement touching two rows locks them in `(branch_id, product_id)` order
//! before applying its deltas, so opposite transfers queue instead of deadlocking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, Row};
use tracing::instrument;

use pharmacy_core::{BranchId, DomainError, DomainResult, ProductId};
use pharmacy_inventory::{
    resulting_quantity, Batch, Branch, BranchDetails, BranchStatus, LedgerDelta, NewBatch,
    NewMovement, Stock, StockLevels, StockMovement,
};

use super::{
    BatchFilter, BatchStore, BranchStore, MovementFilter, MovementLog, StockFilter, StockLedger,
};

const SCHEMA: &str = include_str!("schema.sql");

const BRANCH_COLUMNS: &str = "id, code, name, address, city, province, phone, email, \
    manager_name, status, opening_time, closing_time, created_at";

const STOCK_COLUMNS: &str = "id, branch_id, product_id, quantity, minimum_stock, \
    maximum_stock, last_restock_date, updated_at";

const MOVEMENT_COLUMNS: &str = "id, branch_id, product_id, movement_type, quantity, reason, \
    reference, destination_branch_id, performed_by, created_at";

const BATCH_COLUMNS: &str = "id, batch_number, product_id, branch_id, quantity, \
    expiration_date, manufacture_date, status, created_at";

/// Postgres inventory store. Cheap to clone; shares the pool.
#[derive(Debug, Clone)]
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> DomainResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> DomainResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn branch_exists(&self, id: BranchId) -> DomainResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        require_branch(&mut conn, id).await
    }
}

#[async_trait]
impl BranchStore for PgInventoryStore {
    #[instrument(skip(self, details), fields(code = %details.code), err)]
    async fn insert_branch(
        &self,
        details: BranchDetails,
        now: DateTime<Utc>,
    ) -> DomainResult<Branch> {
        let sql = format!(
            "INSERT INTO branches (code, name, address, city, province, phone, email, \
             manager_name, status, opening_time, closing_time, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {BRANCH_COLUMNS}"
        );
        let row = bind_branch(sqlx::query(&sql), &details)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| branch_write_error("insert_branch", &details.code, e))?;
        branch_from_row(&row)
    }

    #[instrument(skip(self, details), fields(branch_id = %id), err)]
    async fn update_branch(&self, id: BranchId, details: BranchDetails) -> DomainResult<Branch> {
        let sql = format!(
            "UPDATE branches SET code = $1, name = $2, address = $3, city = $4, province = $5, \
             phone = $6, email = $7, manager_name = $8, status = $9, opening_time = $10, \
             closing_time = $11 \
             WHERE id = $12 \
             RETURNING {BRANCH_COLUMNS}"
        );
        let row = bind_branch(sqlx::query(&sql), &details)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| branch_write_error("update_branch", &details.code, e))?
            .ok_or_else(|| branch_not_found(id))?;
        branch_from_row(&row)
    }

    #[instrument(skip(self), fields(branch_id = %id), err)]
    async fn delete_branch(&self, id: BranchId) -> DomainResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        require_branch(&mut tx, id).await?;

        let referenced: bool = sqlx::query(
            r#"
            SELECT EXISTS (SELECT 1 FROM stock WHERE branch_id = $1)
                OR EXISTS (
                    SELECT 1 FROM stock_movements
                    WHERE branch_id = $1 OR destination_branch_id = $1
                )
                OR EXISTS (SELECT 1 FROM batches WHERE branch_id = $1)
                AS referenced
            "#,
        )
        .bind(id.get())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("delete_branch", e))
        .and_then(|row| column(&row, "referenced"))?;

        if referenced {
            return Err(DomainError::invalid_argument(format!(
                "branch {id} is still referenced by stock, movements or batches"
            )));
        }

        sqlx::query("DELETE FROM branches WHERE id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_branch", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn branch(&self, id: BranchId) -> DomainResult<Option<Branch>> {
        let sql = format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE id = $1");
        sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("branch", e))?
            .map(|row| branch_from_row(&row))
            .transpose()
    }

    async fn branch_by_code(&self, code: &str) -> DomainResult<Option<Branch>> {
        let sql = format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE code = $1");
        sqlx::query(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("branch_by_code", e))?
            .map(|row| branch_from_row(&row))
            .transpose()
    }

    async fn branches(&self, status: Option<BranchStatus>) -> DomainResult<Vec<Branch>> {
        let sql = format!(
            "SELECT {BRANCH_COLUMNS} FROM branches \
             WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY id"
        );
        sqlx::query(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("branches", e))?
            .iter()
            .map(branch_from_row)
            .collect()
    }
}

#[async_trait]
impl StockLedger for PgInventoryStore {
    async fn stock(
        &self,
        branch_id: BranchId,
        product_id: ProductId,
    ) -> DomainResult<Option<Stock>> {
        let sql =
            format!("SELECT {STOCK_COLUMNS} FROM stock WHERE branch_id = $1 AND product_id = $2");
        sqlx::query(&sql)
            .bind(branch_id.get())
            .bind(product_id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("stock", e))?
            .map(|row| stock_from_row(&row))
            .transpose()
    }

    #[instrument(
        skip(self, levels),
        fields(branch_id = %branch_id, product_id = %product_id),
        err
    )]
    async fn upsert_stock(
        &self,
        branch_id: BranchId,
        product_id: ProductId,
        levels: StockLevels,
        now: DateTime<Utc>,
    ) -> DomainResult<(Stock, bool)> {
        self.branch_exists(branch_id).await?;

        // `xmax = 0` only for a freshly inserted tuple.
        let sql = format!(
            "INSERT INTO stock (branch_id, product_id, quantity, minimum_stock, maximum_stock, \
             last_restock_date, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             ON CONFLICT (branch_id, product_id) DO UPDATE SET \
                 quantity = EXCLUDED.quantity, \
                 minimum_stock = EXCLUDED.minimum_stock, \
                 maximum_stock = EXCLUDED.maximum_stock, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING {STOCK_COLUMNS}, (xmax = 0) AS inserted"
        );
        let row = sqlx::query(&sql)
            .bind(branch_id.get())
            .bind(product_id.get())
            .bind(levels.quantity)
            .bind(levels.minimum_stock)
            .bind(levels.maximum_stock)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("upsert_stock", e))?;

        Ok((stock_from_row(&row)?, column(&row, "inserted")?))
    }

    #[instrument(
        skip(self),
        fields(branch_id = %branch_id, product_id = %product_id),
        err
    )]
    async fn apply_delta(
        &self,
        branch_id: BranchId,
        product_id: ProductId,
        delta: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Stock> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        apply_delta_on(&mut conn, branch_id, product_id, delta, now).await
    }

    async fn stock_rows(&self, filter: StockFilter) -> DomainResult<Vec<Stock>> {
        let sql = format!(
            "SELECT {STOCK_COLUMNS} FROM stock \
             WHERE ($1::bigint IS NULL OR branch_id = $1) \
               AND ($2::bigint IS NULL OR product_id = $2) \
               AND (NOT $3 OR quantity < minimum_stock) \
             ORDER BY id"
        );
        sqlx::query(&sql)
            .bind(filter.branch_id.map(BranchId::get))
            .bind(filter.product_id.map(ProductId::get))
            .bind(filter.below_minimum)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("stock_rows", e))?
            .iter()
            .map(stock_from_row)
            .collect()
    }
}

#[async_trait]
impl MovementLog for PgInventoryStore {
    #[instrument(
        skip(self, movement),
        fields(
            branch_id = %movement.branch_id,
            product_id = %movement.product_id,
            movement_type = movement.movement_type.as_str()
        ),
        err
    )]
    async fn record_movement(
        &self,
        movement: NewMovement,
        now: DateTime<Utc>,
    ) -> DomainResult<StockMovement> {
        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        require_branch(&mut tx, movement.branch_id).await?;
        if let Some(destination) = movement.destination_branch_id {
            require_branch(&mut tx, destination).await?;
        }

        let deltas = movement.ledger_deltas();
        lock_stock_rows(&mut tx, &deltas).await?;
        for d in deltas {
            apply_delta_on(&mut tx, d.branch_id, d.product_id, d.delta, now).await?;
        }

        let sql = format!(
            "INSERT INTO stock_movements (branch_id, product_id, movement_type, quantity, reason, \
             reference, destination_branch_id, performed_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {MOVEMENT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(movement.branch_id.get())
            .bind(movement.product_id.get())
            .bind(movement.movement_type.as_str())
            .bind(movement.quantity)
            .bind(&movement.reason)
            .bind(&movement.reference)
            .bind(movement.destination_branch_id.map(BranchId::get))
            .bind(&movement.performed_by)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_movement", e))?;
        let record = movement_from_row(&row)?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(record)
    }

    async fn movements(&self, filter: MovementFilter) -> DomainResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE ($1::bigint IS NULL OR branch_id = $1) \
               AND ($2::bigint IS NULL OR product_id = $2) \
               AND ($3::text IS NULL OR movement_type = $3) \
             ORDER BY id"
        );
        sqlx::query(&sql)
            .bind(filter.branch_id.map(BranchId::get))
            .bind(filter.product_id.map(ProductId::get))
            .bind(filter.movement_type.map(|t| t.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("movements", e))?
            .iter()
            .map(movement_from_row)
            .collect()
    }
}

#[async_trait]
impl BatchStore for PgInventoryStore {
    #[instrument(skip(self, batch), fields(branch_id = %batch.branch_id), err)]
    async fn insert_batch(&self, batch: NewBatch, now: DateTime<Utc>) -> DomainResult<Batch> {
        self.branch_exists(batch.branch_id).await?;

        let sql = format!(
            "INSERT INTO batches (batch_number, product_id, branch_id, quantity, \
             expiration_date, manufacture_date, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {BATCH_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(batch.batch_number.trim())
            .bind(batch.product_id.get())
            .bind(batch.branch_id.get())
            .bind(batch.quantity)
            .bind(batch.expiration_date)
            .bind(batch.manufacture_date)
            .bind(batch.status.as_str())
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_batch", e))?;
        batch_from_row(&row)
    }

    async fn batches(&self, filter: BatchFilter) -> DomainResult<Vec<Batch>> {
        let sql = format!(
            "SELECT {BATCH_COLUMNS} FROM batches \
             WHERE ($1::bigint IS NULL OR branch_id = $1) \
               AND ($2::bigint IS NULL OR product_id = $2) \
               AND ($3::text IS NULL OR status = $3) \
               AND ($4::date IS NULL OR expiration_date >= $4) \
               AND ($5::date IS NULL OR expiration_date <= $5) \
             ORDER BY id"
        );
        sqlx::query(&sql)
            .bind(filter.branch_id.map(BranchId::get))
            .bind(filter.product_id.map(ProductId::get))
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.expires_on_or_after)
            .bind(filter.expires_on_or_before)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("batches", e))?
            .iter()
            .map(batch_from_row)
            .collect()
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>;

/// Binds `$1..$11` in `BRANCH_COLUMNS` order (without id and created_at).
fn bind_branch<'q>(query: PgQuery<'q>, d: &'q BranchDetails) -> PgQuery<'q> {
    query
        .bind(&d.code)
        .bind(&d.name)
        .bind(&d.address)
        .bind(&d.city)
        .bind(&d.province)
        .bind(&d.phone)
        .bind(&d.email)
        .bind(&d.manager_name)
        .bind(d.status.as_str())
        .bind(d.opening_time)
        .bind(d.closing_time)
}

async fn require_branch(conn: &mut PgConnection, id: BranchId) -> DomainResult<()> {
    sqlx::query("SELECT 1 FROM branches WHERE id = $1")
        .bind(id.get())
        .fetch_optional(conn)
        .await
        .map_err(|e| map_sqlx_error("require_branch", e))?
        .map(|_| ())
        .ok_or_else(|| branch_not_found(id))
}

/// Take row locks on every stock row in `deltas`, in key order.
///
/// Missing rows are skipped; the delta itself reports them as `NotFound`.
async fn lock_stock_rows(conn: &mut PgConnection, deltas: &[LedgerDelta]) -> DomainResult<()> {
    let mut keys: Vec<(BranchId, ProductId)> =
        deltas.iter().map(|d| (d.branch_id, d.product_id)).collect();
    keys.sort();
    keys.dedup();

    for (branch_id, product_id) in keys {
        sqlx::query("SELECT id FROM stock WHERE branch_id = $1 AND product_id = $2 FOR UPDATE")
            .bind(branch_id.get())
            .bind(product_id.get())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("lock_stock_rows", e))?;
    }
    Ok(())
}

async fn apply_delta_on(
    conn: &mut PgConnection,
    branch_id: BranchId,
    product_id: ProductId,
    delta: i64,
    now: DateTime<Utc>,
) -> DomainResult<Stock> {
    let sql = format!(
        "UPDATE stock SET \
             quantity = quantity + $3, \
             last_restock_date = CASE WHEN $3 > 0 THEN $4 ELSE last_restock_date END, \
             updated_at = $4 \
         WHERE branch_id = $1 AND product_id = $2 AND quantity + $3 >= 0 \
         RETURNING {STOCK_COLUMNS}"
    );
    let updated = sqlx::query(&sql)
        .bind(branch_id.get())
        .bind(product_id.get())
        .bind(delta)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("apply_delta", e))?;

    if let Some(row) = updated {
        return stock_from_row(&row);
    }

    let current: Option<i64> =
        sqlx::query("SELECT quantity FROM stock WHERE branch_id = $1 AND product_id = $2")
            .bind(branch_id.get())
            .bind(product_id.get())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("apply_delta", e))?
            .map(|row| column(&row, "quantity"))
            .transpose()?;

    match current {
        None => Err(DomainError::not_found(format!(
            "stock not found for product {product_id} in branch {branch_id}"
        ))),
        Some(quantity) => Err(resulting_quantity(quantity, delta).err().unwrap_or_else(|| {
            DomainError::invalid_argument("resulting quantity cannot be negative")
        })),
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> DomainResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::storage(format!("failed to read column {name}: {e}")))
}

fn branch_from_row(row: &PgRow) -> DomainResult<Branch> {
    let status: String = column(row, "status")?;
    Ok(Branch {
        id: BranchId::new(column(row, "id")?),
        details: BranchDetails {
            code: column(row, "code")?,
            name: column(row, "name")?,
            address: column(row, "address")?,
            city: column(row, "city")?,
            province: column(row, "province")?,
            phone: column(row, "phone")?,
            email: column(row, "email")?,
            manager_name: column(row, "manager_name")?,
            status: status.parse().map_err(stored_value)?,
            opening_time: column(row, "opening_time")?,
            closing_time: column(row, "closing_time")?,
        },
        created_at: column(row, "created_at")?,
    })
}

fn stock_from_row(row: &PgRow) -> DomainResult<Stock> {
    Ok(Stock {
        id: column::<i64>(row, "id")?.into(),
        branch_id: column::<i64>(row, "branch_id")?.into(),
        product_id: column::<i64>(row, "product_id")?.into(),
        quantity: column(row, "quantity")?,
        minimum_stock: column(row, "minimum_stock")?,
        maximum_stock: column(row, "maximum_stock")?,
        last_restock_date: column(row, "last_restock_date")?,
        updated_at: column(row, "updated_at")?,
    })
}

fn movement_from_row(row: &PgRow) -> DomainResult<StockMovement> {
    let movement_type: String = column(row, "movement_type")?;
    Ok(StockMovement {
        id: column::<i64>(row, "id")?.into(),
        branch_id: column::<i64>(row, "branch_id")?.into(),
        product_id: column::<i64>(row, "product_id")?.into(),
        movement_type: movement_type.parse().map_err(stored_value)?,
        quantity: column(row, "quantity")?,
        reason: column(row, "reason")?,
        reference: column(row, "reference")?,
        destination_branch_id: column::<Option<i64>>(row, "destination_branch_id")?
            .map(BranchId::new),
        performed_by: column(row, "performed_by")?,
        created_at: column(row, "created_at")?,
    })
}

fn batch_from_row(row: &PgRow) -> DomainResult<Batch> {
    let status: String = column(row, "status")?;
    Ok(Batch {
        id: column::<i64>(row, "id")?.into(),
        batch_number: column(row, "batch_number")?,
        product_id: column::<i64>(row, "product_id")?.into(),
        branch_id: column::<i64>(row, "branch_id")?.into(),
        quantity: column(row, "quantity")?,
        expiration_date: column(row, "expiration_date")?,
        manufacture_date: column(row, "manufacture_date")?,
        status: status.parse().map_err(stored_value)?,
        created_at: column(row, "created_at")?,
    })
}

/// An enum column held a value this build does not know.
fn stored_value(err: DomainError) -> DomainError {
    DomainError::storage(format!("unreadable stored value: {err}"))
}

fn branch_not_found(id: BranchId) -> DomainError {
    DomainError::not_found(format!("branch {id} not found"))
}

fn branch_write_error(operation: &str, code: &str, err: sqlx::Error) -> DomainError {
    if is_unique_violation(&err) {
        DomainError::duplicate(format!("a branch with code {code} already exists"))
    } else {
        map_sqlx_error(operation, err)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Map SQLx errors to DomainError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => DomainError::duplicate(msg),
                Some("23503") | Some("23514") => DomainError::invalid_argument(msg),
                Some("22003") => {
                    DomainError::invalid_argument(format!("quantity overflow: {msg}"))
                }
                _ => DomainError::storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            DomainError::storage(format!("connection pool closed in {operation}"))
        }
        _ => DomainError::storage(format!("sqlx error in {operation}: {err}")),
    }
}
