//! PostgreSQL ledger store

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use shared::{
    BusinessType, InventoryStatus, MovementEntry, OperationType, StockBalance, StockKey,
};

use super::{check_commit, check_entry, BalanceFilter, LedgerStore, MovementFilter};
use crate::error::{AppError, AppResult};

const BALANCE_COLUMNS: &str = "warehouse_id, location_id, goods_id, batch_no, serial_no, \
     quantity, lock_quantity, version, status, production_date, expire_date, updated_at";

const MOVEMENT_COLUMNS: &str = "sequence, id, created_at, warehouse_id, location_id, goods_id, \
     batch_no, serial_no, operation_type, quantity_before, quantity_change, quantity_after, \
     lock_quantity_before, lock_quantity_change, lock_quantity_after, version, status_after, \
     business_type, business_no, operator_id, operator, remark";

/// Balances in `stock_balance`, movements in `stock_movement`.
///
/// Absent batch and serial numbers are stored as empty strings so they can
/// take part in the primary key.
#[derive(Clone)]
pub struct PgLedgerStore {
    db: PgPool,
}

impl PgLedgerStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct BalanceRow {
    warehouse_id: i64,
    location_id: i64,
    goods_id: i64,
    batch_no: String,
    serial_no: String,
    quantity: Decimal,
    lock_quantity: Decimal,
    version: i64,
    status: i32,
    production_date: Option<NaiveDate>,
    expire_date: Option<NaiveDate>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<BalanceRow> for StockBalance {
    type Error = AppError;

    fn try_from(row: BalanceRow) -> AppResult<Self> {
        Ok(StockBalance {
            key: StockKey::from_parts(
                row.warehouse_id,
                row.location_id,
                row.goods_id,
                Some(&row.batch_no),
                Some(&row.serial_no),
            ),
            quantity: row.quantity,
            lock_quantity: row.lock_quantity,
            version: row.version,
            status: InventoryStatus::try_from(row.status)?,
            production_date: row.production_date,
            expire_date: row.expire_date,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    sequence: i64,
    id: Uuid,
    created_at: DateTime<Utc>,
    warehouse_id: i64,
    location_id: i64,
    goods_id: i64,
    batch_no: String,
    serial_no: String,
    operation_type: String,
    quantity_before: Decimal,
    quantity_change: Decimal,
    quantity_after: Decimal,
    lock_quantity_before: Decimal,
    lock_quantity_change: Decimal,
    lock_quantity_after: Decimal,
    version: i64,
    status_after: i32,
    business_type: String,
    business_no: String,
    operator_id: i64,
    operator: String,
    remark: Option<String>,
}

impl TryFrom<MovementRow> for MovementEntry {
    type Error = AppError;

    fn try_from(row: MovementRow) -> AppResult<Self> {
        let operation_type = OperationType::parse(&row.operation_type).ok_or_else(|| {
            AppError::Internal(format!("unknown operation type {}", row.operation_type))
        })?;
        let business_type = BusinessType::parse(&row.business_type).ok_or_else(|| {
            AppError::Internal(format!("unknown business type {}", row.business_type))
        })?;
        Ok(MovementEntry {
            id: row.id,
            sequence: row.sequence,
            timestamp: row.created_at,
            key: StockKey::from_parts(
                row.warehouse_id,
                row.location_id,
                row.goods_id,
                Some(&row.batch_no),
                Some(&row.serial_no),
            ),
            operation_type,
            quantity_before: row.quantity_before,
            quantity_change: row.quantity_change,
            quantity_after: row.quantity_after,
            lock_quantity_before: row.lock_quantity_before,
            lock_quantity_change: row.lock_quantity_change,
            lock_quantity_after: row.lock_quantity_after,
            version: row.version,
            status_after: InventoryStatus::try_from(row.status_after)?,
            business_type,
            business_no: row.business_no,
            operator_id: row.operator_id,
            operator: row.operator,
            remark: row.remark,
        })
    }
}

fn batch_of(key: &StockKey) -> &str {
    key.batch_no.as_deref().unwrap_or("")
}

fn serial_of(key: &StockKey) -> &str {
    key.serial_no.as_deref().unwrap_or("")
}

/// INSERT ... RETURNING for one movement, on any executor
async fn insert_movement<'e, E>(executor: E, entry: &MovementEntry) -> AppResult<MovementEntry>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = sqlx::query_as::<_, MovementRow>(&format!(
        r#"
        INSERT INTO stock_movement (
            id, created_at, warehouse_id, location_id, goods_id, batch_no, serial_no,
            operation_type, quantity_before, quantity_change, quantity_after,
            lock_quantity_before, lock_quantity_change, lock_quantity_after, version,
            status_after, business_type, business_no, operator_id, operator, remark
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
        RETURNING {}
        "#,
        MOVEMENT_COLUMNS
    ))
    .bind(entry.id)
    .bind(entry.timestamp)
    .bind(entry.key.warehouse_id)
    .bind(entry.key.location_id)
    .bind(entry.key.goods_id)
    .bind(batch_of(&entry.key))
    .bind(serial_of(&entry.key))
    .bind(entry.operation_type.as_str())
    .bind(entry.quantity_before)
    .bind(entry.quantity_change)
    .bind(entry.quantity_after)
    .bind(entry.lock_quantity_before)
    .bind(entry.lock_quantity_change)
    .bind(entry.lock_quantity_after)
    .bind(entry.version)
    .bind(entry.status_after.code())
    .bind(entry.business_type.as_str())
    .bind(&entry.business_no)
    .bind(entry.operator_id)
    .bind(&entry.operator)
    .bind(&entry.remark)
    .fetch_one(executor)
    .await?;
    MovementEntry::try_from(row)
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn load(&self, key: &StockKey) -> AppResult<Option<StockBalance>> {
        let row = sqlx::query_as::<_, BalanceRow>(&format!(
            "SELECT {} FROM stock_balance \
             WHERE warehouse_id = $1 AND location_id = $2 AND goods_id = $3 \
               AND batch_no = $4 AND serial_no = $5",
            BALANCE_COLUMNS
        ))
        .bind(key.warehouse_id)
        .bind(key.location_id)
        .bind(key.goods_id)
        .bind(batch_of(key))
        .bind(serial_of(key))
        .fetch_optional(&self.db)
        .await?;

        row.map(StockBalance::try_from).transpose()
    }

    async fn commit(
        &self,
        expected_version: i64,
        next: StockBalance,
        entry: MovementEntry,
    ) -> AppResult<(StockBalance, MovementEntry)> {
        check_commit(expected_version, &next, &entry)?;
        let key = &next.key;
        let mut tx = self.db.begin().await?;

        let affected = if expected_version == 0 {
            // First write for this key; a concurrent creator wins the insert
            sqlx::query(
                r#"
                INSERT INTO stock_balance (
                    warehouse_id, location_id, goods_id, batch_no, serial_no,
                    quantity, lock_quantity, version, status, production_date, expire_date, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
                ON CONFLICT (warehouse_id, location_id, goods_id, batch_no, serial_no) DO NOTHING
                "#,
            )
            .bind(key.warehouse_id)
            .bind(key.location_id)
            .bind(key.goods_id)
            .bind(batch_of(key))
            .bind(serial_of(key))
            .bind(next.quantity)
            .bind(next.lock_quantity)
            .bind(next.version)
            .bind(next.status.code())
            .bind(next.production_date)
            .bind(next.expire_date)
            .execute(&mut *tx)
            .await?
            .rows_affected()
        } else if next.is_empty() {
            sqlx::query(
                r#"
                DELETE FROM stock_balance
                WHERE warehouse_id = $1 AND location_id = $2 AND goods_id = $3
                  AND batch_no = $4 AND serial_no = $5 AND version = $6
                "#,
            )
            .bind(key.warehouse_id)
            .bind(key.location_id)
            .bind(key.goods_id)
            .bind(batch_of(key))
            .bind(serial_of(key))
            .bind(expected_version)
            .execute(&mut *tx)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                r#"
                UPDATE stock_balance
                SET quantity = $6, lock_quantity = $7, version = $8, status = $9,
                    production_date = $10, expire_date = $11, updated_at = NOW()
                WHERE warehouse_id = $1 AND location_id = $2 AND goods_id = $3
                  AND batch_no = $4 AND serial_no = $5 AND version = $12
                "#,
            )
            .bind(key.warehouse_id)
            .bind(key.location_id)
            .bind(key.goods_id)
            .bind(batch_of(key))
            .bind(serial_of(key))
            .bind(next.quantity)
            .bind(next.lock_quantity)
            .bind(next.version)
            .bind(next.status.code())
            .bind(next.production_date)
            .bind(next.expire_date)
            .bind(expected_version)
            .execute(&mut *tx)
            .await?
            .rows_affected()
        };

        if affected == 0 {
            tx.rollback().await?;
            let actual = self.load(key).await?.map_or(0, |b| b.version);
            return Err(AppError::VersionConflict {
                key: next.key,
                expected: expected_version,
                actual,
            });
        }

        let entry = insert_movement(&mut *tx, &entry).await?;
        tx.commit().await?;

        let mut next = next;
        next.updated_at = Some(entry.timestamp);
        Ok((next, entry))
    }

    async fn append(&self, entry: MovementEntry) -> AppResult<MovementEntry> {
        check_entry(&entry)?;
        insert_movement(&self.db, &entry).await
    }

    async fn entries(&self, filter: &MovementFilter) -> AppResult<Vec<MovementEntry>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM stock_movement WHERE TRUE",
            MOVEMENT_COLUMNS
        ));
        if let Some(key) = &filter.key {
            query
                .push(" AND warehouse_id = ")
                .push_bind(key.warehouse_id)
                .push(" AND location_id = ")
                .push_bind(key.location_id)
                .push(" AND goods_id = ")
                .push_bind(key.goods_id)
                .push(" AND batch_no = ")
                .push_bind(batch_of(key).to_string())
                .push(" AND serial_no = ")
                .push_bind(serial_of(key).to_string());
        }
        if let Some(id) = filter.warehouse_id {
            query.push(" AND warehouse_id = ").push_bind(id);
        }
        if let Some(id) = filter.location_id {
            query.push(" AND location_id = ").push_bind(id);
        }
        if let Some(id) = filter.goods_id {
            query.push(" AND goods_id = ").push_bind(id);
        }
        if let Some(batch) = &filter.batch_no {
            query.push(" AND batch_no = ").push_bind(batch.clone());
        }
        if let Some(op) = filter.operation_type {
            query.push(" AND operation_type = ").push_bind(op.as_str());
        }
        if let Some(bt) = filter.business_type {
            query.push(" AND business_type = ").push_bind(bt.as_str());
        }
        if let Some(no) = &filter.business_no {
            query.push(" AND business_no = ").push_bind(no.clone());
        }
        if let Some(from) = filter.range.from {
            query.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.range.to {
            query.push(" AND created_at < ").push_bind(to);
        }
        query.push(" ORDER BY sequence");

        let rows = query
            .build_query_as::<MovementRow>()
            .fetch_all(&self.db)
            .await?;
        rows.into_iter().map(MovementEntry::try_from).collect()
    }

    async fn balances(&self, filter: &BalanceFilter) -> AppResult<Vec<StockBalance>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM stock_balance WHERE TRUE",
            BALANCE_COLUMNS
        ));
        if let Some(id) = filter.warehouse_id {
            query.push(" AND warehouse_id = ").push_bind(id);
        }
        if let Some(id) = filter.goods_id {
            query.push(" AND goods_id = ").push_bind(id);
        }
        if let Some(id) = filter.location_id {
            query.push(" AND location_id = ").push_bind(id);
        }
        if let Some(batch) = &filter.batch_no {
            query.push(" AND batch_no = ").push_bind(batch.clone());
        }
        if let Some(ids) = &filter.location_ids {
            query.push(" AND location_id = ANY(").push_bind(ids.clone()).push(")");
        }
        if let Some(ids) = &filter.goods_ids {
            query.push(" AND goods_id = ANY(").push_bind(ids.clone()).push(")");
        }
        query.push(" ORDER BY warehouse_id, location_id, goods_id, batch_no, serial_no");

        let rows = query
            .build_query_as::<BalanceRow>()
            .fetch_all(&self.db)
            .await?;
        rows.into_iter().map(StockBalance::try_from).collect()
    }
}
