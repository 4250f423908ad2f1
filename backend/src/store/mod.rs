//! Durable storage for stock balances and the movement log
//!
//! A store knows nothing about business rules. It offers one write primitive,
//! a compare-and-swap of a single balance together with the movement entry
//! describing the change, plus read access for the projector.

use async_trait::async_trait;

use shared::{
    BusinessType, MovementEntry, OperationType, StockBalance, StockKey, TimeRange,
};

use crate::error::{AppError, AppResult};

mod memory;
mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Which movement entries a read wants
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub key: Option<StockKey>,
    pub warehouse_id: Option<i64>,
    pub location_id: Option<i64>,
    pub goods_id: Option<i64>,
    pub batch_no: Option<String>,
    pub operation_type: Option<OperationType>,
    pub business_type: Option<BusinessType>,
    pub business_no: Option<String>,
    pub range: TimeRange,
}

impl MovementFilter {
    pub fn for_key(key: StockKey, range: TimeRange) -> Self {
        Self {
            key: Some(key),
            range,
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &MovementEntry) -> bool {
        self.key.as_ref().map_or(true, |k| *k == entry.key)
            && self.warehouse_id.map_or(true, |id| id == entry.key.warehouse_id)
            && self.location_id.map_or(true, |id| id == entry.key.location_id)
            && self.goods_id.map_or(true, |id| id == entry.key.goods_id)
            && self
                .batch_no
                .as_deref()
                .map_or(true, |b| entry.key.batch_no.as_deref() == Some(b))
            && self.operation_type.map_or(true, |op| op == entry.operation_type)
            && self.business_type.map_or(true, |bt| bt == entry.business_type)
            && self
                .business_no
                .as_deref()
                .map_or(true, |no| entry.business_no == no)
            && self.range.contains(entry.timestamp)
    }
}

/// Which balances a read wants
#[derive(Debug, Clone, Default)]
pub struct BalanceFilter {
    pub warehouse_id: Option<i64>,
    pub goods_id: Option<i64>,
    pub location_id: Option<i64>,
    pub batch_no: Option<String>,
    /// Restrict to any of these locations
    pub location_ids: Option<Vec<i64>>,
    /// Restrict to any of these goods
    pub goods_ids: Option<Vec<i64>>,
}

impl BalanceFilter {
    pub fn warehouse(warehouse_id: i64) -> Self {
        Self {
            warehouse_id: Some(warehouse_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, balance: &StockBalance) -> bool {
        let key = &balance.key;
        self.warehouse_id.map_or(true, |id| id == key.warehouse_id)
            && self.goods_id.map_or(true, |id| id == key.goods_id)
            && self.location_id.map_or(true, |id| id == key.location_id)
            && self
                .batch_no
                .as_deref()
                .map_or(true, |b| key.batch_no.as_deref() == Some(b))
            && self
                .location_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&key.location_id))
            && self
                .goods_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&key.goods_id))
    }
}

/// Storage seam for the ledger
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current balance for `key`, or `None` if it has never been written (or was emptied)
    async fn load(&self, key: &StockKey) -> AppResult<Option<StockBalance>>;

    /// Atomically replace the balance at `next.key` if its stored version
    /// equals `expected_version` (0 for absent), and append `entry`.
    ///
    /// An empty `next` deletes the balance, so versions are monotonic over
    /// one balance's lifetime, not per key: stock arriving again at an
    /// emptied key starts a new balance at version 1. The movement log keeps
    /// every lifetime of the key in sequence order. The store assigns the
    /// entry's sequence number. Fails with `VersionConflict` when the versions differ
    /// and with a validation error when the entry's arithmetic is wrong.
    async fn commit(
        &self,
        expected_version: i64,
        next: StockBalance,
        entry: MovementEntry,
    ) -> AppResult<(StockBalance, MovementEntry)>;

    /// Append an entry without touching any balance
    async fn append(&self, entry: MovementEntry) -> AppResult<MovementEntry>;

    /// Matching entries in append order
    async fn entries(&self, filter: &MovementFilter) -> AppResult<Vec<MovementEntry>>;

    /// Matching balances ordered by key
    async fn balances(&self, filter: &BalanceFilter) -> AppResult<Vec<StockBalance>>;
}

/// The movement-log append contract: after = before + change
pub fn check_entry(entry: &MovementEntry) -> AppResult<()> {
    if !entry.is_arithmetic_consistent() {
        return Err(AppError::validation(
            "quantityAfter",
            format!(
                "movement on {} does not satisfy after = before + change",
                entry.key
            ),
        ));
    }
    Ok(())
}

/// A commit's entry must describe exactly the transition being committed
pub(crate) fn check_commit(
    expected_version: i64,
    next: &StockBalance,
    entry: &MovementEntry,
) -> AppResult<()> {
    check_entry(entry)?;
    if !next.is_consistent() {
        return Err(AppError::InvalidState(format!(
            "balance {} would break 0 <= lock <= quantity",
            next.key
        )));
    }
    if entry.key != next.key
        || entry.quantity_after != next.quantity
        || entry.lock_quantity_after != next.lock_quantity
        || entry.version != expected_version + 1
    {
        return Err(AppError::Internal(format!(
            "movement entry does not match balance {}",
            next.key
        )));
    }
    Ok(())
}
