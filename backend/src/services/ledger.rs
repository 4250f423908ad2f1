//! Stock ledger: versioned balance mutations
//!
//! Every mutation names the version it was computed against. The ledger
//! validates the change, builds the matching movement entry and hands both to
//! the store as one compare-and-swap. It never retries; callers that want to
//! retry go through [`RetryingLedger`](super::retry::RetryingLedger).

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    validate_stored_decimal, BusinessType, InventoryStatus, MovementEntry, OperationType,
    OperatorContext, StockBalance, StockKey,
};

use crate::error::{AppError, AppResult, ValidateField};
use crate::store::{BalanceFilter, LedgerStore};

/// Back-reference and audit fields carried onto each movement entry
#[derive(Debug, Clone)]
pub struct MovementMeta {
    pub business_type: BusinessType,
    pub business_no: String,
    pub operator: OperatorContext,
    pub remark: Option<String>,
    /// Stored on the balance if this movement creates it
    pub production_date: Option<NaiveDate>,
    pub expire_date: Option<NaiveDate>,
}

impl MovementMeta {
    pub fn new(
        business_type: BusinessType,
        business_no: impl Into<String>,
        operator: &OperatorContext,
    ) -> Self {
        Self {
            business_type,
            business_no: business_no.into(),
            operator: operator.clone(),
            remark: None,
            production_date: None,
            expire_date: None,
        }
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    pub fn with_batch_dates(
        mut self,
        production_date: Option<NaiveDate>,
        expire_date: Option<NaiveDate>,
    ) -> Self {
        self.production_date = production_date;
        self.expire_date = expire_date;
        self
    }
}

/// Ledger over a [`LedgerStore`]
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Current balance, or a zero balance at version 0 if the key has none
    pub async fn get_balance(&self, key: &StockKey) -> AppResult<StockBalance> {
        Ok(self
            .store
            .load(key)
            .await?
            .unwrap_or_else(|| StockBalance::zero(key.clone())))
    }

    /// All balances matching `filter`
    pub async fn balances(&self, filter: &BalanceFilter) -> AppResult<Vec<StockBalance>> {
        self.store.balances(filter).await
    }

    /// Change on-hand quantity by `delta` (signed).
    ///
    /// The result must keep `quantity >= lockQuantity`.
    pub async fn adjust(
        &self,
        key: &StockKey,
        delta: Decimal,
        expected_version: i64,
        operation: OperationType,
        meta: &MovementMeta,
    ) -> AppResult<StockBalance> {
        match operation {
            OperationType::Inbound
            | OperationType::Outbound
            | OperationType::MoveIn
            | OperationType::MoveOut
            | OperationType::TakingAdjust => {}
            OperationType::Lock | OperationType::Unlock | OperationType::StatusChange => {
                return Err(AppError::validation(
                    "operationType",
                    format!("{} is not a quantity adjustment", operation.as_str()),
                ));
            }
        }
        if delta.is_zero() {
            return Err(AppError::validation("delta", "Adjustment cannot be zero"));
        }
        validate_stored_decimal(delta).on_field("delta")?;

        let current = self.current(key, expected_version).await?;
        let quantity = stored_sum(current.quantity, delta, key)?;
        if quantity < current.lock_quantity {
            return Err(AppError::InsufficientAvailable {
                key: key.clone(),
                requested: -delta,
                available: current.available(),
            });
        }

        let mut next = current.clone();
        next.quantity = quantity;
        if current.version == 0 {
            next.production_date = meta.production_date;
            next.expire_date = meta.expire_date;
        }
        self.apply(current, next, operation, meta).await
    }

    /// Reserve `amount` of available quantity
    pub async fn lock(
        &self,
        key: &StockKey,
        amount: Decimal,
        expected_version: i64,
        meta: &MovementMeta,
    ) -> AppResult<StockBalance> {
        require_positive(amount)?;
        let current = self.current(key, expected_version).await?;
        if !current.status.is_lockable() {
            return Err(AppError::InvalidState(format!(
                "stock {} is {} and cannot be locked",
                key, current.status
            )));
        }
        if current.available() < amount {
            return Err(AppError::InsufficientAvailable {
                key: key.clone(),
                requested: amount,
                available: current.available(),
            });
        }

        let mut next = current.clone();
        next.lock_quantity = stored_sum(current.lock_quantity, amount, key)?;
        self.apply(current, next, OperationType::Lock, meta).await
    }

    /// Return `amount` of locked quantity to available
    pub async fn unlock(
        &self,
        key: &StockKey,
        amount: Decimal,
        expected_version: i64,
        meta: &MovementMeta,
    ) -> AppResult<StockBalance> {
        require_positive(amount)?;
        let current = self.current(key, expected_version).await?;
        if amount > current.lock_quantity {
            return Err(AppError::InvalidState(format!(
                "cannot unlock {} on {}: only {} locked",
                amount, key, current.lock_quantity
            )));
        }

        let mut next = current.clone();
        next.lock_quantity = stored_sum(current.lock_quantity, -amount, key)?;
        self.apply(current, next, OperationType::Unlock, meta).await
    }

    /// Deduct `amount` from both quantity and lock quantity in one versioned step
    pub async fn consume_locked(
        &self,
        key: &StockKey,
        amount: Decimal,
        expected_version: i64,
        operation: OperationType,
        meta: &MovementMeta,
    ) -> AppResult<StockBalance> {
        if !matches!(operation, OperationType::Outbound | OperationType::MoveOut) {
            return Err(AppError::validation(
                "operationType",
                format!("{} cannot consume locked stock", operation.as_str()),
            ));
        }
        require_positive(amount)?;
        let current = self.current(key, expected_version).await?;
        if amount > current.lock_quantity {
            return Err(AppError::InvalidState(format!(
                "cannot consume {} on {}: only {} locked",
                amount, key, current.lock_quantity
            )));
        }

        let mut next = current.clone();
        next.quantity = stored_sum(current.quantity, -amount, key)?;
        next.lock_quantity = stored_sum(current.lock_quantity, -amount, key)?;
        self.apply(current, next, operation, meta).await
    }

    /// Change the quality status of an existing balance
    pub async fn set_status(
        &self,
        key: &StockKey,
        status: InventoryStatus,
        expected_version: i64,
        meta: &MovementMeta,
    ) -> AppResult<StockBalance> {
        let current = self.current(key, expected_version).await?;
        if current.version == 0 {
            return Err(AppError::NotFound(format!("Stock {}", key)));
        }
        if current.status == status {
            return Ok(current);
        }

        let mut next = current.clone();
        next.status = status;
        self.apply(current, next, OperationType::StatusChange, meta)
            .await
    }

    /// Read the balance and fail fast if it has already moved past `expected_version`
    async fn current(&self, key: &StockKey, expected_version: i64) -> AppResult<StockBalance> {
        let current = self.get_balance(key).await?;
        if current.version != expected_version {
            return Err(AppError::VersionConflict {
                key: key.clone(),
                expected: expected_version,
                actual: current.version,
            });
        }
        Ok(current)
    }

    async fn apply(
        &self,
        current: StockBalance,
        mut next: StockBalance,
        operation: OperationType,
        meta: &MovementMeta,
    ) -> AppResult<StockBalance> {
        next.version = current.version + 1;
        let entry = MovementEntry {
            id: Uuid::new_v4(),
            sequence: 0,
            timestamp: Utc::now(),
            key: next.key.clone(),
            operation_type: operation,
            quantity_before: current.quantity,
            quantity_change: next.quantity - current.quantity,
            quantity_after: next.quantity,
            lock_quantity_before: current.lock_quantity,
            lock_quantity_change: next.lock_quantity - current.lock_quantity,
            lock_quantity_after: next.lock_quantity,
            version: next.version,
            status_after: next.status,
            business_type: meta.business_type,
            business_no: meta.business_no.clone(),
            operator_id: meta.operator.operator_id,
            operator: meta.operator.operator_name.clone(),
            remark: meta.remark.clone(),
        };

        let (balance, entry) = self.store.commit(current.version, next, entry).await?;
        tracing::debug!(
            key = %balance.key,
            operation = entry.operation_type.as_str(),
            quantity_change = %entry.quantity_change,
            lock_change = %entry.lock_quantity_change,
            version = balance.version,
            business_no = %entry.business_no,
            "ledger mutation applied"
        );
        Ok(balance)
    }
}

fn require_positive(amount: Decimal) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::validation(
            "amount",
            "Quantity must be greater than zero",
        ));
    }
    validate_stored_decimal(amount).on_field("amount")
}

/// `base + change`, refused when the result would not fit a stored balance
fn stored_sum(base: Decimal, change: Decimal, key: &StockKey) -> AppResult<Decimal> {
    base.checked_add(change)
        .filter(|sum| validate_stored_decimal(*sum).is_ok())
        .ok_or_else(|| {
            AppError::validation(
                "quantity",
                format!("Balance of {} would exceed the storable quantity", key),
            )
        })
}
