//! Bounded retry with re-read on version conflicts

use std::future::Future;

use rust_decimal::Decimal;

use shared::{InventoryStatus, OperationType, StockBalance, StockKey};

use super::ledger::{Ledger, MovementMeta};
use crate::error::{AppError, AppResult};

/// How many times a ledger call is attempted before giving up
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Re-read the balance and run `op` against it until it stops reporting a
    /// version conflict, at most `max_attempts` times.
    pub async fn run<T, F, Fut>(&self, ledger: &Ledger, key: &StockKey, mut op: F) -> AppResult<T>
    where
        F: FnMut(StockBalance) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        for attempt in 1..=self.max_attempts {
            let balance = ledger.get_balance(key).await?;
            match op(balance).await {
                Err(err) if err.is_retryable() => {
                    tracing::warn!(
                        key = %key,
                        attempt,
                        max_attempts = self.max_attempts,
                        "version conflict, re-reading: {}",
                        err
                    );
                }
                other => return other,
            }
        }
        Err(AppError::ConcurrencyExhausted {
            key: key.clone(),
            attempts: self.max_attempts,
        })
    }
}

/// The ledger operations with the retry policy applied.
///
/// This is what document services use; each call reads the latest version
/// itself.
#[derive(Clone)]
pub struct RetryingLedger {
    ledger: Ledger,
    policy: RetryPolicy,
}

impl RetryingLedger {
    pub fn new(ledger: Ledger, policy: RetryPolicy) -> Self {
        Self { ledger, policy }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub async fn adjust(
        &self,
        key: &StockKey,
        delta: Decimal,
        operation: OperationType,
        meta: &MovementMeta,
    ) -> AppResult<StockBalance> {
        let ledger = &self.ledger;
        self.policy
            .run(ledger, key, |b| {
                ledger.adjust(key, delta, b.version, operation, meta)
            })
            .await
    }

    pub async fn lock(
        &self,
        key: &StockKey,
        amount: Decimal,
        meta: &MovementMeta,
    ) -> AppResult<StockBalance> {
        let ledger = &self.ledger;
        self.policy
            .run(ledger, key, |b| ledger.lock(key, amount, b.version, meta))
            .await
    }

    pub async fn unlock(
        &self,
        key: &StockKey,
        amount: Decimal,
        meta: &MovementMeta,
    ) -> AppResult<StockBalance> {
        let ledger = &self.ledger;
        self.policy
            .run(ledger, key, |b| ledger.unlock(key, amount, b.version, meta))
            .await
    }

    pub async fn consume_locked(
        &self,
        key: &StockKey,
        amount: Decimal,
        operation: OperationType,
        meta: &MovementMeta,
    ) -> AppResult<StockBalance> {
        let ledger = &self.ledger;
        self.policy
            .run(ledger, key, |b| {
                ledger.consume_locked(key, amount, b.version, operation, meta)
            })
            .await
    }

    pub async fn set_status(
        &self,
        key: &StockKey,
        status: InventoryStatus,
        meta: &MovementMeta,
    ) -> AppResult<StockBalance> {
        let ledger = &self.ledger;
        self.policy
            .run(ledger, key, |b| ledger.set_status(key, status, b.version, meta))
            .await
    }
}
