//! In-process ledger store

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use shared::{MovementEntry, StockBalance, StockKey};

use super::{check_commit, check_entry, BalanceFilter, LedgerStore, MovementFilter};
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct Inner {
    balances: BTreeMap<StockKey, StockBalance>,
    entries: Vec<MovementEntry>,
    next_sequence: i64,
}

impl Inner {
    fn push(&mut self, mut entry: MovementEntry) -> MovementEntry {
        self.next_sequence += 1;
        entry.sequence = self.next_sequence;
        self.entries.push(entry.clone());
        entry
    }
}

/// Balances and movement log behind one `RwLock`.
///
/// The version check, the balance write and the log append happen under a
/// single write guard, so readers never see one without the other.
#[derive(Default)]
pub struct MemoryLedgerStore {
    inner: RwLock<Inner>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn load(&self, key: &StockKey) -> AppResult<Option<StockBalance>> {
        Ok(self.inner.read().await.balances.get(key).cloned())
    }

    async fn commit(
        &self,
        expected_version: i64,
        next: StockBalance,
        entry: MovementEntry,
    ) -> AppResult<(StockBalance, MovementEntry)> {
        check_commit(expected_version, &next, &entry)?;

        let mut inner = self.inner.write().await;
        let actual = inner.balances.get(&next.key).map_or(0, |b| b.version);
        if actual != expected_version {
            return Err(AppError::VersionConflict {
                key: next.key,
                expected: expected_version,
                actual,
            });
        }

        // Stamped under the guard so per-key log order matches timestamp order
        let now = Utc::now();
        let mut next = next;
        next.updated_at = Some(now);
        let mut entry = entry;
        entry.timestamp = now;

        if next.is_empty() {
            inner.balances.remove(&next.key);
        } else {
            inner.balances.insert(next.key.clone(), next.clone());
        }
        let entry = inner.push(entry);
        Ok((next, entry))
    }

    async fn append(&self, entry: MovementEntry) -> AppResult<MovementEntry> {
        check_entry(&entry)?;
        Ok(self.inner.write().await.push(entry))
    }

    async fn entries(&self, filter: &MovementFilter) -> AppResult<Vec<MovementEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    async fn balances(&self, filter: &BalanceFilter) -> AppResult<Vec<StockBalance>> {
        let inner = self.inner.read().await;
        Ok(inner
            .balances
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect())
    }
}
