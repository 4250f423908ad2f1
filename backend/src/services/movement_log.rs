//! Movement log access
//!
//! Entries are written by the ledger as part of each balance commit. This
//! service exposes the append contract for correcting entries and the read
//! side used by reports and the movement page.

use std::sync::Arc;

use shared::{
    replay, MovementEntry, MovementPageQuery, PageResult, ReplayedBalance, StockKey, TimeRange,
};

use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, MovementFilter};

#[derive(Clone)]
pub struct MovementLog {
    store: Arc<dyn LedgerStore>,
}

impl MovementLog {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Append an entry; fails if quantityAfter != quantityBefore + quantityChange
    pub async fn append(&self, entry: MovementEntry) -> AppResult<uuid::Uuid> {
        let entry = self.store.append(entry).await?;
        Ok(entry.id)
    }

    /// Entries for one key inside `range`, in log order
    pub async fn entries_for(
        &self,
        key: &StockKey,
        range: TimeRange,
    ) -> AppResult<Vec<MovementEntry>> {
        self.store
            .entries(&MovementFilter::for_key(key.clone(), range))
            .await
    }

    pub async fn entries(&self, filter: &MovementFilter) -> AppResult<Vec<MovementEntry>> {
        self.store.entries(filter).await
    }

    /// Fold the whole log for `key` back into a balance
    pub async fn replay(&self, key: &StockKey) -> AppResult<ReplayedBalance> {
        let entries = self.entries_for(key, TimeRange::all()).await?;
        replay(&entries).map_err(|e| AppError::Internal(format!("movement log for {}: {}", key, e)))
    }

    /// Newest-first page of entries
    pub async fn page(&self, query: &MovementPageQuery) -> AppResult<PageResult<MovementEntry>> {
        let filter = MovementFilter {
            key: None,
            warehouse_id: query.warehouse_id,
            location_id: query.location_id,
            goods_id: query.goods_id,
            batch_no: query.batch_no.clone(),
            operation_type: query.operation_type,
            business_type: query.business_type,
            business_no: query.business_no.clone(),
            range: TimeRange {
                from: query.from,
                to: query.to,
            },
        };
        let mut entries = self.store.entries(&filter).await?;
        entries.reverse();
        Ok(query.page().slice(entries))
    }
}
