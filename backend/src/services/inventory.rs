//! Inventory queries and manual status changes

use serde::Serialize;

use shared::{
    BusinessType, ChangeStatusRequest, MovementEntry, MovementPageQuery, OperatorContext,
    PageResult, ReplayedBalance, StockBalance, StockKey, StockPageQuery,
};

use super::ledger::MovementMeta;
use super::movement_log::MovementLog;
use super::retry::RetryingLedger;
use crate::error::AppResult;
use crate::store::BalanceFilter;

/// Stored balance next to the balance rebuilt from the movement log
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerCheck {
    pub balance: StockBalance,
    pub replayed: ReplayedBalance,
    pub consistent: bool,
}

#[derive(Clone)]
pub struct InventoryService {
    ledger: RetryingLedger,
    log: MovementLog,
}

impl InventoryService {
    pub fn new(ledger: RetryingLedger, log: MovementLog) -> Self {
        Self { ledger, log }
    }

    pub async fn page(&self, query: &StockPageQuery) -> AppResult<PageResult<StockBalance>> {
        let filter = BalanceFilter {
            warehouse_id: query.warehouse_id,
            goods_id: query.goods_id,
            location_id: query.location_id,
            batch_no: query.batch_no.clone(),
            ..Default::default()
        };
        let balances = self
            .ledger
            .ledger()
            .balances(&filter)
            .await?
            .into_iter()
            .filter(|b| query.status.map_or(true, |s| s == b.status))
            .collect();
        Ok(query.page().slice(balances))
    }

    pub async fn get(&self, key: &StockKey) -> AppResult<StockBalance> {
        self.ledger.ledger().get_balance(key).await
    }

    /// Freeze, release or quarantine one balance
    pub async fn change_status(
        &self,
        request: ChangeStatusRequest,
        operator: &OperatorContext,
    ) -> AppResult<StockBalance> {
        let mut meta = MovementMeta::new(BusinessType::Manual, "STATUS", operator);
        if let Some(remark) = request.remark {
            meta = meta.with_remark(remark);
        }
        let balance = self
            .ledger
            .set_status(&request.key, request.status, &meta)
            .await?;

        tracing::info!(key = %balance.key, status = %balance.status, operator = %operator.operator_name, "inventory status changed");
        Ok(balance)
    }

    pub async fn movements(&self, query: &MovementPageQuery) -> AppResult<PageResult<MovementEntry>> {
        self.log.page(query).await
    }

    /// Rebuild `key` from its movement log and compare with the stored balance
    pub async fn verify(&self, key: &StockKey) -> AppResult<LedgerCheck> {
        let balance = self.get(key).await?;
        let replayed = self.log.replay(key).await?;
        // An emptied balance is deleted, so only its quantities can be compared
        let consistent = replayed.quantity == balance.quantity
            && replayed.lock_quantity == balance.lock_quantity
            && (balance.version == 0 || replayed.version == balance.version);
        if !consistent {
            tracing::error!(key = %key, "stored balance differs from its movement log");
        }
        Ok(LedgerCheck {
            balance,
            replayed,
            consistent,
        })
    }
}
