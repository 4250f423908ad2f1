//! Read-only projections over the ledger and the movement log
//!
//! Everything here reads a snapshot of balances and entries and never writes
//! to either, so results may trail concurrent mutations slightly.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;

use shared::{
    turnover_rate, DateRange, GoodsInfo, Hierarchy, InOutQuery, InOutReportRow, InOutSummary,
    InventoryReportQuery, InventoryReportRow, InventorySnapshot, InventorySummary, MovementEntry,
    OperationType, PageResult, SnapshotQuery, StockBalance, StockState, StockWarning, TimeRange,
    TrendPoint, WarningType,
};

use super::movement_log::MovementLog;
use super::repository::Repository;
use crate::error::{AppResult, ValidateField};
use crate::external::MasterData;
use crate::services::ledger::Ledger;
use crate::store::{BalanceFilter, MovementFilter};

pub struct ReportingService {
    ledger: Ledger,
    log: MovementLog,
    master: Arc<dyn MasterData>,
    snapshots: Repository<InventorySnapshot>,
    expiring_within_days: i64,
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Half-open timestamp range covering every day of `range`
fn time_range(range: &DateRange) -> TimeRange {
    TimeRange {
        from: Some(start_of(range.start)),
        to: range.end.succ_opt().map(start_of),
    }
}

impl ReportingService {
    pub fn new(
        ledger: Ledger,
        log: MovementLog,
        master: Arc<dyn MasterData>,
        expiring_within_days: i64,
    ) -> Self {
        Self {
            ledger,
            log,
            master,
            snapshots: Repository::new("Inventory snapshot"),
            expiring_within_days,
        }
    }

    async fn goods_map(&self) -> AppResult<HashMap<i64, GoodsInfo>> {
        Ok(self
            .master
            .all_goods()
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect())
    }

    /// Goods ids under `category_id`, sub-categories included
    async fn goods_in_category(
        &self,
        category_id: i64,
        goods: &HashMap<i64, GoodsInfo>,
    ) -> AppResult<Vec<i64>> {
        let categories = Hierarchy::build(self.master.goods_categories().await?);
        let wanted = categories.descendants(category_id);
        Ok(goods
            .values()
            .filter(|g| g.category_id.map_or(false, |c| wanted.contains(&c)))
            .map(|g| g.id)
            .collect())
    }

    fn report_row(balance: StockBalance, goods: Option<&GoodsInfo>) -> InventoryReportRow {
        let safety_stock = goods.map_or(Decimal::ZERO, |g| g.safety_stock);
        let available = balance.available();
        InventoryReportRow {
            sku: goods.map(|g| g.sku.clone()),
            goods_name: goods.map(|g| g.name.clone()),
            unit: goods.map(|g| g.unit.clone()),
            quantity: balance.quantity,
            lock_quantity: balance.lock_quantity,
            available_quantity: available,
            safety_stock,
            stock_state: StockState::classify(available, safety_stock),
            expire_date: balance.expire_date,
            key: balance.key,
        }
    }

    async fn report_rows(&self, query: &InventoryReportQuery) -> AppResult<Vec<InventoryReportRow>> {
        let goods = self.goods_map().await?;
        let mut filter = BalanceFilter {
            warehouse_id: query.warehouse_id,
            goods_id: query.goods_id,
            location_id: query.location_id,
            batch_no: query.batch_no.clone(),
            ..Default::default()
        };
        if let Some(category_id) = query.category_id {
            filter.goods_ids = Some(self.goods_in_category(category_id, &goods).await?);
        }

        Ok(self
            .ledger
            .balances(&filter)
            .await?
            .into_iter()
            .map(|b| {
                let info = goods.get(&b.key.goods_id);
                Self::report_row(b, info)
            })
            .filter(|row| query.stock_state.map_or(true, |s| s == row.stock_state))
            .collect())
    }

    pub async fn inventory_report(
        &self,
        query: &InventoryReportQuery,
    ) -> AppResult<PageResult<InventoryReportRow>> {
        let rows = self.report_rows(query).await?;
        Ok(query.page().slice(rows))
    }

    pub async fn inventory_summary(
        &self,
        query: &InventoryReportQuery,
    ) -> AppResult<InventorySummary> {
        let rows = self.report_rows(query).await?;
        let mut summary = InventorySummary::default();
        let mut goods = std::collections::BTreeSet::new();
        for row in &rows {
            summary.balance_count += 1;
            goods.insert(row.key.goods_id);
            summary.total_quantity += row.quantity;
            summary.available_quantity += row.available_quantity;
            summary.locked_quantity += row.lock_quantity;
            match row.stock_state {
                StockState::Low => summary.low_stock_count += 1,
                StockState::OutOfStock => summary.out_of_stock_count += 1,
                StockState::Normal => {}
            }
        }
        summary.goods_count = goods.len() as u64;
        Ok(summary)
    }

    // ========================================================================
    // Warnings
    // ========================================================================

    fn warning(
        warning_type: WarningType,
        balance: &StockBalance,
        goods: Option<&GoodsInfo>,
        today: NaiveDate,
    ) -> StockWarning {
        StockWarning {
            warning_type,
            warehouse_id: balance.key.warehouse_id,
            goods_id: balance.key.goods_id,
            sku: goods.map(|g| g.sku.clone()),
            goods_name: goods.map(|g| g.name.clone()),
            location_id: Some(balance.key.location_id),
            batch_no: balance.key.batch_no.clone(),
            quantity: balance.quantity,
            available_quantity: balance.available(),
            safety_stock: goods.map(|g| g.safety_stock),
            expire_date: balance.expire_date,
            days_to_expiry: balance.days_to_expiry(today),
        }
    }

    /// Balances whose available quantity is at or below the goods' safety stock
    pub async fn low_stock(&self, warehouse_id: Option<i64>) -> AppResult<Vec<StockWarning>> {
        let goods = self.goods_map().await?;
        let filter = BalanceFilter {
            warehouse_id,
            ..Default::default()
        };
        let today = Utc::now().date_naive();
        Ok(self
            .ledger
            .balances(&filter)
            .await?
            .iter()
            .filter_map(|b| {
                let info = goods.get(&b.key.goods_id)?;
                (info.safety_stock > Decimal::ZERO && b.available() <= info.safety_stock)
                    .then(|| Self::warning(WarningType::LowStock, b, Some(info), today))
            })
            .collect())
    }

    /// Batches expiring within `within_days` days; already expired batches are flagged as such
    pub async fn expiring(
        &self,
        warehouse_id: Option<i64>,
        within_days: i64,
        today: NaiveDate,
    ) -> AppResult<Vec<StockWarning>> {
        let goods = self.goods_map().await?;
        let filter = BalanceFilter {
            warehouse_id,
            ..Default::default()
        };
        let mut warnings: Vec<StockWarning> = self
            .ledger
            .balances(&filter)
            .await?
            .iter()
            .filter_map(|b| {
                let days = b.days_to_expiry(today)?;
                let warning_type = match days {
                    d if d < 0 => WarningType::Expired,
                    d if d <= within_days => WarningType::Expiring,
                    _ => return None,
                };
                Some(Self::warning(warning_type, b, goods.get(&b.key.goods_id), today))
            })
            .collect();
        warnings.sort_by_key(|w| w.days_to_expiry);
        Ok(warnings)
    }

    /// Low-stock and expiry warnings together
    pub async fn warnings(&self, warehouse_id: Option<i64>) -> AppResult<Vec<StockWarning>> {
        let mut warnings = self.low_stock(warehouse_id).await?;
        warnings.extend(
            self.expiring(warehouse_id, self.expiring_within_days, Utc::now().date_naive())
                .await?,
        );
        Ok(warnings)
    }

    // ========================================================================
    // In/out
    // ========================================================================

    /// Inbound and outbound entries in the query's date range
    async fn in_out_entries(&self, query: &InOutQuery) -> AppResult<(DateRange, Vec<MovementEntry>)> {
        let range = DateRange::new(query.start_date, query.end_date).on_field("startDate")?;
        let filter = MovementFilter {
            warehouse_id: query.warehouse_id,
            goods_id: query.goods_id,
            range: time_range(&range),
            ..Default::default()
        };
        let entries = self
            .log
            .entries(&filter)
            .await?
            .into_iter()
            .filter(|e| {
                matches!(
                    e.operation_type,
                    OperationType::Inbound | OperationType::Outbound
                )
            })
            .collect();
        Ok((range, entries))
    }

    /// Inbound quantity and outbound quantity (as a positive number) of one entry
    fn in_out_of(entry: &MovementEntry) -> (Decimal, Decimal) {
        match entry.operation_type {
            OperationType::Inbound => (entry.quantity_change, Decimal::ZERO),
            OperationType::Outbound => (Decimal::ZERO, -entry.quantity_change),
            _ => (Decimal::ZERO, Decimal::ZERO),
        }
    }

    pub async fn in_out_report(&self, query: &InOutQuery) -> AppResult<Vec<InOutReportRow>> {
        let (_, entries) = self.in_out_entries(query).await?;
        let goods = self.goods_map().await?;

        let mut totals: BTreeMap<i64, (Decimal, Decimal)> = BTreeMap::new();
        for entry in &entries {
            let (inbound, outbound) = Self::in_out_of(entry);
            let slot = totals.entry(entry.key.goods_id).or_default();
            slot.0 += inbound;
            slot.1 += outbound;
        }

        Ok(totals
            .into_iter()
            .map(|(goods_id, (in_quantity, out_quantity))| {
                let info = goods.get(&goods_id);
                InOutReportRow {
                    goods_id,
                    sku: info.map(|g| g.sku.clone()),
                    goods_name: info.map(|g| g.name.clone()),
                    in_quantity,
                    out_quantity,
                    net_quantity: in_quantity - out_quantity,
                }
            })
            .collect())
    }

    pub async fn in_out_summary(&self, query: &InOutQuery) -> AppResult<InOutSummary> {
        let (_, entries) = self.in_out_entries(query).await?;
        let mut summary = InOutSummary::default();
        for entry in &entries {
            let (inbound, outbound) = Self::in_out_of(entry);
            if entry.operation_type == OperationType::Inbound {
                summary.in_count += 1;
                summary.in_quantity += inbound;
            } else {
                summary.out_count += 1;
                summary.out_quantity += outbound;
            }
        }
        summary.turnover_rate = turnover_rate(summary.in_quantity, summary.out_quantity);
        Ok(summary)
    }

    /// Daily inbound/outbound totals, one point per day including empty days
    pub async fn trend(&self, query: &InOutQuery) -> AppResult<Vec<TrendPoint>> {
        let (range, entries) = self.in_out_entries(query).await?;
        let mut days: BTreeMap<NaiveDate, TrendPoint> = range
            .days()
            .map(|date| {
                (
                    date,
                    TrendPoint {
                        date,
                        in_quantity: Decimal::ZERO,
                        out_quantity: Decimal::ZERO,
                    },
                )
            })
            .collect();
        for entry in &entries {
            if let Some(point) = days.get_mut(&entry.timestamp.date_naive()) {
                let (inbound, outbound) = Self::in_out_of(entry);
                point.in_quantity += inbound;
                point.out_quantity += outbound;
            }
        }
        Ok(days.into_values().collect())
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Record per (warehouse, goods) totals for `date`, replacing any earlier snapshot of that day
    pub async fn take_snapshot(&self, date: NaiveDate) -> AppResult<usize> {
        let balances = self.ledger.balances(&BalanceFilter::default()).await?;
        let mut totals: BTreeMap<(i64, i64), (Decimal, Decimal)> = BTreeMap::new();
        for balance in &balances {
            let slot = totals
                .entry((balance.key.warehouse_id, balance.key.goods_id))
                .or_default();
            slot.0 += balance.quantity;
            slot.1 += balance.lock_quantity;
        }

        for old in self.snapshots.list(|s| s.snapshot_date == date).await {
            self.snapshots.remove(old.id).await?;
        }
        let now = Utc::now();
        for ((warehouse_id, goods_id), (quantity, lock_quantity)) in &totals {
            let id = self.snapshots.next_id();
            self.snapshots
                .insert(
                    id,
                    InventorySnapshot {
                        id,
                        snapshot_date: date,
                        warehouse_id: *warehouse_id,
                        goods_id: *goods_id,
                        quantity: *quantity,
                        lock_quantity: *lock_quantity,
                        created_at: now,
                    },
                )
                .await;
        }

        tracing::info!(%date, rows = totals.len(), "inventory snapshot taken");
        Ok(totals.len())
    }

    pub async fn snapshots(&self, query: &SnapshotQuery) -> AppResult<Vec<InventorySnapshot>> {
        let range = DateRange::new(query.start_date, query.end_date).on_field("startDate")?;
        let mut rows = self
            .snapshots
            .list(|s| {
                range.contains(s.snapshot_date)
                    && query.warehouse_id.map_or(true, |w| w == s.warehouse_id)
                    && query.goods_id.map_or(true, |g| g == s.goods_id)
            })
            .await;
        rows.sort_by_key(|s| (s.snapshot_date, s.warehouse_id, s.goods_id));
        Ok(rows)
    }

    /// Take a snapshot every `interval` until the runtime shuts down
    pub fn spawn_snapshot_task(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = self.take_snapshot(Utc::now().date_naive()).await {
                    tracing::error!("inventory snapshot failed: {}", err);
                }
            }
        })
    }
}
