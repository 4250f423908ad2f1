//! Read-only report and warning views

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::movement::{BusinessType, OperationType};
use super::stock::StockKey;
use crate::types::PageParam;

/// Stock level relative to the goods' safety stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockState {
    Normal,
    Low,
    OutOfStock,
}

impl StockState {
    /// Out of stock at or below zero; low at or below a positive safety stock
    pub fn classify(available: Decimal, safety_stock: Decimal) -> Self {
        if available <= Decimal::ZERO {
            StockState::OutOfStock
        } else if safety_stock > Decimal::ZERO && available <= safety_stock {
            StockState::Low
        } else {
            StockState::Normal
        }
    }
}

/// One balance in the inventory report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReportRow {
    #[serde(flatten)]
    pub key: StockKey,
    pub sku: Option<String>,
    pub goods_name: Option<String>,
    pub unit: Option<String>,
    pub quantity: Decimal,
    pub lock_quantity: Decimal,
    pub available_quantity: Decimal,
    pub safety_stock: Decimal,
    pub stock_state: StockState,
    pub expire_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReportQuery {
    pub page_no: Option<u32>,
    pub page_size: Option<u32>,
    pub warehouse_id: Option<i64>,
    pub location_id: Option<i64>,
    pub goods_id: Option<i64>,
    /// Goods category, including every sub-category
    pub category_id: Option<i64>,
    pub batch_no: Option<String>,
    pub stock_state: Option<StockState>,
}

impl InventoryReportQuery {
    pub fn page(&self) -> PageParam {
        PageParam::from_query(self.page_no, self.page_size)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub balance_count: u64,
    pub goods_count: u64,
    pub total_quantity: Decimal,
    pub available_quantity: Decimal,
    pub locked_quantity: Decimal,
    pub low_stock_count: u64,
    pub out_of_stock_count: u64,
}

/// Filters shared by date-ranged reports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InOutQuery {
    pub warehouse_id: Option<i64>,
    pub goods_id: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// In/out totals for one goods over a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InOutReportRow {
    pub goods_id: i64,
    pub sku: Option<String>,
    pub goods_name: Option<String>,
    pub in_quantity: Decimal,
    pub out_quantity: Decimal,
    pub net_quantity: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InOutSummary {
    pub in_quantity: Decimal,
    pub out_quantity: Decimal,
    pub in_count: u64,
    pub out_count: u64,
    /// out / in * 100, four decimal places
    pub turnover_rate: Decimal,
}

/// `out / in * 100` rounded half-up to 4 places; zero when nothing came in
pub fn turnover_rate(in_quantity: Decimal, out_quantity: Decimal) -> Decimal {
    if in_quantity.is_zero() {
        return Decimal::ZERO;
    }
    (out_quantity / in_quantity * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// One day of the in/out trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub in_quantity: Decimal,
    pub out_quantity: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningType {
    LowStock,
    Expiring,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockWarning {
    pub warning_type: WarningType,
    pub warehouse_id: i64,
    pub goods_id: i64,
    pub sku: Option<String>,
    pub goods_name: Option<String>,
    pub location_id: Option<i64>,
    pub batch_no: Option<String>,
    pub quantity: Decimal,
    pub available_quantity: Decimal,
    pub safety_stock: Option<Decimal>,
    pub expire_date: Option<NaiveDate>,
    pub days_to_expiry: Option<i64>,
}

/// Daily per (warehouse, goods) totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshot {
    pub id: i64,
    pub snapshot_date: NaiveDate,
    pub warehouse_id: i64,
    pub goods_id: i64,
    pub quantity: Decimal,
    pub lock_quantity: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotQuery {
    pub warehouse_id: Option<i64>,
    pub goods_id: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Movement log page query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementPageQuery {
    pub page_no: Option<u32>,
    pub page_size: Option<u32>,
    pub warehouse_id: Option<i64>,
    pub location_id: Option<i64>,
    pub goods_id: Option<i64>,
    pub batch_no: Option<String>,
    pub operation_type: Option<OperationType>,
    pub business_type: Option<BusinessType>,
    pub business_no: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl MovementPageQuery {
    pub fn page(&self) -> PageParam {
        PageParam::from_query(self.page_no, self.page_size)
    }
}
