//! Stock move documents (relocating stock between locations)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::lifecycle::DocumentStatus;
use super::stock::StockKey;
use crate::types::PageParam;

coded_enum! {
    pub enum StockMoveStatus ("stock move status") {
        Pending = 1 => "pending",
        Executing = 2 => "executing",
        Completed = 3 => "completed",
        Cancelled = 4 => "cancelled",
    }
}

impl DocumentStatus for StockMoveStatus {
    const DOCUMENT: &'static str = "stock move";

    fn initial() -> Self {
        StockMoveStatus::Pending
    }

    fn is_terminal(self) -> bool {
        match self {
            StockMoveStatus::Completed | StockMoveStatus::Cancelled => true,
            StockMoveStatus::Pending | StockMoveStatus::Executing => false,
        }
    }

    fn can_cancel(self) -> bool {
        !self.is_terminal()
    }
}

coded_enum! {
    pub enum StockMoveType ("stock move type") {
        Location = 1 => "location",
        Area = 2 => "area",
        Warehouse = 3 => "warehouse",
    }
}

/// Stock move header
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMove {
    pub id: i64,
    pub move_no: String,
    pub move_type: StockMoveType,
    pub warehouse_id: i64,
    pub status: StockMoveStatus,
    pub total_quantity: Decimal,
    pub move_reason: Option<String>,
    pub execute_by: Option<i64>,
    pub execute_by_name: Option<String>,
    pub execute_time: Option<DateTime<Utc>>,
    pub complete_by: Option<i64>,
    pub complete_by_name: Option<String>,
    pub complete_time: Option<DateTime<Utc>>,
    pub remark: Option<String>,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<StockMoveItem>,
}

/// Which ledger legs of a move line have been applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveLegs {
    /// Source quantity locked by `execute`
    pub source_locked: bool,
    /// Source quantity deducted by `complete`
    pub source_posted: bool,
    /// Target quantity added by `complete`
    pub target_posted: bool,
}

/// Stock move line item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMoveItem {
    pub id: i64,
    pub goods_id: i64,
    pub batch_no: Option<String>,
    pub serial_no: Option<String>,
    pub from_location_id: i64,
    pub to_location_id: i64,
    pub quantity: Decimal,
    pub legs: MoveLegs,
    pub remark: Option<String>,
}

impl StockMoveItem {
    pub fn source_key(&self, warehouse_id: i64) -> StockKey {
        StockKey::from_parts(
            warehouse_id,
            self.from_location_id,
            self.goods_id,
            self.batch_no.as_deref(),
            self.serial_no.as_deref(),
        )
    }

    pub fn target_key(&self, warehouse_id: i64) -> StockKey {
        StockKey::from_parts(
            warehouse_id,
            self.to_location_id,
            self.goods_id,
            self.batch_no.as_deref(),
            self.serial_no.as_deref(),
        )
    }

    pub fn is_posted(&self) -> bool {
        self.legs.source_posted && self.legs.target_posted
    }
}

impl StockMove {
    pub fn recompute_totals(&mut self) {
        self.total_quantity = self.items.iter().map(|i| i.quantity).sum();
    }

    /// Some line has deducted the source but not yet credited the target
    pub fn has_stock_in_transit(&self) -> bool {
        self.items
            .iter()
            .any(|i| i.legs.source_posted && !i.legs.target_posted)
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStockMoveRequest {
    pub move_type: StockMoveType,
    pub warehouse_id: i64,
    #[validate(length(max = 255))]
    pub move_reason: Option<String>,
    pub remark: Option<String>,
    #[validate(length(min = 1, message = "at least one line item is required"))]
    pub items: Vec<StockMoveItemRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMoveItemRequest {
    pub goods_id: i64,
    pub batch_no: Option<String>,
    pub serial_no: Option<String>,
    pub from_location_id: i64,
    pub to_location_id: i64,
    pub quantity: Decimal,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovePageQuery {
    pub page_no: Option<u32>,
    pub page_size: Option<u32>,
    pub move_no: Option<String>,
    pub move_type: Option<StockMoveType>,
    pub status: Option<StockMoveStatus>,
    pub warehouse_id: Option<i64>,
}

impl StockMovePageQuery {
    pub fn page(&self) -> PageParam {
        PageParam::from_query(self.page_no, self.page_size)
    }
}
