//! Outbound (shipping) documents

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::lifecycle::DocumentStatus;
use super::picking::PickingExceptionType;
use super::stock::StockKey;
use crate::types::PageParam;

coded_enum! {
    pub enum OutboundStatus ("outbound status") {
        PendingAudit = 1 => "pending-audit",
        Audited = 2 => "audited",
        Picking = 3 => "picking",
        ReadyToShip = 4 => "ready-to-ship",
        Shipped = 5 => "shipped",
        Cancelled = 6 => "cancelled",
    }
}

impl DocumentStatus for OutboundStatus {
    const DOCUMENT: &'static str = "outbound";

    fn initial() -> Self {
        OutboundStatus::PendingAudit
    }

    fn is_terminal(self) -> bool {
        match self {
            OutboundStatus::Shipped | OutboundStatus::Cancelled => true,
            OutboundStatus::PendingAudit
            | OutboundStatus::Audited
            | OutboundStatus::Picking
            | OutboundStatus::ReadyToShip => false,
        }
    }

    fn can_cancel(self) -> bool {
        !self.is_terminal()
    }
}

coded_enum! {
    pub enum OutboundType ("outbound type") {
        Sale = 1 => "sale",
        Transfer = 2 => "transfer",
        Return = 3 => "return",
        Other = 4 => "other",
    }
}

/// Outbound header
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundOrder {
    pub id: i64,
    pub outbound_no: String,
    pub outbound_type: OutboundType,
    pub warehouse_id: i64,
    pub customer_id: Option<i64>,
    pub status: OutboundStatus,
    pub expected_shipment_time: Option<DateTime<Utc>>,
    pub actual_shipment_time: Option<DateTime<Utc>>,
    pub total_quantity: Decimal,
    pub picked_quantity: Decimal,
    pub total_amount: Decimal,
    /// Wave this outbound is grouped into, if any
    pub wave_id: Option<i64>,
    pub audit_by: Option<i64>,
    pub audit_by_name: Option<String>,
    pub audit_time: Option<DateTime<Utc>>,
    pub complete_by: Option<i64>,
    pub complete_by_name: Option<String>,
    pub complete_time: Option<DateTime<Utc>>,
    pub remark: Option<String>,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OutboundItem>,
}

/// Outbound line item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundItem {
    pub id: i64,
    pub goods_id: i64,
    pub location_id: i64,
    pub batch_no: Option<String>,
    pub serial_no: Option<String>,
    pub plan_quantity: Decimal,
    /// `None` until a pick has been recorded for this line
    pub picked_quantity: Option<Decimal>,
    pub shipped_quantity: Decimal,
    pub price: Decimal,
    pub amount: Decimal,
    /// Unresolved picking exception on this line; blocks shipping
    pub exception: Option<PickingExceptionType>,
    /// The ship movement for this line has been applied
    pub posted: bool,
    pub remark: Option<String>,
}

impl OutboundItem {
    pub fn stock_key(&self, warehouse_id: i64) -> StockKey {
        StockKey::from_parts(
            warehouse_id,
            self.location_id,
            self.goods_id,
            self.batch_no.as_deref(),
            self.serial_no.as_deref(),
        )
    }
}

impl OutboundOrder {
    pub fn recompute_totals(&mut self) {
        self.total_quantity = self.items.iter().map(|i| i.plan_quantity).sum();
        self.picked_quantity = self
            .items
            .iter()
            .filter_map(|i| i.picked_quantity)
            .sum();
        self.total_amount = self.items.iter().map(|i| i.amount).sum();
    }

    pub fn item(&self, item_id: i64) -> Option<&OutboundItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: i64) -> Option<&mut OutboundItem> {
        self.items.iter_mut().find(|i| i.id == item_id)
    }

    /// Every line has a recorded pick and none carries an open exception
    pub fn is_fully_picked(&self) -> bool {
        self.items
            .iter()
            .all(|i| i.picked_quantity.is_some() && i.exception.is_none())
    }

    pub fn any_posted(&self) -> bool {
        self.items.iter().any(|i| i.posted)
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutboundRequest {
    pub outbound_type: OutboundType,
    pub warehouse_id: i64,
    pub customer_id: Option<i64>,
    pub expected_shipment_time: Option<DateTime<Utc>>,
    #[validate(length(max = 500))]
    pub remark: Option<String>,
    #[validate(length(min = 1, message = "at least one line item is required"))]
    pub items: Vec<OutboundItemRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundItemRequest {
    pub goods_id: i64,
    pub location_id: i64,
    pub batch_no: Option<String>,
    pub serial_no: Option<String>,
    pub plan_quantity: Decimal,
    #[serde(default)]
    pub price: Decimal,
    pub remark: Option<String>,
}

/// Picked quantity for one outbound line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteOutboundItemRequest {
    pub item_id: i64,
    pub picked_quantity: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundPageQuery {
    pub page_no: Option<u32>,
    pub page_size: Option<u32>,
    pub outbound_no: Option<String>,
    pub outbound_type: Option<OutboundType>,
    pub status: Option<OutboundStatus>,
    pub warehouse_id: Option<i64>,
    pub customer_id: Option<i64>,
}

impl OutboundPageQuery {
    pub fn page(&self) -> PageParam {
        PageParam::from_query(self.page_no, self.page_size)
    }
}
