//! Inbound (receiving) documents

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::lifecycle::DocumentStatus;
use super::stock::StockKey;
use crate::types::PageParam;

coded_enum! {
    pub enum InboundStatus ("inbound status") {
        PendingAudit = 1 => "pending-audit",
        Audited = 2 => "audited",
        Receiving = 3 => "receiving",
        Completed = 4 => "completed",
        Cancelled = 5 => "cancelled",
    }
}

impl DocumentStatus for InboundStatus {
    const DOCUMENT: &'static str = "inbound";

    fn initial() -> Self {
        InboundStatus::PendingAudit
    }

    fn is_terminal(self) -> bool {
        match self {
            InboundStatus::Completed | InboundStatus::Cancelled => true,
            InboundStatus::PendingAudit | InboundStatus::Audited | InboundStatus::Receiving => {
                false
            }
        }
    }

    fn can_cancel(self) -> bool {
        !self.is_terminal()
    }
}

coded_enum! {
    pub enum InboundType ("inbound type") {
        Purchase = 1 => "purchase",
        Return = 2 => "return",
        Transfer = 3 => "transfer",
        Other = 4 => "other",
    }
}

/// Inbound header
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundOrder {
    pub id: i64,
    pub inbound_no: String,
    pub inbound_type: InboundType,
    pub warehouse_id: i64,
    pub supplier_id: Option<i64>,
    pub status: InboundStatus,
    pub expected_arrival_time: Option<DateTime<Utc>>,
    pub actual_arrival_time: Option<DateTime<Utc>>,
    pub total_quantity: Decimal,
    pub received_quantity: Decimal,
    pub total_amount: Decimal,
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
    pub items: Vec<InboundItem>,
}

/// Inbound line item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundItem {
    pub id: i64,
    pub goods_id: i64,
    pub location_id: i64,
    pub batch_no: Option<String>,
    pub serial_no: Option<String>,
    pub production_date: Option<NaiveDate>,
    pub expire_date: Option<NaiveDate>,
    pub plan_quantity: Decimal,
    pub received_quantity: Decimal,
    pub qualified_quantity: Decimal,
    pub unqualified_quantity: Decimal,
    pub price: Decimal,
    pub amount: Decimal,
    /// The ledger movement for this line has been applied
    pub posted: bool,
    pub remark: Option<String>,
}

impl InboundItem {
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

impl InboundOrder {
    /// Recompute header totals from the line items
    pub fn recompute_totals(&mut self) {
        self.total_quantity = self.items.iter().map(|i| i.plan_quantity).sum();
        self.received_quantity = self.items.iter().map(|i| i.received_quantity).sum();
        self.total_amount = self.items.iter().map(|i| i.amount).sum();
    }

    pub fn item_mut(&mut self, item_id: i64) -> Option<&mut InboundItem> {
        self.items.iter_mut().find(|i| i.id == item_id)
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
pub struct CreateInboundRequest {
    pub inbound_type: InboundType,
    pub warehouse_id: i64,
    pub supplier_id: Option<i64>,
    pub expected_arrival_time: Option<DateTime<Utc>>,
    #[validate(length(max = 500))]
    pub remark: Option<String>,
    #[validate(length(min = 1, message = "at least one line item is required"))]
    pub items: Vec<InboundItemRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundItemRequest {
    pub goods_id: i64,
    pub location_id: i64,
    pub batch_no: Option<String>,
    pub serial_no: Option<String>,
    pub production_date: Option<NaiveDate>,
    pub expire_date: Option<NaiveDate>,
    pub plan_quantity: Decimal,
    #[serde(default)]
    pub price: Decimal,
    pub remark: Option<String>,
}

/// Receipt figures for one line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveItemRequest {
    pub item_id: i64,
    pub received_quantity: Decimal,
    pub qualified_quantity: Decimal,
    pub unqualified_quantity: Decimal,
}

/// Optional final receipts applied before posting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteInboundRequest {
    #[serde(default)]
    pub items: Vec<ReceiveItemRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundPageQuery {
    #[serde(default)]
    pub page_no: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
    pub inbound_no: Option<String>,
    pub inbound_type: Option<InboundType>,
    pub status: Option<InboundStatus>,
    pub warehouse_id: Option<i64>,
    pub supplier_id: Option<i64>,
}

impl InboundPageQuery {
    pub fn page(&self) -> PageParam {
        PageParam::from_query(self.page_no, self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_status_chain() {
        assert_eq!(InboundStatus::initial(), InboundStatus::PendingAudit);
        assert!(InboundStatus::Receiving.can_cancel());
        assert!(!InboundStatus::Completed.can_cancel());
        assert!(!InboundStatus::Cancelled.can_cancel());
        assert_eq!(InboundStatus::try_from(3), Ok(InboundStatus::Receiving));
        assert!(InboundStatus::try_from(0).is_err());
    }

    #[test]
    fn test_create_request_requires_items() {
        let request: CreateInboundRequest = serde_json::from_value(serde_json::json!({
            "inboundType": 1,
            "warehouseId": 1,
            "items": []
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_unknown_type_code_is_rejected() {
        let result = serde_json::from_value::<CreateInboundRequest>(serde_json::json!({
            "inboundType": 9,
            "warehouseId": 1,
            "items": []
        }));
        assert!(result.is_err());
    }
}
