//! Stock-taking plans and stock-taking (count) documents

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::lifecycle::DocumentStatus;
use super::stock::StockKey;
use crate::types::PageParam;

coded_enum! {
    pub enum StockTakingStatus ("stock taking status") {
        Pending = 1 => "pending",
        Counted = 2 => "counted",
        Reviewed = 3 => "reviewed",
        Adjusted = 4 => "adjusted",
        Cancelled = 5 => "cancelled",
    }
}

impl DocumentStatus for StockTakingStatus {
    const DOCUMENT: &'static str = "stock taking";

    fn initial() -> Self {
        StockTakingStatus::Pending
    }

    fn is_terminal(self) -> bool {
        match self {
            StockTakingStatus::Adjusted | StockTakingStatus::Cancelled => true,
            StockTakingStatus::Pending | StockTakingStatus::Counted | StockTakingStatus::Reviewed => {
                false
            }
        }
    }

    fn can_cancel(self) -> bool {
        !self.is_terminal()
    }
}

coded_enum! {
    pub enum StockTakingPlanStatus ("stock taking plan status") {
        PendingAudit = 1 => "pending-audit",
        Pending = 2 => "pending",
        Processing = 3 => "processing",
        Completed = 4 => "completed",
        Cancelled = 5 => "cancelled",
    }
}

impl DocumentStatus for StockTakingPlanStatus {
    const DOCUMENT: &'static str = "stock taking plan";

    fn initial() -> Self {
        StockTakingPlanStatus::PendingAudit
    }

    fn is_terminal(self) -> bool {
        match self {
            StockTakingPlanStatus::Completed | StockTakingPlanStatus::Cancelled => true,
            StockTakingPlanStatus::PendingAudit
            | StockTakingPlanStatus::Pending
            | StockTakingPlanStatus::Processing => false,
        }
    }

    fn can_cancel(self) -> bool {
        !self.is_terminal()
    }
}

coded_enum! {
    pub enum StockTakingType ("stock taking type") {
        Full = 1 => "full",
        Cycle = 2 => "cycle",
        Spot = 3 => "spot",
        Dynamic = 4 => "dynamic",
    }
}

coded_enum! {
    pub enum StockTakingScopeType ("stock taking scope type") {
        Warehouse = 1 => "warehouse",
        Area = 2 => "area",
        Location = 3 => "location",
        Goods = 4 => "goods",
    }
}

/// A planned count over part of a warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTakingPlan {
    pub id: i64,
    pub plan_no: String,
    pub plan_name: String,
    pub warehouse_id: i64,
    pub taking_type: StockTakingType,
    pub scope_type: StockTakingScopeType,
    /// Area, location or goods ids the scope is restricted to; empty for the whole warehouse
    pub scope_ids: Vec<i64>,
    pub plan_start_time: Option<DateTime<Utc>>,
    pub plan_end_time: Option<DateTime<Utc>>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
    pub total_count: u32,
    pub completed_count: u32,
    pub diff_count: u32,
    pub status: StockTakingPlanStatus,
    pub audit_by: Option<i64>,
    pub audit_by_name: Option<String>,
    pub audit_time: Option<DateTime<Utc>>,
    pub remark: Option<String>,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A count of one ledger key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTaking {
    pub id: i64,
    pub taking_no: String,
    pub plan_id: Option<i64>,
    pub plan_no: Option<String>,
    #[serde(flatten)]
    pub key: StockKey,
    /// Ledger quantity when the count was opened
    pub book_quantity: Decimal,
    pub actual_quantity: Option<Decimal>,
    pub diff_reason: Option<String>,
    pub operator_id: Option<i64>,
    pub operator: Option<String>,
    pub operate_time: Option<DateTime<Utc>>,
    pub reviewer_id: Option<i64>,
    pub reviewer: Option<String>,
    pub review_time: Option<DateTime<Utc>>,
    pub status: StockTakingStatus,
    /// The adjustment movement has been applied
    pub posted: bool,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockTaking {
    /// actual - book, once counted
    pub fn difference(&self) -> Option<Decimal> {
        self.actual_quantity.map(|actual| actual - self.book_quantity)
    }

    pub fn has_difference(&self) -> bool {
        self.difference().map_or(false, |d| !d.is_zero())
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStockTakingPlanRequest {
    #[validate(length(min = 1, max = 100))]
    pub plan_name: String,
    pub warehouse_id: i64,
    pub taking_type: StockTakingType,
    pub scope_type: StockTakingScopeType,
    #[serde(default)]
    pub scope_ids: Vec<i64>,
    pub plan_start_time: Option<DateTime<Utc>>,
    pub plan_end_time: Option<DateTime<Utc>>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStockTakingRequest {
    #[serde(flatten)]
    pub key: StockKey,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCountRequest {
    pub actual_quantity: Decimal,
    #[validate(length(max = 255))]
    pub diff_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTakingPageQuery {
    pub page_no: Option<u32>,
    pub page_size: Option<u32>,
    pub taking_no: Option<String>,
    pub plan_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub goods_id: Option<i64>,
    pub status: Option<StockTakingStatus>,
}

impl StockTakingPageQuery {
    pub fn page(&self) -> PageParam {
        PageParam::from_query(self.page_no, self.page_size)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTakingPlanPageQuery {
    pub page_no: Option<u32>,
    pub page_size: Option<u32>,
    pub plan_no: Option<String>,
    pub plan_name: Option<String>,
    pub warehouse_id: Option<i64>,
    pub taking_type: Option<StockTakingType>,
    pub status: Option<StockTakingPlanStatus>,
}

impl StockTakingPlanPageQuery {
    pub fn page(&self) -> PageParam {
        PageParam::from_query(self.page_no, self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taking_difference() {
        let now = Utc::now();
        let mut taking = StockTaking {
            id: 1,
            taking_no: "TAKE202401010001".into(),
            plan_id: None,
            plan_no: None,
            key: StockKey::new(1, 1, 1),
            book_quantity: Decimal::from(10),
            actual_quantity: None,
            diff_reason: None,
            operator_id: None,
            operator: None,
            operate_time: None,
            reviewer_id: None,
            reviewer: None,
            review_time: None,
            status: StockTakingStatus::Pending,
            posted: false,
            remark: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(taking.difference(), None);
        assert!(!taking.has_difference());

        taking.actual_quantity = Some(Decimal::from(7));
        assert_eq!(taking.difference(), Some(Decimal::from(-3)));
        assert!(taking.has_difference());
    }

    #[test]
    fn test_plan_status_codes() {
        assert_eq!(
            StockTakingPlanStatus::initial(),
            StockTakingPlanStatus::PendingAudit
        );
        assert!(!StockTakingPlanStatus::Completed.can_cancel());
        assert!(StockTakingStatus::Reviewed.can_cancel());
        assert!(!StockTakingStatus::Adjusted.can_cancel());
    }
}
