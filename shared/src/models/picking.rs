//! Picking waves and picking tasks

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::lifecycle::DocumentStatus;
use crate::types::PageParam;

coded_enum! {
    pub enum PickingTaskStatus ("picking task status") {
        Pending = 1 => "pending",
        Picking = 2 => "picking",
        Completed = 3 => "completed",
        Exception = 4 => "exception",
        Cancelled = 5 => "cancelled",
    }
}

impl DocumentStatus for PickingTaskStatus {
    const DOCUMENT: &'static str = "picking task";

    fn initial() -> Self {
        PickingTaskStatus::Pending
    }

    fn is_terminal(self) -> bool {
        match self {
            PickingTaskStatus::Completed | PickingTaskStatus::Cancelled => true,
            PickingTaskStatus::Pending
            | PickingTaskStatus::Picking
            | PickingTaskStatus::Exception => false,
        }
    }

    fn can_cancel(self) -> bool {
        !self.is_terminal()
    }
}

impl PickingTaskStatus {
    /// A wave counts this task as done
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            PickingTaskStatus::Completed
                | PickingTaskStatus::Exception
                | PickingTaskStatus::Cancelled
        )
    }
}

coded_enum! {
    pub enum PickingExceptionType ("picking exception type") {
        /// Location was empty
        Empty = 1 => "empty",
        /// Less stock than planned
        Short = 2 => "short",
        Damaged = 3 => "damaged",
        Expired = 4 => "expired",
        /// Wrong goods picked
        Wrong = 5 => "wrong",
    }
}

coded_enum! {
    pub enum WaveStatus ("picking wave status") {
        PendingAssign = 1 => "pending-assign",
        Assigned = 2 => "assigned",
        Picking = 3 => "picking",
        Completed = 4 => "completed",
        Cancelled = 5 => "cancelled",
    }
}

impl DocumentStatus for WaveStatus {
    const DOCUMENT: &'static str = "picking wave";

    fn initial() -> Self {
        WaveStatus::PendingAssign
    }

    fn is_terminal(self) -> bool {
        match self {
            WaveStatus::Completed | WaveStatus::Cancelled => true,
            WaveStatus::PendingAssign | WaveStatus::Assigned | WaveStatus::Picking => false,
        }
    }

    fn can_cancel(self) -> bool {
        !self.is_terminal()
    }
}

coded_enum! {
    pub enum WaveType ("picking wave type") {
        Batch = 1 => "batch",
        Zone = 2 => "zone",
        Single = 3 => "single",
    }
}

/// A group of outbound orders picked together
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickingWave {
    pub id: i64,
    pub wave_no: String,
    pub warehouse_id: i64,
    pub wave_type: WaveType,
    pub status: WaveStatus,
    pub outbound_ids: Vec<i64>,
    pub order_count: u32,
    pub item_count: u32,
    pub total_quantity: Decimal,
    pub priority: i32,
    pub picker_id: Option<i64>,
    pub picker_name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub remark: Option<String>,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One unit of picking work: one outbound line at one location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickingTask {
    pub id: i64,
    pub task_no: String,
    pub wave_id: Option<i64>,
    pub wave_no: Option<String>,
    pub outbound_id: i64,
    pub outbound_no: String,
    pub outbound_item_id: i64,
    pub warehouse_id: i64,
    pub goods_id: i64,
    pub batch_no: Option<String>,
    pub location_id: i64,
    pub plan_quantity: Decimal,
    pub actual_quantity: Option<Decimal>,
    pub sort_order: u32,
    pub picker_id: Option<i64>,
    pub picker_name: Option<String>,
    pub picking_time: Option<DateTime<Utc>>,
    pub status: PickingTaskStatus,
    pub exception_type: Option<PickingExceptionType>,
    pub exception_remark: Option<String>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateWaveRequest {
    pub warehouse_id: i64,
    pub wave_type: WaveType,
    #[serde(default)]
    pub priority: i32,
    #[validate(length(min = 1, message = "at least one outbound is required"))]
    pub outbound_ids: Vec<i64>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateWavesRequest {
    pub warehouse_id: i64,
    pub wave_type: WaveType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignPickerRequest {
    pub picker_id: i64,
    pub picker_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickRequest {
    pub actual_quantity: Decimal,
    pub exception_type: Option<PickingExceptionType>,
    pub exception_remark: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkExceptionRequest {
    pub exception_type: PickingExceptionType,
    pub exception_remark: Option<String>,
}

/// Manual resolution of an exception task with the quantity actually taken
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveExceptionRequest {
    pub actual_quantity: Decimal,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickingTaskPageQuery {
    pub page_no: Option<u32>,
    pub page_size: Option<u32>,
    pub task_no: Option<String>,
    pub wave_id: Option<i64>,
    pub outbound_id: Option<i64>,
    pub picker_id: Option<i64>,
    pub status: Option<PickingTaskStatus>,
    pub warehouse_id: Option<i64>,
}

impl PickingTaskPageQuery {
    pub fn page(&self) -> PageParam {
        PageParam::from_query(self.page_no, self.page_size)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickingWavePageQuery {
    pub page_no: Option<u32>,
    pub page_size: Option<u32>,
    pub wave_no: Option<String>,
    pub wave_type: Option<WaveType>,
    pub status: Option<WaveStatus>,
    pub warehouse_id: Option<i64>,
    pub picker_id: Option<i64>,
}

impl PickingWavePageQuery {
    pub fn page(&self) -> PageParam {
        PageParam::from_query(self.page_no, self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_settlement() {
        assert!(PickingTaskStatus::Exception.is_settled());
        assert!(PickingTaskStatus::Completed.is_settled());
        assert!(!PickingTaskStatus::Picking.is_settled());
        assert!(PickingTaskStatus::Exception.can_cancel());
        assert!(!PickingTaskStatus::Completed.can_cancel());
    }

    #[test]
    fn test_exception_codes_round_trip_wire() {
        let request: PickRequest = serde_json::from_value(serde_json::json!({
            "actualQuantity": "3",
            "exceptionType": 2
        }))
        .unwrap();
        assert_eq!(request.exception_type, Some(PickingExceptionType::Short));
        assert_eq!(PickingExceptionType::ALL.len(), 5);
    }
}
