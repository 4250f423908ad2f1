//! Movement log entries and replay

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::stock::{InventoryStatus, StockKey};

/// What a movement did to a balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Inbound,
    Outbound,
    MoveOut,
    MoveIn,
    TakingAdjust,
    Lock,
    Unlock,
    /// Quality status change; quantities untouched
    StatusChange,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Inbound => "INBOUND",
            OperationType::Outbound => "OUTBOUND",
            OperationType::MoveOut => "MOVE_OUT",
            OperationType::MoveIn => "MOVE_IN",
            OperationType::TakingAdjust => "TAKING_ADJUST",
            OperationType::Lock => "LOCK",
            OperationType::Unlock => "UNLOCK",
            OperationType::StatusChange => "STATUS_CHANGE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INBOUND" => Some(OperationType::Inbound),
            "OUTBOUND" => Some(OperationType::Outbound),
            "MOVE_OUT" => Some(OperationType::MoveOut),
            "MOVE_IN" => Some(OperationType::MoveIn),
            "TAKING_ADJUST" => Some(OperationType::TakingAdjust),
            "LOCK" => Some(OperationType::Lock),
            "UNLOCK" => Some(OperationType::Unlock),
            "STATUS_CHANGE" => Some(OperationType::StatusChange),
            _ => None,
        }
    }
}

/// Kind of document a movement points back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusinessType {
    Inbound,
    Outbound,
    StockMove,
    StockTaking,
    Manual,
}

impl BusinessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessType::Inbound => "INBOUND",
            BusinessType::Outbound => "OUTBOUND",
            BusinessType::StockMove => "STOCK_MOVE",
            BusinessType::StockTaking => "STOCK_TAKING",
            BusinessType::Manual => "MANUAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INBOUND" => Some(BusinessType::Inbound),
            "OUTBOUND" => Some(BusinessType::Outbound),
            "STOCK_MOVE" => Some(BusinessType::StockMove),
            "STOCK_TAKING" => Some(BusinessType::StockTaking),
            "MANUAL" => Some(BusinessType::Manual),
            _ => None,
        }
    }
}

/// One immutable line of the movement log
///
/// Both quantity and lock quantity are recorded as before/change/after so that
/// replaying the log for a key reproduces the balance exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementEntry {
    pub id: Uuid,
    /// Global append order; breaks timestamp ties
    pub sequence: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub key: StockKey,
    pub operation_type: OperationType,
    pub quantity_before: Decimal,
    pub quantity_change: Decimal,
    pub quantity_after: Decimal,
    pub lock_quantity_before: Decimal,
    pub lock_quantity_change: Decimal,
    pub lock_quantity_after: Decimal,
    /// Balance version after this entry was applied
    pub version: i64,
    pub status_after: InventoryStatus,
    pub business_type: BusinessType,
    pub business_no: String,
    pub operator_id: i64,
    pub operator: String,
    pub remark: Option<String>,
}

impl MovementEntry {
    /// after = before + change, for both quantity and lock quantity
    pub fn is_arithmetic_consistent(&self) -> bool {
        self.quantity_after == self.quantity_before + self.quantity_change
            && self.lock_quantity_after == self.lock_quantity_before + self.lock_quantity_change
    }
}

/// Result of folding a key's movement entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayedBalance {
    pub quantity: Decimal,
    pub lock_quantity: Decimal,
    pub version: i64,
    pub status: InventoryStatus,
}

impl Default for ReplayedBalance {
    fn default() -> Self {
        Self {
            quantity: Decimal::ZERO,
            lock_quantity: Decimal::ZERO,
            version: 0,
            status: InventoryStatus::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("entry {sequence} does not satisfy after = before + change")]
    Arithmetic { sequence: i64 },
    #[error("entry {sequence} starts from {found}, previous entry ended at {expected}")]
    Discontinuity {
        sequence: i64,
        expected: Decimal,
        found: Decimal,
    },
}

/// Fold entries for one key, in log order, from an empty balance.
///
/// Fails if any entry is internally inconsistent or does not start where the
/// previous one ended.
pub fn replay<'a, I>(entries: I) -> Result<ReplayedBalance, ReplayError>
where
    I: IntoIterator<Item = &'a MovementEntry>,
{
    let mut state = ReplayedBalance::default();
    for entry in entries {
        if !entry.is_arithmetic_consistent() {
            return Err(ReplayError::Arithmetic {
                sequence: entry.sequence,
            });
        }
        if entry.quantity_before != state.quantity {
            return Err(ReplayError::Discontinuity {
                sequence: entry.sequence,
                expected: state.quantity,
                found: entry.quantity_before,
            });
        }
        if entry.lock_quantity_before != state.lock_quantity {
            return Err(ReplayError::Discontinuity {
                sequence: entry.sequence,
                expected: state.lock_quantity,
                found: entry.lock_quantity_before,
            });
        }
        state.quantity = entry.quantity_after;
        state.lock_quantity = entry.lock_quantity_after;
        state.version = entry.version;
        state.status = entry.status_after;
    }
    Ok(state)
}
