//! Reservations of stock against outbound lines

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stock::StockKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    /// Quantity is locked on the balance
    Active,
    /// Lock returned to available stock
    Released,
    /// Lock converted into an outbound movement
    Consumed,
}

/// Locked quantity held for exactly one outbound line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub outbound_id: i64,
    pub outbound_item_id: i64,
    pub key: StockKey,
    pub quantity: Decimal,
    /// Portion already shipped out of the lock
    pub consumed_quantity: Decimal,
    pub state: ReservationState,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        self.state == ReservationState::Active
    }

    /// Locked quantity not yet consumed
    pub fn outstanding(&self) -> Decimal {
        self.quantity - self.consumed_quantity
    }
}
