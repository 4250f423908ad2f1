//! Reservation manager
//!
//! Ties each outbound line to the quantity it holds locked on one balance.
//! Reservations are 1:1 with outbound lines; the lock itself lives on the
//! balance and only changes through the ledger.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared::{
    BusinessType, OperationType, OperatorContext, OutboundOrder, Reservation, ReservationState,
};

use super::ledger::MovementMeta;
use super::retry::RetryingLedger;
use crate::error::{AppError, AppResult};

pub struct ReservationManager {
    ledger: RetryingLedger,
    /// Latest reservation per outbound line id
    by_item: RwLock<BTreeMap<i64, Reservation>>,
}

impl ReservationManager {
    pub fn new(ledger: RetryingLedger) -> Self {
        Self {
            ledger,
            by_item: RwLock::new(BTreeMap::new()),
        }
    }

    fn meta(outbound: &OutboundOrder, operator: &OperatorContext) -> MovementMeta {
        MovementMeta::new(BusinessType::Outbound, &outbound.outbound_no, operator)
    }

    pub async fn get(&self, outbound_item_id: i64) -> Option<Reservation> {
        self.by_item.read().await.get(&outbound_item_id).cloned()
    }

    pub async fn for_outbound(&self, outbound_id: i64) -> Vec<Reservation> {
        self.by_item
            .read()
            .await
            .values()
            .filter(|r| r.outbound_id == outbound_id)
            .cloned()
            .collect()
    }

    async fn store(&self, reservation: Reservation) {
        self.by_item
            .write()
            .await
            .insert(reservation.outbound_item_id, reservation);
    }

    /// Lock the planned quantity of one outbound line.
    ///
    /// Re-reserving a line that already holds an active reservation returns
    /// the existing one without touching the ledger.
    pub async fn reserve(
        &self,
        outbound: &OutboundOrder,
        item_id: i64,
        operator: &OperatorContext,
    ) -> AppResult<Reservation> {
        if let Some(existing) = self.get(item_id).await.filter(|r| r.is_active()) {
            return Ok(existing);
        }
        let item = outbound.item(item_id).ok_or_else(|| {
            AppError::NotFound(format!("outbound item {} on {}", item_id, outbound.outbound_no))
        })?;
        let key = item.stock_key(outbound.warehouse_id);

        self.ledger
            .lock(&key, item.plan_quantity, &Self::meta(outbound, operator))
            .await?;

        let reservation = Reservation {
            id: Uuid::new_v4(),
            outbound_id: outbound.id,
            outbound_item_id: item.id,
            key,
            quantity: item.plan_quantity,
            consumed_quantity: Decimal::ZERO,
            state: ReservationState::Active,
            created_at: Utc::now(),
            closed_at: None,
        };
        self.store(reservation.clone()).await;
        Ok(reservation)
    }

    /// Reserve every line of `outbound` in line order, all or nothing.
    ///
    /// On the first failure the reservations taken by this call are released
    /// again and the original error is returned.
    pub async fn reserve_outbound(
        &self,
        outbound: &OutboundOrder,
        operator: &OperatorContext,
    ) -> AppResult<Vec<Reservation>> {
        let mut taken = Vec::new();
        let mut all = Vec::with_capacity(outbound.items.len());

        for item in &outbound.items {
            let already_held = self
                .get(item.id)
                .await
                .map_or(false, |r| r.is_active());
            match self.reserve(outbound, item.id, operator).await {
                Ok(reservation) => {
                    if !already_held {
                        taken.push(reservation.outbound_item_id);
                    }
                    all.push(reservation);
                }
                Err(err) => {
                    tracing::warn!(
                        outbound_no = %outbound.outbound_no,
                        item_id = item.id,
                        rolled_back = taken.len(),
                        "reservation failed, releasing partial reservations: {}",
                        err
                    );
                    for item_id in taken {
                        if let Err(release_err) = self.release(outbound, item_id, operator).await {
                            tracing::error!(
                                outbound_no = %outbound.outbound_no,
                                item_id,
                                "could not release reservation during rollback: {}",
                                release_err
                            );
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok(all)
    }

    /// Return an active reservation's outstanding lock to available stock.
    ///
    /// Releasing a line without an active reservation is a no-op.
    pub async fn release(
        &self,
        outbound: &OutboundOrder,
        item_id: i64,
        operator: &OperatorContext,
    ) -> AppResult<Option<Reservation>> {
        let Some(mut reservation) = self.get(item_id).await.filter(|r| r.is_active()) else {
            return Ok(None);
        };
        let outstanding = reservation.outstanding();
        if outstanding > Decimal::ZERO {
            self.ledger
                .unlock(&reservation.key, outstanding, &Self::meta(outbound, operator))
                .await?;
        }
        reservation.state = ReservationState::Released;
        reservation.closed_at = Some(Utc::now());
        self.store(reservation.clone()).await;
        Ok(Some(reservation))
    }

    /// Ship `shipped` out of the line's lock and release whatever is left.
    ///
    /// Safe to call again after a failure: the consumed part is remembered
    /// and never deducted twice.
    pub async fn consume(
        &self,
        outbound: &OutboundOrder,
        item_id: i64,
        shipped: Decimal,
        operator: &OperatorContext,
    ) -> AppResult<Reservation> {
        let mut reservation = self.get(item_id).await.ok_or_else(|| {
            AppError::InvalidState(format!(
                "outbound item {} on {} holds no reservation",
                item_id, outbound.outbound_no
            ))
        })?;
        match reservation.state {
            ReservationState::Consumed => return Ok(reservation),
            ReservationState::Released => {
                return Err(AppError::InvalidState(format!(
                    "reservation for outbound item {} was released",
                    item_id
                )))
            }
            ReservationState::Active => {}
        }
        if shipped > reservation.quantity {
            return Err(AppError::validation(
                "shippedQuantity",
                "Shipped quantity cannot exceed reserved quantity",
            ));
        }

        let meta = Self::meta(outbound, operator);
        let to_consume = shipped - reservation.consumed_quantity;
        if to_consume > Decimal::ZERO {
            self.ledger
                .consume_locked(&reservation.key, to_consume, OperationType::Outbound, &meta)
                .await?;
            reservation.consumed_quantity += to_consume;
            self.store(reservation.clone()).await;
        }

        let remainder = reservation.outstanding();
        if remainder > Decimal::ZERO {
            self.ledger
                .unlock(&reservation.key, remainder, &meta.clone().with_remark("short pick"))
                .await?;
        }
        reservation.state = ReservationState::Consumed;
        reservation.closed_at = Some(Utc::now());
        self.store(reservation.clone()).await;
        Ok(reservation)
    }
}
