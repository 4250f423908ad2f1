//! Outbound (shipping) document service
//!
//! Reservations are taken when picking starts and converted into outbound
//! movements on shipment. Picking waves and tasks feed picked quantities and
//! picking exceptions back into the outbound lines through this service.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use validator::Validate;

use shared::{
    require_cancellable, require_initial, require_status, validate_pick,
    CompleteOutboundItemRequest, CreateOutboundRequest, DocumentStatus, OperatorContext,
    OutboundItem, OutboundOrder, OutboundPageQuery, OutboundStatus, OutboundType, PageResult,
    PickingExceptionType, Reservation,
};

use super::checks::{check_line, partial_failure, priced_amount, require_warehouse};
use super::repository::{DocumentNumbers, IdSequence, Repository, TransitionGuard};
use super::reservation::ReservationManager;
use crate::error::{AppError, AppResult, ValidateField};
use crate::external::MasterData;

pub struct OutboundService {
    repo: Repository<OutboundOrder>,
    item_ids: IdSequence,
    numbers: Arc<DocumentNumbers>,
    reservations: Arc<ReservationManager>,
    master: Arc<dyn MasterData>,
}

impl OutboundService {
    pub fn new(
        reservations: Arc<ReservationManager>,
        master: Arc<dyn MasterData>,
        numbers: Arc<DocumentNumbers>,
    ) -> Self {
        Self {
            repo: Repository::new("Outbound order"),
            item_ids: IdSequence::new(),
            numbers,
            reservations,
            master,
        }
    }

    pub fn reservations(&self) -> &Arc<ReservationManager> {
        &self.reservations
    }

    async fn check_request(&self, request: &CreateOutboundRequest) -> AppResult<()> {
        request.validate()?;
        require_warehouse(self.master.as_ref(), request.warehouse_id).await?;
        match request.customer_id {
            Some(customer_id) => {
                if !self.master.customer_exists(customer_id).await? {
                    return Err(AppError::validation(
                        "customerId",
                        format!("Customer {} does not exist", customer_id),
                    ));
                }
            }
            None if request.outbound_type == OutboundType::Sale => {
                return Err(AppError::validation(
                    "customerId",
                    "A sale outbound requires a customer",
                ));
            }
            None => {}
        }
        Ok(())
    }

    async fn build_items(&self, request: &CreateOutboundRequest) -> AppResult<Vec<OutboundItem>> {
        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            check_line(
                self.master.as_ref(),
                request.warehouse_id,
                line.goods_id,
                line.location_id,
                line.batch_no.as_deref(),
                line.serial_no.as_deref(),
                line.plan_quantity,
            )
            .await?;
            let amount = priced_amount(line.plan_quantity, line.price)?;
            items.push(OutboundItem {
                id: self.item_ids.next(),
                goods_id: line.goods_id,
                location_id: line.location_id,
                batch_no: line.batch_no.clone(),
                serial_no: line.serial_no.clone(),
                plan_quantity: line.plan_quantity,
                picked_quantity: None,
                shipped_quantity: Decimal::ZERO,
                price: line.price,
                amount,
                exception: None,
                posted: false,
                remark: line.remark.clone(),
            });
        }
        Ok(items)
    }

    pub async fn create(
        &self,
        request: CreateOutboundRequest,
        operator: &OperatorContext,
    ) -> AppResult<OutboundOrder> {
        self.check_request(&request).await?;
        let items = self.build_items(&request).await?;
        let now = Utc::now();

        let mut order = OutboundOrder {
            id: self.repo.next_id(),
            outbound_no: self.numbers.next("OUT"),
            outbound_type: request.outbound_type,
            warehouse_id: request.warehouse_id,
            customer_id: request.customer_id,
            status: OutboundStatus::initial(),
            expected_shipment_time: request.expected_shipment_time,
            actual_shipment_time: None,
            total_quantity: Decimal::ZERO,
            picked_quantity: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            wave_id: None,
            audit_by: None,
            audit_by_name: None,
            audit_time: None,
            complete_by: None,
            complete_by_name: None,
            complete_time: None,
            remark: request.remark,
            creator: operator.operator_name.clone(),
            created_at: now,
            updated_at: now,
            items,
        };
        order.recompute_totals();
        self.repo.insert(order.id, order.clone()).await;

        tracing::info!(outbound_no = %order.outbound_no, operator = %operator.operator_name, "outbound created");
        Ok(order)
    }

    pub async fn update(
        &self,
        id: i64,
        request: CreateOutboundRequest,
        operator: &OperatorContext,
    ) -> AppResult<OutboundOrder> {
        let _guard = self.repo.guard(id)?;
        let mut order = self.repo.get(id).await?;
        require_initial(&order.outbound_no, order.status)?;
        self.check_request(&request).await?;

        order.items = self.build_items(&request).await?;
        order.outbound_type = request.outbound_type;
        order.warehouse_id = request.warehouse_id;
        order.customer_id = request.customer_id;
        order.expected_shipment_time = request.expected_shipment_time;
        order.remark = request.remark;
        order.updated_at = Utc::now();
        order.recompute_totals();
        self.repo.save(id, order.clone()).await?;

        tracing::info!(outbound_no = %order.outbound_no, operator = %operator.operator_name, "outbound updated");
        Ok(order)
    }

    pub async fn delete(&self, id: i64, operator: &OperatorContext) -> AppResult<()> {
        let _guard = self.repo.guard(id)?;
        let order = self.repo.get(id).await?;
        require_initial(&order.outbound_no, order.status)?;
        self.repo.remove(id).await?;
        tracing::info!(outbound_no = %order.outbound_no, operator = %operator.operator_name, "outbound deleted");
        Ok(())
    }

    pub async fn get(&self, id: i64) -> AppResult<OutboundOrder> {
        self.repo.get(id).await
    }

    pub async fn page(&self, query: &OutboundPageQuery) -> AppResult<PageResult<OutboundOrder>> {
        let orders = self
            .repo
            .list(|o| {
                query
                    .outbound_no
                    .as_deref()
                    .map_or(true, |no| o.outbound_no.contains(no))
                    && query.outbound_type.map_or(true, |t| t == o.outbound_type)
                    && query.status.map_or(true, |s| s == o.status)
                    && query.warehouse_id.map_or(true, |w| w == o.warehouse_id)
                    && query.customer_id.map_or(true, |c| Some(c) == o.customer_id)
            })
            .await;
        Ok(query.page().slice(orders))
    }

    /// Audited outbounds of a warehouse not yet in any wave
    pub async fn waveable(&self, warehouse_id: i64) -> Vec<OutboundOrder> {
        self.repo
            .list(|o| {
                o.warehouse_id == warehouse_id
                    && o.status == OutboundStatus::Audited
                    && o.wave_id.is_none()
            })
            .await
    }

    pub async fn reservations_of(&self, id: i64) -> AppResult<Vec<Reservation>> {
        self.repo.get(id).await?;
        Ok(self.reservations.for_outbound(id).await)
    }

    pub async fn audit(&self, id: i64, operator: &OperatorContext) -> AppResult<OutboundOrder> {
        let _guard = self.repo.guard(id)?;
        let mut order = self.repo.get(id).await?;
        require_status(&order.outbound_no, order.status, OutboundStatus::PendingAudit)?;

        let now = Utc::now();
        order.status = OutboundStatus::Audited;
        order.audit_by = Some(operator.operator_id);
        order.audit_by_name = Some(operator.operator_name.clone());
        order.audit_time = Some(now);
        order.updated_at = now;
        self.repo.save(id, order.clone()).await?;

        tracing::info!(outbound_no = %order.outbound_no, operator = %operator.operator_name, "outbound audited");
        Ok(order)
    }

    /// Reserve stock for every line and move to `picking`.
    ///
    /// All or nothing: if any line cannot be reserved none stay reserved and
    /// the order stays audited.
    pub async fn start_picking(
        &self,
        id: i64,
        operator: &OperatorContext,
    ) -> AppResult<OutboundOrder> {
        let _guard = self.repo.guard(id)?;
        let mut order = self.repo.get(id).await?;
        require_status(&order.outbound_no, order.status, OutboundStatus::Audited)?;

        self.reservations.reserve_outbound(&order, operator).await?;

        order.status = OutboundStatus::Picking;
        order.updated_at = Utc::now();
        self.repo.save(id, order.clone()).await?;

        tracing::info!(outbound_no = %order.outbound_no, operator = %operator.operator_name, "outbound picking started");
        Ok(order)
    }

    fn advance_if_picked(order: &mut OutboundOrder) {
        order.recompute_totals();
        if order.status == OutboundStatus::Picking && order.is_fully_picked() {
            order.status = OutboundStatus::ReadyToShip;
            tracing::info!(outbound_no = %order.outbound_no, "outbound ready to ship");
        }
    }

    /// Record the picked quantity of one line, optionally flagging a picking exception
    pub async fn record_pick(
        &self,
        id: i64,
        item_id: i64,
        picked: Decimal,
        exception: Option<PickingExceptionType>,
        operator: &OperatorContext,
    ) -> AppResult<OutboundOrder> {
        let _guard = self.repo.guard(id)?;
        let mut order = self.repo.get(id).await?;
        require_status(&order.outbound_no, order.status, OutboundStatus::Picking)?;

        let outbound_no = order.outbound_no.clone();
        let item = order.item_mut(item_id).ok_or_else(|| {
            AppError::NotFound(format!("Outbound item {} on {}", item_id, outbound_no))
        })?;
        validate_pick(picked, item.plan_quantity).on_field("pickedQuantity")?;
        item.picked_quantity = Some(picked);
        item.exception = exception;

        Self::advance_if_picked(&mut order);
        order.updated_at = Utc::now();
        self.repo.save(id, order.clone()).await?;

        tracing::info!(
            outbound_no = %order.outbound_no,
            item_id,
            picked = %picked,
            exception = ?exception.map(|e| e.label()),
            operator = %operator.operator_name,
            "outbound item picked"
        );
        Ok(order)
    }

    /// The "complete-item" action: a clean pick of one line
    pub async fn complete_item(
        &self,
        id: i64,
        request: CompleteOutboundItemRequest,
        operator: &OperatorContext,
    ) -> AppResult<OutboundOrder> {
        self.record_pick(id, request.item_id, request.picked_quantity, None, operator)
            .await
    }

    /// Manual resolution of a picking exception with an operator-confirmed quantity
    pub async fn resolve_exception(
        &self,
        id: i64,
        item_id: i64,
        confirmed: Decimal,
        operator: &OperatorContext,
    ) -> AppResult<OutboundOrder> {
        {
            let order = self.repo.get(id).await?;
            let item = order.item(item_id).ok_or_else(|| {
                AppError::NotFound(format!("Outbound item {} on {}", item_id, order.outbound_no))
            })?;
            if item.exception.is_none() {
                return Err(AppError::InvalidState(format!(
                    "outbound item {} on {} has no open picking exception",
                    item_id, order.outbound_no
                )));
            }
        }
        self.record_pick(id, item_id, confirmed, None, operator).await
    }

    /// Ship picked quantities out of their reservations.
    ///
    /// Each line consumes its picked quantity from the lock in one ledger step
    /// and releases any short-pick remainder.
    pub async fn ship(&self, id: i64, operator: &OperatorContext) -> AppResult<OutboundOrder> {
        let _guard = self.repo.guard(id)?;
        let mut order = self.repo.get(id).await?;
        require_status(&order.outbound_no, order.status, OutboundStatus::ReadyToShip)?;
        if !order.is_fully_picked() {
            return Err(AppError::InvalidState(format!(
                "outbound {} has unpicked lines or open picking exceptions",
                order.outbound_no
            )));
        }

        let mut failures = Vec::new();
        for idx in 0..order.items.len() {
            let item = &order.items[idx];
            if item.posted {
                continue;
            }
            let item_id = item.id;
            let picked = item.picked_quantity.unwrap_or(Decimal::ZERO);
            match self.reservations.consume(&order, item_id, picked, operator).await {
                Ok(_) => {
                    let item = &mut order.items[idx];
                    item.shipped_quantity = picked;
                    item.posted = true;
                }
                Err(err) => failures.push(err.into_line_failure(item_id)),
            }
        }

        let now = Utc::now();
        order.updated_at = now;
        if !failures.is_empty() {
            self.repo.save(id, order.clone()).await?;
            return Err(partial_failure(&order.outbound_no, "ship", failures));
        }

        order.status = OutboundStatus::Shipped;
        order.actual_shipment_time = Some(now);
        order.complete_by = Some(operator.operator_id);
        order.complete_by_name = Some(operator.operator_name.clone());
        order.complete_time = Some(now);
        self.repo.save(id, order.clone()).await?;

        tracing::info!(outbound_no = %order.outbound_no, operator = %operator.operator_name, "outbound shipped");
        Ok(order)
    }

    /// Cancel and release every outstanding reservation
    pub async fn cancel(&self, id: i64, operator: &OperatorContext) -> AppResult<OutboundOrder> {
        let _guard = self.repo.guard(id)?;
        let mut order = self.repo.get(id).await?;
        require_cancellable(&order.outbound_no, order.status)?;
        if order.any_posted() {
            return Err(AppError::InvalidState(format!(
                "outbound {} already shipped some lines; finish shipping it instead",
                order.outbound_no
            )));
        }

        let mut failures = Vec::new();
        for item in &order.items {
            if let Err(err) = self.reservations.release(&order, item.id, operator).await {
                failures.push(err.into_line_failure(item.id));
            }
        }
        if !failures.is_empty() {
            return Err(partial_failure(&order.outbound_no, "cancel", failures));
        }

        order.status = OutboundStatus::Cancelled;
        order.updated_at = Utc::now();
        self.repo.save(id, order.clone()).await?;

        tracing::info!(outbound_no = %order.outbound_no, operator = %operator.operator_name, "outbound cancelled");
        Ok(order)
    }

    /// Guard several outbounds at once, in id order
    pub(crate) fn guard_all(&self, ids: &[i64]) -> AppResult<Vec<TransitionGuard>> {
        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        sorted.into_iter().map(|id| self.repo.guard(id)).collect()
    }

    /// Attach audited, unwaved outbounds to a wave.
    ///
    /// The caller must hold the guards from [`guard_all`](Self::guard_all).
    pub(crate) async fn attach_wave(
        &self,
        ids: &[i64],
        warehouse_id: i64,
        wave_id: i64,
    ) -> AppResult<Vec<OutboundOrder>> {
        let mut orders = Vec::with_capacity(ids.len());
        for &id in ids {
            let order = self.repo.get(id).await?;
            require_status(&order.outbound_no, order.status, OutboundStatus::Audited)?;
            if order.warehouse_id != warehouse_id {
                return Err(AppError::validation(
                    "outboundIds",
                    format!(
                        "outbound {} belongs to warehouse {}",
                        order.outbound_no, order.warehouse_id
                    ),
                ));
            }
            if let Some(existing) = order.wave_id {
                return Err(AppError::InvalidState(format!(
                    "outbound {} is already in wave {}",
                    order.outbound_no, existing
                )));
            }
            orders.push(order);
        }
        for order in &mut orders {
            order.wave_id = Some(wave_id);
            order.updated_at = Utc::now();
            self.repo.save(order.id, order.clone()).await?;
        }
        Ok(orders)
    }

    /// Free an outbound from its wave so it can be waved again
    pub(crate) async fn detach_wave(&self, id: i64, wave_id: i64) -> AppResult<()> {
        let _guard = self.repo.guard(id)?;
        let mut order = self.repo.get(id).await?;
        let open = matches!(
            order.status,
            OutboundStatus::Audited | OutboundStatus::Picking
        );
        if order.wave_id != Some(wave_id) || !open {
            return Ok(());
        }
        order.wave_id = None;
        order.updated_at = Utc::now();
        self.repo.save(id, order).await
    }
}
