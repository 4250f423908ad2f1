//! Inbound (receiving) document service

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use validator::Validate;

use shared::{
    require_cancellable, require_initial, require_status, validate_batch_dates,
    validate_over_receipt, validate_receipt, BusinessType, CompleteInboundRequest,
    CreateInboundRequest, DocumentStatus, InboundItem, InboundOrder, InboundPageQuery,
    InboundStatus, InboundType, OperationType, OperatorContext, PageResult, ReceiveItemRequest,
};

use super::checks::{check_line, partial_failure, priced_amount, require_warehouse};
use super::ledger::MovementMeta;
use super::repository::{DocumentNumbers, IdSequence, Repository};
use super::retry::RetryingLedger;
use crate::error::{AppError, AppResult, ValidateField};
use crate::external::MasterData;

pub struct InboundService {
    repo: Repository<InboundOrder>,
    item_ids: IdSequence,
    numbers: Arc<DocumentNumbers>,
    ledger: RetryingLedger,
    master: Arc<dyn MasterData>,
    over_receipt_tolerance: Decimal,
}

impl InboundService {
    pub fn new(
        ledger: RetryingLedger,
        master: Arc<dyn MasterData>,
        numbers: Arc<DocumentNumbers>,
        over_receipt_tolerance: Decimal,
    ) -> Self {
        Self {
            repo: Repository::new("Inbound order"),
            item_ids: IdSequence::new(),
            numbers,
            ledger,
            master,
            over_receipt_tolerance,
        }
    }

    async fn check_request(&self, request: &CreateInboundRequest) -> AppResult<()> {
        request.validate()?;
        require_warehouse(self.master.as_ref(), request.warehouse_id).await?;
        match request.supplier_id {
            Some(supplier_id) => {
                if !self.master.supplier_exists(supplier_id).await? {
                    return Err(AppError::validation(
                        "supplierId",
                        format!("Supplier {} does not exist", supplier_id),
                    ));
                }
            }
            None if request.inbound_type == InboundType::Purchase => {
                return Err(AppError::validation(
                    "supplierId",
                    "A purchase inbound requires a supplier",
                ));
            }
            None => {}
        }
        Ok(())
    }

    async fn build_items(&self, request: &CreateInboundRequest) -> AppResult<Vec<InboundItem>> {
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
            validate_batch_dates(line.production_date, line.expire_date)
                .on_field("productionDate")?;
            items.push(InboundItem {
                id: self.item_ids.next(),
                goods_id: line.goods_id,
                location_id: line.location_id,
                batch_no: line.batch_no.clone(),
                serial_no: line.serial_no.clone(),
                production_date: line.production_date,
                expire_date: line.expire_date,
                plan_quantity: line.plan_quantity,
                received_quantity: Decimal::ZERO,
                qualified_quantity: Decimal::ZERO,
                unqualified_quantity: Decimal::ZERO,
                price: line.price,
                amount,
                posted: false,
                remark: line.remark.clone(),
            });
        }
        Ok(items)
    }

    pub async fn create(
        &self,
        request: CreateInboundRequest,
        operator: &OperatorContext,
    ) -> AppResult<InboundOrder> {
        self.check_request(&request).await?;
        let items = self.build_items(&request).await?;
        let now = Utc::now();

        let mut order = InboundOrder {
            id: self.repo.next_id(),
            inbound_no: self.numbers.next("IN"),
            inbound_type: request.inbound_type,
            warehouse_id: request.warehouse_id,
            supplier_id: request.supplier_id,
            status: InboundStatus::initial(),
            expected_arrival_time: request.expected_arrival_time,
            actual_arrival_time: None,
            total_quantity: Decimal::ZERO,
            received_quantity: Decimal::ZERO,
            total_amount: Decimal::ZERO,
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

        tracing::info!(inbound_no = %order.inbound_no, operator = %operator.operator_name, "inbound created");
        Ok(order)
    }

    /// Replace header fields and line items while still pending audit
    pub async fn update(
        &self,
        id: i64,
        request: CreateInboundRequest,
        operator: &OperatorContext,
    ) -> AppResult<InboundOrder> {
        let _guard = self.repo.guard(id)?;
        let mut order = self.repo.get(id).await?;
        require_initial(&order.inbound_no, order.status)?;
        self.check_request(&request).await?;

        order.items = self.build_items(&request).await?;
        order.inbound_type = request.inbound_type;
        order.warehouse_id = request.warehouse_id;
        order.supplier_id = request.supplier_id;
        order.expected_arrival_time = request.expected_arrival_time;
        order.remark = request.remark;
        order.updated_at = Utc::now();
        order.recompute_totals();
        self.repo.save(id, order.clone()).await?;

        tracing::info!(inbound_no = %order.inbound_no, operator = %operator.operator_name, "inbound updated");
        Ok(order)
    }

    pub async fn delete(&self, id: i64, operator: &OperatorContext) -> AppResult<()> {
        let _guard = self.repo.guard(id)?;
        let order = self.repo.get(id).await?;
        require_initial(&order.inbound_no, order.status)?;
        self.repo.remove(id).await?;
        tracing::info!(inbound_no = %order.inbound_no, operator = %operator.operator_name, "inbound deleted");
        Ok(())
    }

    pub async fn get(&self, id: i64) -> AppResult<InboundOrder> {
        self.repo.get(id).await
    }

    pub async fn page(&self, query: &InboundPageQuery) -> AppResult<PageResult<InboundOrder>> {
        let orders = self
            .repo
            .list(|o| {
                query
                    .inbound_no
                    .as_deref()
                    .map_or(true, |no| o.inbound_no.contains(no))
                    && query.inbound_type.map_or(true, |t| t == o.inbound_type)
                    && query.status.map_or(true, |s| s == o.status)
                    && query.warehouse_id.map_or(true, |w| w == o.warehouse_id)
                    && query.supplier_id.map_or(true, |s| Some(s) == o.supplier_id)
            })
            .await;
        Ok(query.page().slice(orders))
    }

    pub async fn audit(&self, id: i64, operator: &OperatorContext) -> AppResult<InboundOrder> {
        let _guard = self.repo.guard(id)?;
        let mut order = self.repo.get(id).await?;
        require_status(&order.inbound_no, order.status, InboundStatus::PendingAudit)?;

        let now = Utc::now();
        order.status = InboundStatus::Audited;
        order.audit_by = Some(operator.operator_id);
        order.audit_by_name = Some(operator.operator_name.clone());
        order.audit_time = Some(now);
        order.updated_at = now;
        self.repo.save(id, order.clone()).await?;

        tracing::info!(inbound_no = %order.inbound_no, operator = %operator.operator_name, "inbound audited");
        Ok(order)
    }

    pub async fn start_receiving(
        &self,
        id: i64,
        operator: &OperatorContext,
    ) -> AppResult<InboundOrder> {
        let _guard = self.repo.guard(id)?;
        let mut order = self.repo.get(id).await?;
        require_status(&order.inbound_no, order.status, InboundStatus::Audited)?;

        let now = Utc::now();
        order.status = InboundStatus::Receiving;
        order.actual_arrival_time = Some(now);
        order.updated_at = now;
        self.repo.save(id, order.clone()).await?;

        tracing::info!(inbound_no = %order.inbound_no, operator = %operator.operator_name, "inbound receiving started");
        Ok(order)
    }

    fn record_receipt(order: &mut InboundOrder, receipt: &ReceiveItemRequest) -> AppResult<()> {
        validate_receipt(
            receipt.received_quantity,
            receipt.qualified_quantity,
            receipt.unqualified_quantity,
        )
        .on_field("receivedQuantity")?;
        let inbound_no = order.inbound_no.clone();
        let item = order.item_mut(receipt.item_id).ok_or_else(|| {
            AppError::NotFound(format!("Inbound item {} on {}", receipt.item_id, inbound_no))
        })?;
        if item.posted {
            return Err(AppError::InvalidState(format!(
                "inbound item {} on {} is already posted to stock",
                receipt.item_id, inbound_no
            )));
        }
        item.received_quantity = receipt.received_quantity;
        item.qualified_quantity = receipt.qualified_quantity;
        item.unqualified_quantity = receipt.unqualified_quantity;
        Ok(())
    }

    /// Record what arrived for one line; nothing is posted to stock yet
    pub async fn receive_item(
        &self,
        id: i64,
        receipt: ReceiveItemRequest,
        operator: &OperatorContext,
    ) -> AppResult<InboundOrder> {
        let _guard = self.repo.guard(id)?;
        let mut order = self.repo.get(id).await?;
        require_status(&order.inbound_no, order.status, InboundStatus::Receiving)?;

        Self::record_receipt(&mut order, &receipt)?;
        order.recompute_totals();
        validate_over_receipt(
            order.received_quantity,
            order.total_quantity,
            self.over_receipt_tolerance,
        )
        .on_field("receivedQuantity")?;
        order.updated_at = Utc::now();
        self.repo.save(id, order.clone()).await?;

        tracing::info!(
            inbound_no = %order.inbound_no,
            item_id = receipt.item_id,
            received = %receipt.received_quantity,
            operator = %operator.operator_name,
            "inbound item received"
        );
        Ok(order)
    }

    /// Post every received line to stock and close the document.
    ///
    /// Lines already posted by an earlier attempt are skipped, so a partial
    /// failure can be re-run once its cause is fixed.
    pub async fn complete(
        &self,
        id: i64,
        request: CompleteInboundRequest,
        operator: &OperatorContext,
    ) -> AppResult<InboundOrder> {
        let _guard = self.repo.guard(id)?;
        let mut order = self.repo.get(id).await?;
        require_status(&order.inbound_no, order.status, InboundStatus::Receiving)?;

        for receipt in &request.items {
            Self::record_receipt(&mut order, receipt)?;
        }
        for item in &order.items {
            validate_receipt(
                item.received_quantity,
                item.qualified_quantity,
                item.unqualified_quantity,
            )
            .map_err(|message| {
                AppError::validation("receivedQuantity", format!("item {}: {}", item.id, message))
            })?;
        }
        order.recompute_totals();
        validate_over_receipt(
            order.received_quantity,
            order.total_quantity,
            self.over_receipt_tolerance,
        )
        .on_field("receivedQuantity")?;

        let mut failures = Vec::new();
        for idx in 0..order.items.len() {
            let item = &order.items[idx];
            if item.posted || item.received_quantity <= Decimal::ZERO {
                continue;
            }
            let key = item.stock_key(order.warehouse_id);
            let meta = MovementMeta::new(BusinessType::Inbound, &order.inbound_no, operator)
                .with_batch_dates(item.production_date, item.expire_date);
            match self
                .ledger
                .adjust(&key, item.received_quantity, OperationType::Inbound, &meta)
                .await
            {
                Ok(_) => order.items[idx].posted = true,
                Err(err) => failures.push(err.into_line_failure(order.items[idx].id)),
            }
        }

        let now = Utc::now();
        order.updated_at = now;
        if !failures.is_empty() {
            self.repo.save(id, order.clone()).await?;
            return Err(partial_failure(&order.inbound_no, "complete", failures));
        }

        order.status = InboundStatus::Completed;
        order.complete_by = Some(operator.operator_id);
        order.complete_by_name = Some(operator.operator_name.clone());
        order.complete_time = Some(now);
        self.repo.save(id, order.clone()).await?;

        tracing::info!(
            inbound_no = %order.inbound_no,
            received = %order.received_quantity,
            operator = %operator.operator_name,
            "inbound completed"
        );
        Ok(order)
    }

    pub async fn cancel(&self, id: i64, operator: &OperatorContext) -> AppResult<InboundOrder> {
        let _guard = self.repo.guard(id)?;
        let mut order = self.repo.get(id).await?;
        require_cancellable(&order.inbound_no, order.status)?;
        if order.any_posted() {
            return Err(AppError::InvalidState(format!(
                "inbound {} already posted stock; complete it instead",
                order.inbound_no
            )));
        }

        order.status = InboundStatus::Cancelled;
        order.updated_at = Utc::now();
        self.repo.save(id, order.clone()).await?;

        tracing::info!(inbound_no = %order.inbound_no, operator = %operator.operator_name, "inbound cancelled");
        Ok(order)
    }
}
