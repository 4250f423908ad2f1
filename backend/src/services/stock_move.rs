//! Stock move documents
//!
//! `execute` optionally locks the source quantity; `complete` takes it out of
//! the source and puts it into the target as two ledger movements per line.
//! Each leg is flagged on the line once posted so a failed completion can be
//! re-run without posting a leg twice.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use validator::Validate;

use shared::{
    require_cancellable, require_initial, require_status, validate_distinct_locations,
    BusinessType, CreateStockMoveRequest, DocumentStatus, MoveLegs, OperationType,
    OperatorContext, PageResult, StockMove, StockMoveItem, StockMovePageQuery, StockMoveStatus,
};

use super::checks::{check_line, partial_failure, require_location, require_warehouse};
use super::ledger::MovementMeta;
use super::repository::{DocumentNumbers, IdSequence, Repository};
use super::retry::RetryingLedger;
use crate::error::{AppError, AppResult, ValidateField};
use crate::external::MasterData;

pub struct StockMoveService {
    repo: Repository<StockMove>,
    item_ids: IdSequence,
    numbers: Arc<DocumentNumbers>,
    ledger: RetryingLedger,
    master: Arc<dyn MasterData>,
    lock_on_execute: bool,
}

impl StockMoveService {
    pub fn new(
        ledger: RetryingLedger,
        master: Arc<dyn MasterData>,
        numbers: Arc<DocumentNumbers>,
        lock_on_execute: bool,
    ) -> Self {
        Self {
            repo: Repository::new("Stock move"),
            item_ids: IdSequence::new(),
            numbers,
            ledger,
            master,
            lock_on_execute,
        }
    }

    async fn build_items(&self, request: &CreateStockMoveRequest) -> AppResult<Vec<StockMoveItem>> {
        request.validate()?;
        require_warehouse(self.master.as_ref(), request.warehouse_id).await?;

        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            validate_distinct_locations(line.from_location_id, line.to_location_id)
                .on_field("toLocationId")?;
            check_line(
                self.master.as_ref(),
                request.warehouse_id,
                line.goods_id,
                line.from_location_id,
                line.batch_no.as_deref(),
                line.serial_no.as_deref(),
                line.quantity,
            )
            .await?;
            require_location(
                self.master.as_ref(),
                request.warehouse_id,
                line.to_location_id,
                "toLocationId",
            )
            .await?;
            items.push(StockMoveItem {
                id: self.item_ids.next(),
                goods_id: line.goods_id,
                batch_no: line.batch_no.clone(),
                serial_no: line.serial_no.clone(),
                from_location_id: line.from_location_id,
                to_location_id: line.to_location_id,
                quantity: line.quantity,
                legs: MoveLegs::default(),
                remark: line.remark.clone(),
            });
        }
        Ok(items)
    }

    pub async fn create(
        &self,
        request: CreateStockMoveRequest,
        operator: &OperatorContext,
    ) -> AppResult<StockMove> {
        let items = self.build_items(&request).await?;
        let now = Utc::now();

        let mut stock_move = StockMove {
            id: self.repo.next_id(),
            move_no: self.numbers.next("MOVE"),
            move_type: request.move_type,
            warehouse_id: request.warehouse_id,
            status: StockMoveStatus::initial(),
            total_quantity: Decimal::ZERO,
            move_reason: request.move_reason,
            execute_by: None,
            execute_by_name: None,
            execute_time: None,
            complete_by: None,
            complete_by_name: None,
            complete_time: None,
            remark: request.remark,
            creator: operator.operator_name.clone(),
            created_at: now,
            updated_at: now,
            items,
        };
        stock_move.recompute_totals();
        self.repo.insert(stock_move.id, stock_move.clone()).await;

        tracing::info!(move_no = %stock_move.move_no, operator = %operator.operator_name, "stock move created");
        Ok(stock_move)
    }

    pub async fn update(
        &self,
        id: i64,
        request: CreateStockMoveRequest,
        operator: &OperatorContext,
    ) -> AppResult<StockMove> {
        let _guard = self.repo.guard(id)?;
        let mut stock_move = self.repo.get(id).await?;
        require_initial(&stock_move.move_no, stock_move.status)?;

        let items = self.build_items(&request).await?;
        self.release_source_locks(&mut stock_move, "update", operator)
            .await?;
        stock_move.items = items;
        stock_move.move_type = request.move_type;
        stock_move.warehouse_id = request.warehouse_id;
        stock_move.move_reason = request.move_reason;
        stock_move.remark = request.remark;
        stock_move.updated_at = Utc::now();
        stock_move.recompute_totals();
        self.repo.save(id, stock_move.clone()).await?;

        tracing::info!(move_no = %stock_move.move_no, operator = %operator.operator_name, "stock move updated");
        Ok(stock_move)
    }

    pub async fn delete(&self, id: i64, operator: &OperatorContext) -> AppResult<()> {
        let _guard = self.repo.guard(id)?;
        let mut stock_move = self.repo.get(id).await?;
        require_initial(&stock_move.move_no, stock_move.status)?;
        self.release_source_locks(&mut stock_move, "delete", operator)
            .await?;
        self.repo.remove(id).await?;
        tracing::info!(move_no = %stock_move.move_no, operator = %operator.operator_name, "stock move deleted");
        Ok(())
    }

    pub async fn get(&self, id: i64) -> AppResult<StockMove> {
        self.repo.get(id).await
    }

    pub async fn page(&self, query: &StockMovePageQuery) -> AppResult<PageResult<StockMove>> {
        let moves = self
            .repo
            .list(|m| {
                query
                    .move_no
                    .as_deref()
                    .map_or(true, |no| m.move_no.contains(no))
                    && query.move_type.map_or(true, |t| t == m.move_type)
                    && query.status.map_or(true, |s| s == m.status)
                    && query.warehouse_id.map_or(true, |w| w == m.warehouse_id)
            })
            .await;
        Ok(query.page().slice(moves))
    }

    fn meta(stock_move: &StockMove, operator: &OperatorContext) -> MovementMeta {
        MovementMeta::new(BusinessType::StockMove, &stock_move.move_no, operator)
    }

    /// Unlock every source leg locked by `execute`, including the legs left
    /// behind by an `execute` that failed on other lines. The document is
    /// saved with whatever could not be released.
    async fn release_source_locks(
        &self,
        stock_move: &mut StockMove,
        action: &str,
        operator: &OperatorContext,
    ) -> AppResult<()> {
        let meta = Self::meta(stock_move, operator);
        let warehouse_id = stock_move.warehouse_id;
        let mut failures = Vec::new();
        for item in stock_move.items.iter_mut() {
            if !item.legs.source_locked {
                continue;
            }
            let key = item.source_key(warehouse_id);
            match self.ledger.unlock(&key, item.quantity, &meta).await {
                Ok(_) => item.legs.source_locked = false,
                Err(err) => failures.push(err.into_line_failure(item.id)),
            }
        }
        if failures.is_empty() {
            return Ok(());
        }
        stock_move.updated_at = Utc::now();
        self.repo.save(stock_move.id, stock_move.clone()).await?;
        Err(partial_failure(&stock_move.move_no, action, failures))
    }

    pub async fn execute(&self, id: i64, operator: &OperatorContext) -> AppResult<StockMove> {
        let _guard = self.repo.guard(id)?;
        let mut stock_move = self.repo.get(id).await?;
        require_status(&stock_move.move_no, stock_move.status, StockMoveStatus::Pending)?;

        if self.lock_on_execute {
            let meta = Self::meta(&stock_move, operator);
            let mut failures = Vec::new();
            for idx in 0..stock_move.items.len() {
                let item = &stock_move.items[idx];
                if item.legs.source_locked {
                    continue;
                }
                let key = item.source_key(stock_move.warehouse_id);
                match self.ledger.lock(&key, item.quantity, &meta).await {
                    Ok(_) => stock_move.items[idx].legs.source_locked = true,
                    Err(err) => failures.push(err.into_line_failure(stock_move.items[idx].id)),
                }
            }
            if !failures.is_empty() {
                stock_move.updated_at = Utc::now();
                self.repo.save(id, stock_move.clone()).await?;
                return Err(partial_failure(&stock_move.move_no, "execute", failures));
            }
        }

        let now = Utc::now();
        stock_move.status = StockMoveStatus::Executing;
        stock_move.execute_by = Some(operator.operator_id);
        stock_move.execute_by_name = Some(operator.operator_name.clone());
        stock_move.execute_time = Some(now);
        stock_move.updated_at = now;
        self.repo.save(id, stock_move.clone()).await?;

        tracing::info!(move_no = %stock_move.move_no, operator = %operator.operator_name, "stock move executing");
        Ok(stock_move)
    }

    /// Post both legs of one line, skipping any leg already posted
    async fn post_line(
        &self,
        warehouse_id: i64,
        item: &mut StockMoveItem,
        meta: &MovementMeta,
    ) -> AppResult<()> {
        let source = item.source_key(warehouse_id);
        let target = item.target_key(warehouse_id);

        if !item.legs.source_posted {
            // Batch dates follow the stock to its new location
            let balance = self.ledger.ledger().get_balance(&source).await?;
            let target_meta = meta
                .clone()
                .with_batch_dates(balance.production_date, balance.expire_date);

            if item.legs.source_locked {
                self.ledger
                    .consume_locked(&source, item.quantity, OperationType::MoveOut, meta)
                    .await?;
            } else {
                self.ledger
                    .adjust(&source, -item.quantity, OperationType::MoveOut, meta)
                    .await?;
            }
            item.legs.source_posted = true;

            self.ledger
                .adjust(&target, item.quantity, OperationType::MoveIn, &target_meta)
                .await?;
            item.legs.target_posted = true;
        } else if !item.legs.target_posted {
            self.ledger
                .adjust(&target, item.quantity, OperationType::MoveIn, meta)
                .await?;
            item.legs.target_posted = true;
        }
        Ok(())
    }

    pub async fn complete(&self, id: i64, operator: &OperatorContext) -> AppResult<StockMove> {
        let _guard = self.repo.guard(id)?;
        let mut stock_move = self.repo.get(id).await?;
        require_status(&stock_move.move_no, stock_move.status, StockMoveStatus::Executing)?;

        let meta = Self::meta(&stock_move, operator);
        let warehouse_id = stock_move.warehouse_id;
        let mut failures = Vec::new();
        for item in stock_move.items.iter_mut() {
            if item.is_posted() {
                continue;
            }
            if let Err(err) = self.post_line(warehouse_id, item, &meta).await {
                failures.push(err.into_line_failure(item.id));
            }
        }

        let now = Utc::now();
        stock_move.updated_at = now;
        if !failures.is_empty() {
            self.repo.save(id, stock_move.clone()).await?;
            return Err(partial_failure(&stock_move.move_no, "complete", failures));
        }

        stock_move.status = StockMoveStatus::Completed;
        stock_move.complete_by = Some(operator.operator_id);
        stock_move.complete_by_name = Some(operator.operator_name.clone());
        stock_move.complete_time = Some(now);
        self.repo.save(id, stock_move.clone()).await?;

        tracing::info!(move_no = %stock_move.move_no, operator = %operator.operator_name, "stock move completed");
        Ok(stock_move)
    }

    /// Cancel and release any source locks taken by `execute`
    pub async fn cancel(&self, id: i64, operator: &OperatorContext) -> AppResult<StockMove> {
        let _guard = self.repo.guard(id)?;
        let mut stock_move = self.repo.get(id).await?;
        require_cancellable(&stock_move.move_no, stock_move.status)?;
        if stock_move.has_stock_in_transit() || stock_move.items.iter().any(|i| i.is_posted()) {
            return Err(AppError::InvalidState(format!(
                "stock move {} has already moved stock; complete it instead",
                stock_move.move_no
            )));
        }

        self.release_source_locks(&mut stock_move, "cancel", operator)
            .await?;

        stock_move.updated_at = Utc::now();
        stock_move.status = StockMoveStatus::Cancelled;
        self.repo.save(id, stock_move.clone()).await?;

        tracing::info!(move_no = %stock_move.move_no, operator = %operator.operator_name, "stock move cancelled");
        Ok(stock_move)
    }
}
