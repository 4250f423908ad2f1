//! Stock-taking plans and stock-taking documents
//!
//! A plan covers a scope of the warehouse; starting it creates one taking per
//! balance in scope with the book quantity captured at that moment. A taking
//! is counted, reviewed and then adjusted, which posts the difference.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use validator::Validate;

use shared::{
    require_cancellable, require_initial, require_status, validate_non_negative_quantity,
    BusinessType, CreateStockTakingPlanRequest, CreateStockTakingRequest, DocumentStatus,
    OperationType, OperatorContext, PageResult, StockBalance, StockTaking, StockTakingPageQuery,
    StockTakingPlan, StockTakingPlanPageQuery, StockTakingPlanStatus, StockTakingScopeType,
    StockTakingStatus, SubmitCountRequest,
};

use super::checks::{require_goods, require_location, require_warehouse};
use super::ledger::MovementMeta;
use super::repository::{DocumentNumbers, Repository};
use super::retry::RetryingLedger;
use crate::error::{AppError, AppResult, ValidateField};
use crate::external::MasterData;
use crate::store::BalanceFilter;

pub struct StockTakingService {
    plans: Repository<StockTakingPlan>,
    takings: Repository<StockTaking>,
    numbers: Arc<DocumentNumbers>,
    ledger: RetryingLedger,
    master: Arc<dyn MasterData>,
}

impl StockTakingService {
    pub fn new(
        ledger: RetryingLedger,
        master: Arc<dyn MasterData>,
        numbers: Arc<DocumentNumbers>,
    ) -> Self {
        Self {
            plans: Repository::new("Stock taking plan"),
            takings: Repository::new("Stock taking"),
            numbers,
            ledger,
            master,
        }
    }

    // ========================================================================
    // Plans
    // ========================================================================

    async fn check_plan(&self, request: &CreateStockTakingPlanRequest) -> AppResult<()> {
        request.validate()?;
        require_warehouse(self.master.as_ref(), request.warehouse_id).await?;
        if request.scope_type != StockTakingScopeType::Warehouse && request.scope_ids.is_empty() {
            return Err(AppError::validation(
                "scopeIds",
                format!("A {} scope needs at least one id", request.scope_type),
            ));
        }
        if let (Some(start), Some(end)) = (request.plan_start_time, request.plan_end_time) {
            if start > end {
                return Err(AppError::validation(
                    "planEndTime",
                    "Plan end time cannot be before plan start time",
                ));
            }
        }
        Ok(())
    }

    pub async fn create_plan(
        &self,
        request: CreateStockTakingPlanRequest,
        operator: &OperatorContext,
    ) -> AppResult<StockTakingPlan> {
        self.check_plan(&request).await?;
        let now = Utc::now();
        let plan = StockTakingPlan {
            id: self.plans.next_id(),
            plan_no: self.numbers.next("PLAN"),
            plan_name: request.plan_name,
            warehouse_id: request.warehouse_id,
            taking_type: request.taking_type,
            scope_type: request.scope_type,
            scope_ids: request.scope_ids,
            plan_start_time: request.plan_start_time,
            plan_end_time: request.plan_end_time,
            actual_start_time: None,
            actual_end_time: None,
            total_count: 0,
            completed_count: 0,
            diff_count: 0,
            status: StockTakingPlanStatus::initial(),
            audit_by: None,
            audit_by_name: None,
            audit_time: None,
            remark: request.remark,
            creator: operator.operator_name.clone(),
            created_at: now,
            updated_at: now,
        };
        self.plans.insert(plan.id, plan.clone()).await;

        tracing::info!(plan_no = %plan.plan_no, operator = %operator.operator_name, "stock taking plan created");
        Ok(plan)
    }

    pub async fn update_plan(
        &self,
        id: i64,
        request: CreateStockTakingPlanRequest,
        operator: &OperatorContext,
    ) -> AppResult<StockTakingPlan> {
        let _guard = self.plans.guard(id)?;
        let mut plan = self.plans.get(id).await?;
        require_initial(&plan.plan_no, plan.status)?;
        self.check_plan(&request).await?;

        plan.plan_name = request.plan_name;
        plan.warehouse_id = request.warehouse_id;
        plan.taking_type = request.taking_type;
        plan.scope_type = request.scope_type;
        plan.scope_ids = request.scope_ids;
        plan.plan_start_time = request.plan_start_time;
        plan.plan_end_time = request.plan_end_time;
        plan.remark = request.remark;
        plan.updated_at = Utc::now();
        self.plans.save(id, plan.clone()).await?;

        tracing::info!(plan_no = %plan.plan_no, operator = %operator.operator_name, "stock taking plan updated");
        Ok(plan)
    }

    pub async fn delete_plan(&self, id: i64, operator: &OperatorContext) -> AppResult<()> {
        let _guard = self.plans.guard(id)?;
        let plan = self.plans.get(id).await?;
        require_initial(&plan.plan_no, plan.status)?;
        self.plans.remove(id).await?;
        tracing::info!(plan_no = %plan.plan_no, operator = %operator.operator_name, "stock taking plan deleted");
        Ok(())
    }

    pub async fn get_plan(&self, id: i64) -> AppResult<StockTakingPlan> {
        self.plans.get(id).await
    }

    pub async fn plan_page(
        &self,
        query: &StockTakingPlanPageQuery,
    ) -> AppResult<PageResult<StockTakingPlan>> {
        let plans = self
            .plans
            .list(|p| {
                query
                    .plan_no
                    .as_deref()
                    .map_or(true, |no| p.plan_no.contains(no))
                    && query
                        .plan_name
                        .as_deref()
                        .map_or(true, |name| p.plan_name.contains(name))
                    && query.warehouse_id.map_or(true, |w| w == p.warehouse_id)
                    && query.taking_type.map_or(true, |t| t == p.taking_type)
                    && query.status.map_or(true, |s| s == p.status)
            })
            .await;
        Ok(query.page().slice(plans))
    }

    pub async fn audit_plan(
        &self,
        id: i64,
        operator: &OperatorContext,
    ) -> AppResult<StockTakingPlan> {
        let _guard = self.plans.guard(id)?;
        let mut plan = self.plans.get(id).await?;
        require_status(&plan.plan_no, plan.status, StockTakingPlanStatus::PendingAudit)?;

        let now = Utc::now();
        plan.status = StockTakingPlanStatus::Pending;
        plan.audit_by = Some(operator.operator_id);
        plan.audit_by_name = Some(operator.operator_name.clone());
        plan.audit_time = Some(now);
        plan.updated_at = now;
        self.plans.save(id, plan.clone()).await?;

        tracing::info!(plan_no = %plan.plan_no, operator = %operator.operator_name, "stock taking plan audited");
        Ok(plan)
    }

    /// Balances the plan's scope covers
    async fn balances_in_scope(&self, plan: &StockTakingPlan) -> AppResult<Vec<StockBalance>> {
        let mut filter = BalanceFilter::warehouse(plan.warehouse_id);
        match plan.scope_type {
            StockTakingScopeType::Warehouse => {}
            StockTakingScopeType::Area => {
                let areas: BTreeSet<i64> = plan.scope_ids.iter().copied().collect();
                let locations = self
                    .master
                    .locations_in_warehouse(plan.warehouse_id)
                    .await?
                    .into_iter()
                    .filter(|l| areas.contains(&l.area_id))
                    .map(|l| l.id)
                    .collect();
                filter.location_ids = Some(locations);
            }
            StockTakingScopeType::Location => {
                filter.location_ids = Some(plan.scope_ids.clone());
            }
            StockTakingScopeType::Goods => {
                filter.goods_ids = Some(plan.scope_ids.clone());
            }
        }
        self.ledger.ledger().balances(&filter).await
    }

    fn new_taking(
        &self,
        balance: &StockBalance,
        plan: Option<&StockTakingPlan>,
        remark: Option<String>,
    ) -> StockTaking {
        let now = Utc::now();
        StockTaking {
            id: self.takings.next_id(),
            taking_no: self.numbers.next("TAKE"),
            plan_id: plan.map(|p| p.id),
            plan_no: plan.map(|p| p.plan_no.clone()),
            key: balance.key.clone(),
            book_quantity: balance.quantity,
            actual_quantity: None,
            diff_reason: None,
            operator_id: None,
            operator: None,
            operate_time: None,
            reviewer_id: None,
            reviewer: None,
            review_time: None,
            status: StockTakingStatus::initial(),
            posted: false,
            remark,
            created_at: now,
            updated_at: now,
        }
    }

    /// Generate one taking per balance in scope, capturing book quantities
    pub async fn start_plan(
        &self,
        id: i64,
        operator: &OperatorContext,
    ) -> AppResult<StockTakingPlan> {
        let _guard = self.plans.guard(id)?;
        let mut plan = self.plans.get(id).await?;
        require_status(&plan.plan_no, plan.status, StockTakingPlanStatus::Pending)?;

        let balances = self.balances_in_scope(&plan).await?;
        for balance in &balances {
            let taking = self.new_taking(balance, Some(&plan), None);
            self.takings.insert(taking.id, taking).await;
        }

        let now = Utc::now();
        plan.status = StockTakingPlanStatus::Processing;
        plan.total_count = balances.len() as u32;
        plan.actual_start_time = Some(now);
        plan.updated_at = now;
        self.plans.save(id, plan.clone()).await?;

        tracing::info!(
            plan_no = %plan.plan_no,
            takings = plan.total_count,
            operator = %operator.operator_name,
            "stock taking plan started"
        );
        Ok(plan)
    }

    /// Close a plan once every taking is adjusted or cancelled
    pub async fn complete_plan(
        &self,
        id: i64,
        operator: &OperatorContext,
    ) -> AppResult<StockTakingPlan> {
        let _guard = self.plans.guard(id)?;
        let mut plan = self.plans.get(id).await?;
        require_status(&plan.plan_no, plan.status, StockTakingPlanStatus::Processing)?;

        let takings = self.takings.list(|t| t.plan_id == Some(id)).await;
        let open: Vec<&str> = takings
            .iter()
            .filter(|t| !t.status.is_terminal())
            .map(|t| t.taking_no.as_str())
            .collect();
        if !open.is_empty() {
            return Err(AppError::InvalidState(format!(
                "stock taking plan {} still has open takings: {}",
                plan.plan_no,
                open.join(", ")
            )));
        }

        let now = Utc::now();
        Self::count_progress(&mut plan, &takings);
        plan.status = StockTakingPlanStatus::Completed;
        plan.actual_end_time = Some(now);
        plan.updated_at = now;
        self.plans.save(id, plan.clone()).await?;

        tracing::info!(plan_no = %plan.plan_no, diff_count = plan.diff_count, operator = %operator.operator_name, "stock taking plan completed");
        Ok(plan)
    }

    pub async fn cancel_plan(
        &self,
        id: i64,
        operator: &OperatorContext,
    ) -> AppResult<StockTakingPlan> {
        let _guard = self.plans.guard(id)?;
        let mut plan = self.plans.get(id).await?;
        require_cancellable(&plan.plan_no, plan.status)?;

        for listed in self
            .takings
            .list(|t| t.plan_id == Some(id) && !t.status.is_terminal())
            .await
        {
            let _taking_guard = self.takings.guard(listed.id)?;
            // May have been adjusted since it was listed
            let mut taking = self.takings.get(listed.id).await?;
            if taking.status.is_terminal() {
                continue;
            }
            taking.status = StockTakingStatus::Cancelled;
            taking.updated_at = Utc::now();
            self.takings.save(taking.id, taking).await?;
        }

        plan.status = StockTakingPlanStatus::Cancelled;
        plan.updated_at = Utc::now();
        self.plans.save(id, plan.clone()).await?;

        tracing::info!(plan_no = %plan.plan_no, operator = %operator.operator_name, "stock taking plan cancelled");
        Ok(plan)
    }

    fn count_progress(plan: &mut StockTakingPlan, takings: &[StockTaking]) {
        plan.completed_count = takings.iter().filter(|t| t.status.is_terminal()).count() as u32;
        plan.diff_count = takings
            .iter()
            .filter(|t| t.status != StockTakingStatus::Cancelled && t.has_difference())
            .count() as u32;
    }

    /// Recount the plan's progress after one of its takings moved
    async fn refresh_plan(&self, plan_id: Option<i64>) -> AppResult<()> {
        let Some(plan_id) = plan_id else {
            return Ok(());
        };
        let _guard = self.plans.wait_guard(plan_id).await;
        let Some(mut plan) = self.plans.find(plan_id).await else {
            return Ok(());
        };
        if plan.status != StockTakingPlanStatus::Processing {
            return Ok(());
        }
        let takings = self.takings.list(|t| t.plan_id == Some(plan_id)).await;
        Self::count_progress(&mut plan, &takings);
        plan.updated_at = Utc::now();
        self.plans.save(plan_id, plan).await
    }

    // ========================================================================
    // Takings
    // ========================================================================

    /// A standalone taking for one key, outside any plan
    pub async fn create_taking(
        &self,
        request: CreateStockTakingRequest,
        operator: &OperatorContext,
    ) -> AppResult<StockTaking> {
        let key = request.key;
        require_warehouse(self.master.as_ref(), key.warehouse_id).await?;
        require_location(self.master.as_ref(), key.warehouse_id, key.location_id, "locationId")
            .await?;
        require_goods(self.master.as_ref(), key.goods_id).await?;

        let balance = self.ledger.ledger().get_balance(&key).await?;
        let taking = self.new_taking(&balance, None, request.remark);
        self.takings.insert(taking.id, taking.clone()).await;

        tracing::info!(taking_no = %taking.taking_no, key = %taking.key, operator = %operator.operator_name, "stock taking created");
        Ok(taking)
    }

    pub async fn get_taking(&self, id: i64) -> AppResult<StockTaking> {
        self.takings.get(id).await
    }

    pub async fn taking_page(
        &self,
        query: &StockTakingPageQuery,
    ) -> AppResult<PageResult<StockTaking>> {
        let takings = self
            .takings
            .list(|t| {
                query
                    .taking_no
                    .as_deref()
                    .map_or(true, |no| t.taking_no.contains(no))
                    && query.plan_id.map_or(true, |id| Some(id) == t.plan_id)
                    && query.warehouse_id.map_or(true, |w| w == t.key.warehouse_id)
                    && query.goods_id.map_or(true, |g| g == t.key.goods_id)
                    && query.status.map_or(true, |s| s == t.status)
            })
            .await;
        Ok(query.page().slice(takings))
    }

    /// Record the counted quantity
    pub async fn submit(
        &self,
        id: i64,
        request: SubmitCountRequest,
        operator: &OperatorContext,
    ) -> AppResult<StockTaking> {
        request.validate()?;
        validate_non_negative_quantity(request.actual_quantity).on_field("actualQuantity")?;

        let _guard = self.takings.guard(id)?;
        let mut taking = self.takings.get(id).await?;
        require_status(&taking.taking_no, taking.status, StockTakingStatus::Pending)?;

        let now = Utc::now();
        taking.actual_quantity = Some(request.actual_quantity);
        taking.diff_reason = request.diff_reason;
        taking.operator_id = Some(operator.operator_id);
        taking.operator = Some(operator.operator_name.clone());
        taking.operate_time = Some(now);
        taking.status = StockTakingStatus::Counted;
        taking.updated_at = now;
        self.takings.save(id, taking.clone()).await?;

        tracing::info!(
            taking_no = %taking.taking_no,
            book = %taking.book_quantity,
            actual = %request.actual_quantity,
            operator = %operator.operator_name,
            "stock count submitted"
        );
        self.refresh_plan(taking.plan_id).await?;
        Ok(taking)
    }

    pub async fn review(&self, id: i64, operator: &OperatorContext) -> AppResult<StockTaking> {
        let _guard = self.takings.guard(id)?;
        let mut taking = self.takings.get(id).await?;
        require_status(&taking.taking_no, taking.status, StockTakingStatus::Counted)?;

        let now = Utc::now();
        taking.reviewer_id = Some(operator.operator_id);
        taking.reviewer = Some(operator.operator_name.clone());
        taking.review_time = Some(now);
        taking.status = StockTakingStatus::Reviewed;
        taking.updated_at = now;
        self.takings.save(id, taking.clone()).await?;

        tracing::info!(taking_no = %taking.taking_no, operator = %operator.operator_name, "stock count reviewed");
        Ok(taking)
    }

    /// Post `actual - book` to the ledger; no movement when they agree
    pub async fn adjust(&self, id: i64, operator: &OperatorContext) -> AppResult<StockTaking> {
        let _guard = self.takings.guard(id)?;
        let mut taking = self.takings.get(id).await?;
        require_status(&taking.taking_no, taking.status, StockTakingStatus::Reviewed)?;

        let difference = taking.difference().unwrap_or(Decimal::ZERO);
        if !difference.is_zero() && !taking.posted {
            let mut meta = MovementMeta::new(BusinessType::StockTaking, &taking.taking_no, operator);
            if let Some(reason) = &taking.diff_reason {
                meta = meta.with_remark(reason.clone());
            }
            self.ledger
                .adjust(&taking.key, difference, OperationType::TakingAdjust, &meta)
                .await?;
            taking.posted = true;
        }

        taking.status = StockTakingStatus::Adjusted;
        taking.updated_at = Utc::now();
        self.takings.save(id, taking.clone()).await?;

        tracing::info!(taking_no = %taking.taking_no, difference = %difference, operator = %operator.operator_name, "stock taking adjusted");
        self.refresh_plan(taking.plan_id).await?;
        Ok(taking)
    }

    pub async fn cancel_taking(&self, id: i64, operator: &OperatorContext) -> AppResult<StockTaking> {
        let _guard = self.takings.guard(id)?;
        let mut taking = self.takings.get(id).await?;
        require_cancellable(&taking.taking_no, taking.status)?;

        taking.status = StockTakingStatus::Cancelled;
        taking.updated_at = Utc::now();
        self.takings.save(id, taking.clone()).await?;

        tracing::info!(taking_no = %taking.taking_no, operator = %operator.operator_name, "stock taking cancelled");
        self.refresh_plan(taking.plan_id).await?;
        Ok(taking)
    }
}
