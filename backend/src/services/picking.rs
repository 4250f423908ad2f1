//! Picking waves and picking tasks
//!
//! A wave groups audited outbounds; creating it generates one task per
//! outbound line. Starting the wave starts picking on every member outbound,
//! which is where stock gets reserved. Task results are written back onto the
//! outbound lines. An exception on one task never blocks its siblings; the
//! wave completes once every task is completed, in exception or cancelled.

use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use shared::{
    require_any_status, require_cancellable, require_status, validate_pick, AssignPickerRequest,
    CreateWaveRequest, DocumentStatus, GenerateWavesRequest, MarkExceptionRequest,
    OperatorContext, OutboundOrder, OutboundStatus, PageResult, PickRequest, PickingTask,
    PickingTaskPageQuery, PickingTaskStatus, PickingWave, PickingWavePageQuery,
    ResolveExceptionRequest, WaveStatus, WaveType,
};

use super::checks::{partial_failure, require_warehouse};
use super::outbound::OutboundService;
use super::repository::{DocumentNumbers, Repository};
use crate::config::PickingConfig;
use crate::error::{AppError, AppResult, ValidateField};
use crate::external::MasterData;

pub struct PickingService {
    waves: Repository<PickingWave>,
    tasks: Repository<PickingTask>,
    numbers: Arc<DocumentNumbers>,
    outbounds: Arc<OutboundService>,
    master: Arc<dyn MasterData>,
    sizes: PickingConfig,
}

impl PickingService {
    pub fn new(
        outbounds: Arc<OutboundService>,
        master: Arc<dyn MasterData>,
        numbers: Arc<DocumentNumbers>,
        sizes: PickingConfig,
    ) -> Self {
        Self {
            waves: Repository::new("Picking wave"),
            tasks: Repository::new("Picking task"),
            numbers,
            outbounds,
            master,
            sizes,
        }
    }

    fn wave_size(&self, wave_type: WaveType) -> usize {
        match wave_type {
            WaveType::Batch => self.sizes.batch_wave_size,
            WaveType::Zone => self.sizes.zone_wave_size,
            WaveType::Single => self.sizes.single_wave_size,
        }
    }

    // ========================================================================
    // Waves
    // ========================================================================

    pub async fn create_wave(
        &self,
        request: CreateWaveRequest,
        operator: &OperatorContext,
    ) -> AppResult<PickingWave> {
        request.validate()?;
        require_warehouse(self.master.as_ref(), request.warehouse_id).await?;
        self.build_wave(
            request.warehouse_id,
            request.wave_type,
            request.priority,
            &request.outbound_ids,
            request.remark,
            operator,
        )
        .await
    }

    async fn build_wave(
        &self,
        warehouse_id: i64,
        wave_type: WaveType,
        priority: i32,
        outbound_ids: &[i64],
        remark: Option<String>,
        operator: &OperatorContext,
    ) -> AppResult<PickingWave> {
        let _guards = self.outbounds.guard_all(outbound_ids)?;
        let wave_id = self.waves.next_id();
        let wave_no = self.numbers.next_dashed("WAVE");
        let orders = self
            .outbounds
            .attach_wave(outbound_ids, warehouse_id, wave_id)
            .await?;

        let now = Utc::now();
        let mut tasks = self.tasks_for(wave_id, &wave_no, &orders);
        tasks.sort_by_key(|t| (t.location_id, t.goods_id, t.outbound_id));
        for (idx, task) in tasks.iter_mut().enumerate() {
            task.sort_order = idx as u32 + 1;
        }

        let wave = PickingWave {
            id: wave_id,
            wave_no,
            warehouse_id,
            wave_type,
            status: WaveStatus::initial(),
            outbound_ids: orders.iter().map(|o| o.id).collect(),
            order_count: orders.len() as u32,
            item_count: tasks.len() as u32,
            total_quantity: tasks.iter().map(|t| t.plan_quantity).sum(),
            priority,
            picker_id: None,
            picker_name: None,
            start_time: None,
            end_time: None,
            remark,
            creator: operator.operator_name.clone(),
            created_at: now,
            updated_at: now,
        };
        for task in tasks {
            self.tasks.insert(task.id, task).await;
        }
        self.waves.insert(wave.id, wave.clone()).await;

        tracing::info!(
            wave_no = %wave.wave_no,
            orders = wave.order_count,
            tasks = wave.item_count,
            operator = %operator.operator_name,
            "picking wave created"
        );
        Ok(wave)
    }

    fn tasks_for(&self, wave_id: i64, wave_no: &str, orders: &[OutboundOrder]) -> Vec<PickingTask> {
        let now = Utc::now();
        orders
            .iter()
            .flat_map(|order| {
                order.items.iter().map(move |item| (order, item))
            })
            .map(|(order, item)| PickingTask {
                id: self.tasks.next_id(),
                task_no: self.numbers.next("TASK"),
                wave_id: Some(wave_id),
                wave_no: Some(wave_no.to_string()),
                outbound_id: order.id,
                outbound_no: order.outbound_no.clone(),
                outbound_item_id: item.id,
                warehouse_id: order.warehouse_id,
                goods_id: item.goods_id,
                batch_no: item.batch_no.clone(),
                location_id: item.location_id,
                plan_quantity: item.plan_quantity,
                actual_quantity: None,
                sort_order: 0,
                picker_id: None,
                picker_name: None,
                picking_time: None,
                status: PickingTaskStatus::initial(),
                exception_type: None,
                exception_remark: None,
                remark: None,
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    /// Group every audited, unwaved outbound of a warehouse into new waves
    pub async fn generate_waves(
        &self,
        request: GenerateWavesRequest,
        operator: &OperatorContext,
    ) -> AppResult<Vec<PickingWave>> {
        require_warehouse(self.master.as_ref(), request.warehouse_id).await?;
        let mut candidates = self.outbounds.waveable(request.warehouse_id).await;
        // Earliest shipment first; orders without a date go last
        candidates.sort_by_key(|o| (o.expected_shipment_time.is_none(), o.expected_shipment_time, o.id));

        let size = self.wave_size(request.wave_type).max(1);
        let mut waves = Vec::new();
        for chunk in candidates.chunks(size) {
            let ids: Vec<i64> = chunk.iter().map(|o| o.id).collect();
            match self
                .build_wave(request.warehouse_id, request.wave_type, 0, &ids, None, operator)
                .await
            {
                Ok(wave) => waves.push(wave),
                Err(err) => {
                    tracing::warn!(outbounds = ?ids, "skipping wave during generation: {}", err);
                }
            }
        }
        Ok(waves)
    }

    pub async fn get_wave(&self, id: i64) -> AppResult<PickingWave> {
        self.waves.get(id).await
    }

    pub async fn wave_page(&self, query: &PickingWavePageQuery) -> AppResult<PageResult<PickingWave>> {
        let waves = self
            .waves
            .list(|w| {
                query
                    .wave_no
                    .as_deref()
                    .map_or(true, |no| w.wave_no.contains(no))
                    && query.wave_type.map_or(true, |t| t == w.wave_type)
                    && query.status.map_or(true, |s| s == w.status)
                    && query.warehouse_id.map_or(true, |id| id == w.warehouse_id)
                    && query.picker_id.map_or(true, |id| Some(id) == w.picker_id)
            })
            .await;
        Ok(query.page().slice(waves))
    }

    pub async fn wave_tasks(&self, wave_id: i64) -> AppResult<Vec<PickingTask>> {
        self.waves.get(wave_id).await?;
        let mut tasks = self.tasks.list(|t| t.wave_id == Some(wave_id)).await;
        tasks.sort_by_key(|t| t.sort_order);
        Ok(tasks)
    }

    async fn picker_name(&self, request: &AssignPickerRequest) -> AppResult<String> {
        if let Some(name) = request.picker_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return Ok(name.to_string());
        }
        self.master
            .operator_name(request.picker_id)
            .await?
            .ok_or_else(|| {
                AppError::validation(
                    "pickerId",
                    format!("Picker {} is not a known operator", request.picker_id),
                )
            })
    }

    pub async fn assign_wave(
        &self,
        id: i64,
        request: AssignPickerRequest,
        operator: &OperatorContext,
    ) -> AppResult<PickingWave> {
        let _guard = self.waves.guard(id)?;
        let mut wave = self.waves.get(id).await?;
        require_any_status(
            &wave.wave_no,
            wave.status,
            &[WaveStatus::PendingAssign, WaveStatus::Assigned],
        )?;
        let picker_name = self.picker_name(&request).await?;

        for mut task in self
            .tasks
            .list(|t| t.wave_id == Some(id) && t.status == PickingTaskStatus::Pending)
            .await
        {
            task.picker_id = Some(request.picker_id);
            task.picker_name = Some(picker_name.clone());
            task.updated_at = Utc::now();
            self.tasks.save(task.id, task).await?;
        }

        wave.status = WaveStatus::Assigned;
        wave.picker_id = Some(request.picker_id);
        wave.picker_name = Some(picker_name);
        wave.updated_at = Utc::now();
        self.waves.save(id, wave.clone()).await?;

        tracing::info!(wave_no = %wave.wave_no, picker = ?wave.picker_name, operator = %operator.operator_name, "picking wave assigned");
        Ok(wave)
    }

    /// Start picking on every member outbound.
    ///
    /// Outbounds already picking are skipped, so a wave whose start partly
    /// failed can be started again once stock is available.
    pub async fn start_wave(&self, id: i64, operator: &OperatorContext) -> AppResult<PickingWave> {
        let _guard = self.waves.guard(id)?;
        let mut wave = self.waves.get(id).await?;
        require_status(&wave.wave_no, wave.status, WaveStatus::Assigned)?;

        let mut failures = Vec::new();
        for &outbound_id in &wave.outbound_ids {
            let order = self.outbounds.get(outbound_id).await?;
            if order.status != OutboundStatus::Audited {
                continue;
            }
            if let Err(err) = self.outbounds.start_picking(outbound_id, operator).await {
                failures.push(err.into_line_failure(outbound_id));
            }
        }
        if !failures.is_empty() {
            return Err(partial_failure(&wave.wave_no, "start", failures));
        }

        let now = Utc::now();
        wave.status = WaveStatus::Picking;
        wave.start_time = Some(now);
        wave.updated_at = now;
        self.waves.save(id, wave.clone()).await?;

        tracing::info!(wave_no = %wave.wave_no, operator = %operator.operator_name, "picking wave started");
        Ok(wave)
    }

    /// Cancel open tasks and free the member outbounds for another wave
    pub async fn cancel_wave(&self, id: i64, operator: &OperatorContext) -> AppResult<PickingWave> {
        let _guard = self.waves.guard(id)?;
        let mut wave = self.waves.get(id).await?;
        require_cancellable(&wave.wave_no, wave.status)?;

        let open = self
            .tasks
            .list(|t| t.wave_id == Some(id) && !t.status.is_settled())
            .await;
        self.cancel_open_tasks(open).await?;
        for &outbound_id in &wave.outbound_ids {
            self.outbounds.detach_wave(outbound_id, id).await?;
        }

        wave.status = WaveStatus::Cancelled;
        wave.updated_at = Utc::now();
        self.waves.save(id, wave.clone()).await?;

        tracing::info!(wave_no = %wave.wave_no, operator = %operator.operator_name, "picking wave cancelled");
        Ok(wave)
    }

    /// Complete a picking wave once none of its tasks is still open
    async fn refresh_wave(&self, wave_id: Option<i64>) -> AppResult<()> {
        let Some(wave_id) = wave_id else {
            return Ok(());
        };
        let _guard = self.waves.wait_guard(wave_id).await;
        let mut wave = self.waves.get(wave_id).await?;
        if wave.status != WaveStatus::Picking {
            return Ok(());
        }
        let open = self
            .tasks
            .list(|t| t.wave_id == Some(wave_id) && !t.status.is_settled())
            .await;
        if !open.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        wave.status = WaveStatus::Completed;
        wave.end_time = Some(now);
        wave.updated_at = now;
        self.waves.save(wave_id, wave.clone()).await?;
        tracing::info!(wave_no = %wave.wave_no, "picking wave completed");
        Ok(())
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    pub async fn get_task(&self, id: i64) -> AppResult<PickingTask> {
        self.tasks.get(id).await
    }

    pub async fn task_page(&self, query: &PickingTaskPageQuery) -> AppResult<PageResult<PickingTask>> {
        let tasks = self
            .tasks
            .list(|t| {
                query
                    .task_no
                    .as_deref()
                    .map_or(true, |no| t.task_no.contains(no))
                    && query.wave_id.map_or(true, |id| Some(id) == t.wave_id)
                    && query.outbound_id.map_or(true, |id| id == t.outbound_id)
                    && query.picker_id.map_or(true, |id| Some(id) == t.picker_id)
                    && query.status.map_or(true, |s| s == t.status)
                    && query.warehouse_id.map_or(true, |id| id == t.warehouse_id)
            })
            .await;
        Ok(query.page().slice(tasks))
    }

    /// Set the picker on a pending task; the status does not change
    pub async fn assign_task(
        &self,
        id: i64,
        request: AssignPickerRequest,
        operator: &OperatorContext,
    ) -> AppResult<PickingTask> {
        let _guard = self.tasks.guard(id)?;
        let mut task = self.tasks.get(id).await?;
        require_status(&task.task_no, task.status, PickingTaskStatus::Pending)?;
        let picker_name = self.picker_name(&request).await?;

        task.picker_id = Some(request.picker_id);
        task.picker_name = Some(picker_name);
        task.updated_at = Utc::now();
        self.tasks.save(id, task.clone()).await?;

        tracing::info!(task_no = %task.task_no, picker = ?task.picker_name, operator = %operator.operator_name, "picking task assigned");
        Ok(task)
    }

    pub async fn start_task(&self, id: i64, operator: &OperatorContext) -> AppResult<PickingTask> {
        let _guard = self.tasks.guard(id)?;
        let mut task = self.tasks.get(id).await?;
        require_status(&task.task_no, task.status, PickingTaskStatus::Pending)?;
        let order = self.outbounds.get(task.outbound_id).await?;
        if order.status != OutboundStatus::Picking {
            return Err(AppError::InvalidState(format!(
                "outbound {} is {}; its stock is not reserved yet",
                order.outbound_no, order.status
            )));
        }

        if task.picker_id.is_none() {
            task.picker_id = Some(operator.operator_id);
            task.picker_name = Some(operator.operator_name.clone());
        }
        task.status = PickingTaskStatus::Picking;
        task.updated_at = Utc::now();
        self.tasks.save(id, task.clone()).await?;

        tracing::info!(task_no = %task.task_no, operator = %operator.operator_name, "picking task started");
        Ok(task)
    }

    /// Record the picked quantity; an exception type sends the task to `exception`
    pub async fn pick(
        &self,
        id: i64,
        request: PickRequest,
        operator: &OperatorContext,
    ) -> AppResult<PickingTask> {
        let _guard = self.tasks.guard(id)?;
        let mut task = self.tasks.get(id).await?;
        require_status(&task.task_no, task.status, PickingTaskStatus::Picking)?;
        validate_pick(request.actual_quantity, task.plan_quantity).on_field("actualQuantity")?;

        self.outbounds
            .record_pick(
                task.outbound_id,
                task.outbound_item_id,
                request.actual_quantity,
                request.exception_type,
                operator,
            )
            .await?;

        let now = Utc::now();
        task.actual_quantity = Some(request.actual_quantity);
        task.picking_time = Some(now);
        task.exception_type = request.exception_type;
        task.exception_remark = request.exception_remark;
        task.status = match request.exception_type {
            Some(_) => PickingTaskStatus::Exception,
            None => PickingTaskStatus::Completed,
        };
        task.updated_at = now;
        self.tasks.save(id, task.clone()).await?;

        if task.status == PickingTaskStatus::Exception {
            tracing::warn!(task_no = %task.task_no, exception = ?task.exception_type.map(|e| e.label()), "picking task raised an exception");
        } else {
            tracing::info!(task_no = %task.task_no, actual = %request.actual_quantity, operator = %operator.operator_name, "picking task completed");
        }
        self.refresh_wave(task.wave_id).await?;
        Ok(task)
    }

    pub async fn mark_exception(
        &self,
        id: i64,
        request: MarkExceptionRequest,
        operator: &OperatorContext,
    ) -> AppResult<PickingTask> {
        let _guard = self.tasks.guard(id)?;
        let mut task = self.tasks.get(id).await?;
        require_status(&task.task_no, task.status, PickingTaskStatus::Picking)?;

        let actual = task.actual_quantity.unwrap_or_default();
        self.outbounds
            .record_pick(
                task.outbound_id,
                task.outbound_item_id,
                actual,
                Some(request.exception_type),
                operator,
            )
            .await?;

        let now = Utc::now();
        task.actual_quantity = Some(actual);
        task.picking_time = Some(now);
        task.exception_type = Some(request.exception_type);
        task.exception_remark = request.exception_remark;
        task.status = PickingTaskStatus::Exception;
        task.updated_at = now;
        self.tasks.save(id, task.clone()).await?;

        tracing::warn!(
            task_no = %task.task_no,
            exception = request.exception_type.label(),
            operator = %operator.operator_name,
            "picking task marked as exception"
        );
        self.refresh_wave(task.wave_id).await?;
        Ok(task)
    }

    /// Manual resolution: confirm the quantity actually picked and complete the task
    pub async fn resolve_exception(
        &self,
        id: i64,
        request: ResolveExceptionRequest,
        operator: &OperatorContext,
    ) -> AppResult<PickingTask> {
        let _guard = self.tasks.guard(id)?;
        let mut task = self.tasks.get(id).await?;
        require_status(&task.task_no, task.status, PickingTaskStatus::Exception)?;
        validate_pick(request.actual_quantity, task.plan_quantity).on_field("actualQuantity")?;

        self.outbounds
            .resolve_exception(
                task.outbound_id,
                task.outbound_item_id,
                request.actual_quantity,
                operator,
            )
            .await?;

        task.actual_quantity = Some(request.actual_quantity);
        task.status = PickingTaskStatus::Completed;
        task.remark = request.remark;
        task.updated_at = Utc::now();
        self.tasks.save(id, task.clone()).await?;

        tracing::info!(task_no = %task.task_no, actual = %request.actual_quantity, operator = %operator.operator_name, "picking exception resolved");
        self.refresh_wave(task.wave_id).await?;
        Ok(task)
    }

    pub async fn cancel_task(&self, id: i64, operator: &OperatorContext) -> AppResult<PickingTask> {
        let _guard = self.tasks.guard(id)?;
        let mut task = self.tasks.get(id).await?;
        require_cancellable(&task.task_no, task.status)?;

        task.status = PickingTaskStatus::Cancelled;
        task.updated_at = Utc::now();
        self.tasks.save(id, task.clone()).await?;

        tracing::info!(task_no = %task.task_no, operator = %operator.operator_name, "picking task cancelled");
        self.refresh_wave(task.wave_id).await?;
        Ok(task)
    }

    /// Cancel an outbound together with its open picking tasks
    pub async fn cancel_outbound(
        &self,
        outbound_id: i64,
        operator: &OperatorContext,
    ) -> AppResult<OutboundOrder> {
        let order = self.outbounds.cancel(outbound_id, operator).await?;

        let open = self
            .tasks
            .list(|t| t.outbound_id == outbound_id && !t.status.is_settled())
            .await;
        self.cancel_open_tasks(open).await?;
        self.refresh_wave(order.wave_id).await?;
        Ok(order)
    }

    /// Cancel listed tasks, re-reading each under its guard so a task settled
    /// since the listing keeps its outcome
    async fn cancel_open_tasks(&self, listed: Vec<PickingTask>) -> AppResult<()> {
        for listed in listed {
            let _guard = self.tasks.guard(listed.id)?;
            let mut task = self.tasks.get(listed.id).await?;
            if task.status.is_settled() {
                continue;
            }
            task.status = PickingTaskStatus::Cancelled;
            task.updated_at = Utc::now();
            self.tasks.save(task.id, task).await?;
        }
        Ok(())
    }
}
