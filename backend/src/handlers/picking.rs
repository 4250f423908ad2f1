//! HTTP handlers for picking waves and picking tasks

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use shared::{
    AssignPickerRequest, CreateWaveRequest, GenerateWavesRequest, MarkExceptionRequest,
    PageResult, PickRequest, PickingTask, PickingTaskPageQuery, PickingWave,
    PickingWavePageQuery, ResolveExceptionRequest,
};

use crate::error::AppResult;
use crate::middleware::Operator;
use crate::AppState;

// ============================================================================
// Waves
// ============================================================================

pub async fn create_wave(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Json(request): Json<CreateWaveRequest>,
) -> AppResult<(StatusCode, Json<PickingWave>)> {
    let wave = state.services.picking.create_wave(request, &operator).await?;
    Ok((StatusCode::CREATED, Json(wave)))
}

/// Group every audited, unwaved outbound of a warehouse into waves
pub async fn generate_waves(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Json(request): Json<GenerateWavesRequest>,
) -> AppResult<Json<Vec<PickingWave>>> {
    Ok(Json(
        state
            .services
            .picking
            .generate_waves(request, &operator)
            .await?,
    ))
}

pub async fn get_wave(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<PickingWave>> {
    Ok(Json(state.services.picking.get_wave(id).await?))
}

pub async fn page_waves(
    State(state): State<AppState>,
    Query(query): Query<PickingWavePageQuery>,
) -> AppResult<Json<PageResult<PickingWave>>> {
    Ok(Json(state.services.picking.wave_page(&query).await?))
}

pub async fn wave_tasks(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<PickingTask>>> {
    Ok(Json(state.services.picking.wave_tasks(id).await?))
}

pub async fn assign_wave(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
    Json(request): Json<AssignPickerRequest>,
) -> AppResult<Json<PickingWave>> {
    Ok(Json(
        state
            .services
            .picking
            .assign_wave(id, request, &operator)
            .await?,
    ))
}

pub async fn start_wave(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<PickingWave>> {
    Ok(Json(state.services.picking.start_wave(id, &operator).await?))
}

pub async fn cancel_wave(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<PickingWave>> {
    Ok(Json(state.services.picking.cancel_wave(id, &operator).await?))
}

// ============================================================================
// Tasks
// ============================================================================

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<PickingTask>> {
    Ok(Json(state.services.picking.get_task(id).await?))
}

pub async fn page_tasks(
    State(state): State<AppState>,
    Query(query): Query<PickingTaskPageQuery>,
) -> AppResult<Json<PageResult<PickingTask>>> {
    Ok(Json(state.services.picking.task_page(&query).await?))
}

pub async fn assign_task(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
    Json(request): Json<AssignPickerRequest>,
) -> AppResult<Json<PickingTask>> {
    Ok(Json(
        state
            .services
            .picking
            .assign_task(id, request, &operator)
            .await?,
    ))
}

pub async fn start_task(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<PickingTask>> {
    Ok(Json(state.services.picking.start_task(id, &operator).await?))
}

pub async fn pick(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
    Json(request): Json<PickRequest>,
) -> AppResult<Json<PickingTask>> {
    Ok(Json(
        state.services.picking.pick(id, request, &operator).await?,
    ))
}

pub async fn mark_exception(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
    Json(request): Json<MarkExceptionRequest>,
) -> AppResult<Json<PickingTask>> {
    Ok(Json(
        state
            .services
            .picking
            .mark_exception(id, request, &operator)
            .await?,
    ))
}

pub async fn resolve_exception(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
    Json(request): Json<ResolveExceptionRequest>,
) -> AppResult<Json<PickingTask>> {
    Ok(Json(
        state
            .services
            .picking
            .resolve_exception(id, request, &operator)
            .await?,
    ))
}

pub async fn cancel_task(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<PickingTask>> {
    Ok(Json(state.services.picking.cancel_task(id, &operator).await?))
}
