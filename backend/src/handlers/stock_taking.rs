//! HTTP handlers for stock-taking plans and stock-taking documents

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use shared::{
    CreateStockTakingPlanRequest, CreateStockTakingRequest, PageResult, StockTaking,
    StockTakingPageQuery, StockTakingPlan, StockTakingPlanPageQuery, SubmitCountRequest,
};

use crate::error::AppResult;
use crate::middleware::Operator;
use crate::AppState;

// ============================================================================
// Plans
// ============================================================================

pub async fn create_plan(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Json(request): Json<CreateStockTakingPlanRequest>,
) -> AppResult<(StatusCode, Json<StockTakingPlan>)> {
    let plan = state
        .services
        .stock_taking
        .create_plan(request, &operator)
        .await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn update_plan(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
    Json(request): Json<CreateStockTakingPlanRequest>,
) -> AppResult<Json<StockTakingPlan>> {
    Ok(Json(
        state
            .services
            .stock_taking
            .update_plan(id, request, &operator)
            .await?,
    ))
}

pub async fn delete_plan(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.services.stock_taking.delete_plan(id, &operator).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_plan(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<StockTakingPlan>> {
    Ok(Json(state.services.stock_taking.get_plan(id).await?))
}

pub async fn page_plans(
    State(state): State<AppState>,
    Query(query): Query<StockTakingPlanPageQuery>,
) -> AppResult<Json<PageResult<StockTakingPlan>>> {
    Ok(Json(state.services.stock_taking.plan_page(&query).await?))
}

pub async fn audit_plan(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<StockTakingPlan>> {
    Ok(Json(
        state.services.stock_taking.audit_plan(id, &operator).await?,
    ))
}

/// Generate one stock-taking document per balance in the plan's scope
pub async fn start_plan(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<StockTakingPlan>> {
    Ok(Json(
        state.services.stock_taking.start_plan(id, &operator).await?,
    ))
}

pub async fn complete_plan(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<StockTakingPlan>> {
    Ok(Json(
        state
            .services
            .stock_taking
            .complete_plan(id, &operator)
            .await?,
    ))
}

pub async fn cancel_plan(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<StockTakingPlan>> {
    Ok(Json(
        state.services.stock_taking.cancel_plan(id, &operator).await?,
    ))
}

// ============================================================================
// Stock takings
// ============================================================================

pub async fn create_taking(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Json(request): Json<CreateStockTakingRequest>,
) -> AppResult<(StatusCode, Json<StockTaking>)> {
    let taking = state
        .services
        .stock_taking
        .create_taking(request, &operator)
        .await?;
    Ok((StatusCode::CREATED, Json(taking)))
}

pub async fn get_taking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<StockTaking>> {
    Ok(Json(state.services.stock_taking.get_taking(id).await?))
}

pub async fn page_takings(
    State(state): State<AppState>,
    Query(query): Query<StockTakingPageQuery>,
) -> AppResult<Json<PageResult<StockTaking>>> {
    Ok(Json(state.services.stock_taking.taking_page(&query).await?))
}

/// Record the counted quantity
pub async fn submit_count(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
    Json(request): Json<SubmitCountRequest>,
) -> AppResult<Json<StockTaking>> {
    Ok(Json(
        state
            .services
            .stock_taking
            .submit(id, request, &operator)
            .await?,
    ))
}

pub async fn review_taking(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<StockTaking>> {
    Ok(Json(state.services.stock_taking.review(id, &operator).await?))
}

/// Post the counted difference to the ledger
pub async fn adjust_taking(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<StockTaking>> {
    Ok(Json(state.services.stock_taking.adjust(id, &operator).await?))
}

pub async fn cancel_taking(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<StockTaking>> {
    Ok(Json(
        state
            .services
            .stock_taking
            .cancel_taking(id, &operator)
            .await?,
    ))
}
