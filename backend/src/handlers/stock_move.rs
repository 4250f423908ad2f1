//! HTTP handlers for stock moves

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use shared::{CreateStockMoveRequest, PageResult, StockMove, StockMovePageQuery};

use crate::error::AppResult;
use crate::middleware::Operator;
use crate::AppState;

pub async fn create_stock_move(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Json(request): Json<CreateStockMoveRequest>,
) -> AppResult<(StatusCode, Json<StockMove>)> {
    let stock_move = state.services.stock_move.create(request, &operator).await?;
    Ok((StatusCode::CREATED, Json(stock_move)))
}

pub async fn update_stock_move(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
    Json(request): Json<CreateStockMoveRequest>,
) -> AppResult<Json<StockMove>> {
    Ok(Json(
        state
            .services
            .stock_move
            .update(id, request, &operator)
            .await?,
    ))
}

pub async fn delete_stock_move(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.services.stock_move.delete(id, &operator).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_stock_move(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<StockMove>> {
    Ok(Json(state.services.stock_move.get(id).await?))
}

pub async fn page_stock_moves(
    State(state): State<AppState>,
    Query(query): Query<StockMovePageQuery>,
) -> AppResult<Json<PageResult<StockMove>>> {
    Ok(Json(state.services.stock_move.page(&query).await?))
}

pub async fn execute_stock_move(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<StockMove>> {
    Ok(Json(
        state.services.stock_move.execute(id, &operator).await?,
    ))
}

pub async fn complete_stock_move(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<StockMove>> {
    Ok(Json(
        state.services.stock_move.complete(id, &operator).await?,
    ))
}

pub async fn cancel_stock_move(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<StockMove>> {
    Ok(Json(state.services.stock_move.cancel(id, &operator).await?))
}
