//! HTTP handlers for outbound orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use shared::{
    CompleteOutboundItemRequest, CreateOutboundRequest, OutboundOrder, OutboundPageQuery,
    PageResult, Reservation,
};

use crate::error::AppResult;
use crate::middleware::Operator;
use crate::AppState;

pub async fn create_outbound(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Json(request): Json<CreateOutboundRequest>,
) -> AppResult<(StatusCode, Json<OutboundOrder>)> {
    let order = state.services.outbound.create(request, &operator).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn update_outbound(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
    Json(request): Json<CreateOutboundRequest>,
) -> AppResult<Json<OutboundOrder>> {
    Ok(Json(
        state.services.outbound.update(id, request, &operator).await?,
    ))
}

pub async fn delete_outbound(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.services.outbound.delete(id, &operator).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_outbound(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<OutboundOrder>> {
    Ok(Json(state.services.outbound.get(id).await?))
}

pub async fn page_outbounds(
    State(state): State<AppState>,
    Query(query): Query<OutboundPageQuery>,
) -> AppResult<Json<PageResult<OutboundOrder>>> {
    Ok(Json(state.services.outbound.page(&query).await?))
}

/// Reservations currently held or settled for an outbound
pub async fn outbound_reservations(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Reservation>>> {
    Ok(Json(state.services.outbound.reservations_of(id).await?))
}

pub async fn audit_outbound(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<OutboundOrder>> {
    Ok(Json(state.services.outbound.audit(id, &operator).await?))
}

/// Reserve every line and move to picking
pub async fn start_picking(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<OutboundOrder>> {
    Ok(Json(
        state.services.outbound.start_picking(id, &operator).await?,
    ))
}

pub async fn complete_item(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
    Json(request): Json<CompleteOutboundItemRequest>,
) -> AppResult<Json<OutboundOrder>> {
    Ok(Json(
        state
            .services
            .outbound
            .complete_item(id, request, &operator)
            .await?,
    ))
}

pub async fn ship_outbound(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<OutboundOrder>> {
    Ok(Json(state.services.outbound.ship(id, &operator).await?))
}

/// Cancel the outbound together with its open picking tasks
pub async fn cancel_outbound(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<OutboundOrder>> {
    Ok(Json(
        state
            .services
            .picking
            .cancel_outbound(id, &operator)
            .await?,
    ))
}
