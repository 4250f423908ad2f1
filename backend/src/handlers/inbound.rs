//! HTTP handlers for inbound orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use shared::{
    CompleteInboundRequest, CreateInboundRequest, InboundOrder, InboundPageQuery, PageResult,
    ReceiveItemRequest,
};

use crate::error::AppResult;
use crate::middleware::Operator;
use crate::AppState;

pub async fn create_inbound(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Json(request): Json<CreateInboundRequest>,
) -> AppResult<(StatusCode, Json<InboundOrder>)> {
    let order = state.services.inbound.create(request, &operator).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn update_inbound(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
    Json(request): Json<CreateInboundRequest>,
) -> AppResult<Json<InboundOrder>> {
    Ok(Json(state.services.inbound.update(id, request, &operator).await?))
}

pub async fn delete_inbound(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.services.inbound.delete(id, &operator).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_inbound(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<InboundOrder>> {
    Ok(Json(state.services.inbound.get(id).await?))
}

pub async fn page_inbounds(
    State(state): State<AppState>,
    Query(query): Query<InboundPageQuery>,
) -> AppResult<Json<PageResult<InboundOrder>>> {
    Ok(Json(state.services.inbound.page(&query).await?))
}

pub async fn audit_inbound(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<InboundOrder>> {
    Ok(Json(state.services.inbound.audit(id, &operator).await?))
}

pub async fn start_receiving(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<InboundOrder>> {
    Ok(Json(
        state.services.inbound.start_receiving(id, &operator).await?,
    ))
}

/// Record receipt figures for one line
pub async fn receive_item(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
    Json(request): Json<ReceiveItemRequest>,
) -> AppResult<Json<InboundOrder>> {
    Ok(Json(
        state
            .services
            .inbound
            .receive_item(id, request, &operator)
            .await?,
    ))
}

/// Post received quantities to the ledger; the body is optional
pub async fn complete_inbound(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
    request: Option<Json<CompleteInboundRequest>>,
) -> AppResult<Json<InboundOrder>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(
        state.services.inbound.complete(id, request, &operator).await?,
    ))
}

pub async fn cancel_inbound(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<i64>,
) -> AppResult<Json<InboundOrder>> {
    Ok(Json(state.services.inbound.cancel(id, &operator).await?))
}
