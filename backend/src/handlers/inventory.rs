//! HTTP handlers for balance queries, status changes and the movement log

use axum::{
    extract::{Query, State},
    Json,
};

use shared::{
    ChangeStatusRequest, MovementEntry, MovementPageQuery, PageResult, StockBalance, StockKey,
    StockPageQuery,
};

use crate::error::AppResult;
use crate::middleware::Operator;
use crate::services::inventory::LedgerCheck;
use crate::AppState;

/// Page through ledger balances
pub async fn page_balances(
    State(state): State<AppState>,
    Query(query): Query<StockPageQuery>,
) -> AppResult<Json<PageResult<StockBalance>>> {
    Ok(Json(state.services.inventory.page(&query).await?))
}

/// One balance; an unknown key reads as zero
pub async fn get_balance(
    State(state): State<AppState>,
    Query(key): Query<StockKey>,
) -> AppResult<Json<StockBalance>> {
    Ok(Json(state.services.inventory.get(&key).await?))
}

pub async fn change_status(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Json(request): Json<ChangeStatusRequest>,
) -> AppResult<Json<StockBalance>> {
    Ok(Json(
        state
            .services
            .inventory
            .change_status(request, &operator)
            .await?,
    ))
}

/// Page through the movement log
pub async fn page_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementPageQuery>,
) -> AppResult<Json<PageResult<MovementEntry>>> {
    Ok(Json(state.services.inventory.movements(&query).await?))
}

/// Compare a stored balance with its replayed movement log
pub async fn verify_balance(
    State(state): State<AppState>,
    Query(key): Query<StockKey>,
) -> AppResult<Json<LedgerCheck>> {
    Ok(Json(state.services.inventory.verify(&key).await?))
}
