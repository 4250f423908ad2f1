//! HTTP handlers for read-only reports

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use shared::{
    InOutQuery, InOutReportRow, InOutSummary, InventoryReportQuery, InventoryReportRow,
    InventorySnapshot, InventorySummary, PageResult, SnapshotQuery, StockWarning, TrendPoint,
};

use crate::error::AppResult;
use crate::AppState;

/// Query parameters for warning lists
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningQuery {
    pub warehouse_id: Option<i64>,
    pub within_days: Option<i64>,
}

/// Query parameters for taking a snapshot on demand
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDateQuery {
    pub date: Option<NaiveDate>,
}

pub async fn inventory_report(
    State(state): State<AppState>,
    Query(query): Query<InventoryReportQuery>,
) -> AppResult<Json<PageResult<InventoryReportRow>>> {
    Ok(Json(state.services.reporting.inventory_report(&query).await?))
}

pub async fn inventory_summary(
    State(state): State<AppState>,
    Query(query): Query<InventoryReportQuery>,
) -> AppResult<Json<InventorySummary>> {
    Ok(Json(
        state.services.reporting.inventory_summary(&query).await?,
    ))
}

pub async fn in_out_report(
    State(state): State<AppState>,
    Query(query): Query<InOutQuery>,
) -> AppResult<Json<Vec<InOutReportRow>>> {
    Ok(Json(state.services.reporting.in_out_report(&query).await?))
}

pub async fn in_out_summary(
    State(state): State<AppState>,
    Query(query): Query<InOutQuery>,
) -> AppResult<Json<InOutSummary>> {
    Ok(Json(state.services.reporting.in_out_summary(&query).await?))
}

pub async fn trend(
    State(state): State<AppState>,
    Query(query): Query<InOutQuery>,
) -> AppResult<Json<Vec<TrendPoint>>> {
    Ok(Json(state.services.reporting.trend(&query).await?))
}

pub async fn low_stock(
    State(state): State<AppState>,
    Query(query): Query<WarningQuery>,
) -> AppResult<Json<Vec<StockWarning>>> {
    Ok(Json(
        state.services.reporting.low_stock(query.warehouse_id).await?,
    ))
}

/// Expiring batches; `withinDays` defaults to the configured threshold
pub async fn expiring(
    State(state): State<AppState>,
    Query(query): Query<WarningQuery>,
) -> AppResult<Json<Vec<StockWarning>>> {
    let within_days = query
        .within_days
        .unwrap_or(state.config.warning.expiring_within_days);
    Ok(Json(
        state
            .services
            .reporting
            .expiring(query.warehouse_id, within_days, Utc::now().date_naive())
            .await?,
    ))
}

pub async fn warnings(
    State(state): State<AppState>,
    Query(query): Query<WarningQuery>,
) -> AppResult<Json<Vec<StockWarning>>> {
    Ok(Json(
        state.services.reporting.warnings(query.warehouse_id).await?,
    ))
}

pub async fn snapshots(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> AppResult<Json<Vec<InventorySnapshot>>> {
    Ok(Json(state.services.reporting.snapshots(&query).await?))
}

/// Take a snapshot now; defaults to today
pub async fn take_snapshot(
    State(state): State<AppState>,
    Query(query): Query<SnapshotDateQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let rows = state.services.reporting.take_snapshot(date).await?;
    Ok(Json(serde_json::json!({ "date": date, "rows": rows })))
}
