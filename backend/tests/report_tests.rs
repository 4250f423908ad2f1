//! Report and warning tests
//!
//! Tests for read-only projections including:
//! - Inventory report rows, stock states and category filters
//! - Low-stock and expiry warnings
//! - In/out totals, turnover and daily trend
//! - Daily snapshots

mod common;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

use common::*;
use shared::{
    CompleteOutboundItemRequest, CreateStockMoveRequest, InOutQuery, InventoryReportQuery,
    SnapshotQuery, StockMoveItemRequest, StockMoveType, StockState, WarningType,
};
use wms_ledger_backend::error::AppError;
use wms_ledger_backend::Services;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn in_out(start: NaiveDate, end: NaiveDate) -> InOutQuery {
    InOutQuery {
        warehouse_id: Some(1),
        goods_id: None,
        start_date: start,
        end_date: end,
    }
}

/// Receive a batch of goods 2 expiring `days` from today
async fn batch_in(services: &Services, location_id: i64, batch_no: &str, quantity: &str, days: i64) {
    let mut line = inbound_line(location_id, 2, quantity);
    line.batch_no = Some(batch_no.to_string());
    line.expire_date = Some(today() + Duration::days(days));
    receive_all(services, inbound_request(vec![line])).await;
}

/// Ship `quantity` of goods 1 from `location_id`
async fn ship(services: &Services, location_id: i64, quantity: &str) {
    let op = operator();
    let order = audited_outbound(services, vec![outbound_line(location_id, quantity)]).await;
    services.outbound.start_picking(order.id, &op).await.unwrap();
    services
        .outbound
        .complete_item(
            order.id,
            CompleteOutboundItemRequest {
                item_id: order.items[0].id,
                picked_quantity: dec(quantity),
            },
            &op,
        )
        .await
        .unwrap();
    services.outbound.ship(order.id, &op).await.unwrap();
}

// ============================================================================
// Inventory Report Tests
// ============================================================================

#[cfg(test)]
mod inventory_report_tests {
    use super::*;

    #[tokio::test]
    async fn test_rows_carry_goods_and_state() {
        let services = services();
        stock_in(&services, 101, "4").await;
        stock_in(&services, 102, "20").await;

        let report = services
            .reporting
            .inventory_report(&InventoryReportQuery::default())
            .await
            .unwrap();
        assert_eq!(report.total, 2);
        let low = report.list.iter().find(|r| r.key.location_id == 101).unwrap();
        assert_eq!(low.sku.as_deref(), Some("SKU-0001"));
        assert_eq!(low.safety_stock, dec("10"));
        assert_eq!(low.stock_state, StockState::Low);
        let normal = report.list.iter().find(|r| r.key.location_id == 102).unwrap();
        assert_eq!(normal.stock_state, StockState::Normal);

        let only_low = services
            .reporting
            .inventory_report(&InventoryReportQuery {
                stock_state: Some(StockState::Low),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(only_low.total, 1);
    }

    /// Fully reserved stock counts as out of stock
    #[tokio::test]
    async fn test_summary_counts_states() {
        let services = services();
        let op = operator();
        stock_in(&services, 101, "4").await;
        stock_in(&services, 102, "20").await;
        stock_in(&services, 103, "5").await;
        let order = audited_outbound(&services, vec![outbound_line(103, "5")]).await;
        services.outbound.start_picking(order.id, &op).await.unwrap();

        let summary = services
            .reporting
            .inventory_summary(&InventoryReportQuery::default())
            .await
            .unwrap();
        assert_eq!(summary.balance_count, 3);
        assert_eq!(summary.goods_count, 1);
        assert_eq!(summary.total_quantity, dec("29"));
        assert_eq!(summary.locked_quantity, dec("5"));
        assert_eq!(summary.available_quantity, dec("24"));
        assert_eq!(summary.low_stock_count, 1);
        assert_eq!(summary.out_of_stock_count, 1);
    }

    /// A parent category includes goods of its sub-categories
    #[tokio::test]
    async fn test_category_filter_includes_children() {
        let services = services();
        stock_in(&services, 101, "4").await;
        batch_in(&services, 102, "B1", "3", 100).await;

        let parent = services
            .reporting
            .inventory_report(&InventoryReportQuery {
                category_id: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(parent.total, 2);

        let child = services
            .reporting
            .inventory_report(&InventoryReportQuery {
                category_id: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(child.total, 1);
        assert_eq!(child.list[0].key.goods_id, 2);
    }
}

// ============================================================================
// Warning Tests
// ============================================================================

#[cfg(test)]
mod warning_tests {
    use super::*;

    #[tokio::test]
    async fn test_low_stock_per_balance() {
        let services = services();
        stock_in(&services, 101, "10").await;
        stock_in(&services, 102, "11").await;

        let warnings = services.reporting.low_stock(Some(1)).await.unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].warning_type, WarningType::LowStock);
        assert_eq!(warnings[0].location_id, Some(101));
        assert_eq!(warnings[0].safety_stock, Some(dec("10")));
    }

    #[tokio::test]
    async fn test_expiring_and_expired_sorted_by_urgency() {
        let services = services();
        batch_in(&services, 101, "LATER", "20", 20).await;
        batch_in(&services, 101, "GONE", "20", -3).await;
        batch_in(&services, 101, "FAR", "20", 365).await;

        let warnings = services
            .reporting
            .expiring(Some(1), 30, today())
            .await
            .unwrap();
        let seen: Vec<(Option<String>, WarningType, Option<i64>)> = warnings
            .into_iter()
            .map(|w| (w.batch_no, w.warning_type, w.days_to_expiry))
            .collect();
        assert_eq!(
            seen,
            vec![
                (Some("GONE".to_string()), WarningType::Expired, Some(-3)),
                (Some("LATER".to_string()), WarningType::Expiring, Some(20)),
            ]
        );
    }

    /// Combined warnings use the configured expiry window
    #[tokio::test]
    async fn test_warnings_combine_both_kinds() {
        let services = services();
        stock_in(&services, 101, "2").await;
        batch_in(&services, 102, "SOON", "50", 3).await;
        batch_in(&services, 102, "LATER", "50", 20).await;

        let warnings = services.reporting.warnings(None).await.unwrap();
        let kinds: Vec<WarningType> = warnings.iter().map(|w| w.warning_type).collect();
        assert_eq!(kinds, vec![WarningType::LowStock, WarningType::Expiring]);
    }
}

// ============================================================================
// In/Out Tests
// ============================================================================

#[cfg(test)]
mod in_out_tests {
    use super::*;

    /// Internal moves are neither inbound nor outbound
    #[tokio::test]
    async fn test_in_out_ignores_moves_and_locks() {
        let services = services();
        let op = operator();
        stock_in(&services, 101, "10").await;
        ship(&services, 101, "4").await;
        let stock_move = services
            .stock_move
            .create(
                CreateStockMoveRequest {
                    move_type: StockMoveType::Location,
                    warehouse_id: 1,
                    move_reason: None,
                    remark: None,
                    items: vec![StockMoveItemRequest {
                        goods_id: 1,
                        batch_no: None,
                        serial_no: None,
                        from_location_id: 101,
                        to_location_id: 102,
                        quantity: dec("2"),
                        remark: None,
                    }],
                },
                &op,
            )
            .await
            .unwrap();
        services.stock_move.execute(stock_move.id, &op).await.unwrap();
        services.stock_move.complete(stock_move.id, &op).await.unwrap();

        let rows = services
            .reporting
            .in_out_report(&in_out(today(), today()))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].goods_id, 1);
        assert_eq!(rows[0].in_quantity, dec("10"));
        assert_eq!(rows[0].out_quantity, dec("4"));
        assert_eq!(rows[0].net_quantity, dec("6"));

        let summary = services
            .reporting
            .in_out_summary(&in_out(today(), today()))
            .await
            .unwrap();
        assert_eq!(summary.in_count, 1);
        assert_eq!(summary.out_count, 1);
        assert_eq!(summary.turnover_rate, dec("40"));
    }

    #[tokio::test]
    async fn test_nothing_in_means_zero_turnover() {
        let services = services();
        let summary = services
            .reporting
            .in_out_summary(&in_out(today(), today()))
            .await
            .unwrap();
        assert_eq!(summary.turnover_rate, Decimal::ZERO);
        assert_eq!(summary.in_count, 0);
    }

    #[tokio::test]
    async fn test_trend_has_a_point_per_day() {
        let services = services();
        stock_in(&services, 101, "10").await;
        ship(&services, 101, "3").await;

        let start = today() - Duration::days(2);
        let points = services
            .reporting
            .trend(&in_out(start, today()))
            .await
            .unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].date, start);
        assert_eq!(points[0].in_quantity, Decimal::ZERO);
        assert_eq!(points[2].in_quantity, dec("10"));
        assert_eq!(points[2].out_quantity, dec("3"));
    }

    /// A year is the longest range a report will walk day by day
    #[tokio::test]
    async fn test_trend_range_is_capped() {
        let services = services();
        let year = services
            .reporting
            .trend(&in_out(today() - Duration::days(365), today()))
            .await
            .unwrap();
        assert_eq!(year.len(), 366);

        let too_long = services
            .reporting
            .trend(&in_out(today() - Duration::days(400), today()))
            .await;
        assert!(matches!(
            too_long,
            Err(AppError::Validation { ref field, .. }) if field == "startDate"
        ));

        let unbounded = services
            .reporting
            .trend(&in_out(NaiveDate::MIN, NaiveDate::MAX))
            .await;
        assert!(matches!(unbounded, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_reversed_range_is_rejected() {
        let services = services();
        let result = services
            .reporting
            .in_out_report(&in_out(today(), today() - Duration::days(1)))
            .await;
        assert!(matches!(
            result,
            Err(AppError::Validation { ref field, .. }) if field == "startDate"
        ));
    }
}

// ============================================================================
// Snapshot Tests
// ============================================================================

#[cfg(test)]
mod snapshot_tests {
    use super::*;

    /// Re-taking a day's snapshot replaces it
    #[tokio::test]
    async fn test_snapshot_aggregates_and_replaces() {
        let services = services();
        stock_in(&services, 101, "4").await;
        stock_in(&services, 102, "6").await;
        let day = date(2024, 3, 1);

        assert_eq!(services.reporting.take_snapshot(day).await.unwrap(), 1);
        stock_in(&services, 103, "5").await;
        assert_eq!(services.reporting.take_snapshot(day).await.unwrap(), 1);

        let rows = services
            .reporting
            .snapshots(&SnapshotQuery {
                warehouse_id: Some(1),
                goods_id: None,
                start_date: day,
                end_date: day,
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, dec("15"));
        assert_eq!(rows[0].goods_id, 1);
    }

    #[tokio::test]
    async fn test_snapshots_sorted_by_date() {
        let services = services();
        stock_in(&services, 101, "4").await;
        services.reporting.take_snapshot(date(2024, 3, 2)).await.unwrap();
        services.reporting.take_snapshot(date(2024, 3, 1)).await.unwrap();

        let rows = services
            .reporting
            .snapshots(&SnapshotQuery {
                warehouse_id: None,
                goods_id: None,
                start_date: date(2024, 3, 1),
                end_date: date(2024, 3, 31),
            })
            .await
            .unwrap();
        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.snapshot_date).collect();
        assert_eq!(dates, vec![date(2024, 3, 1), date(2024, 3, 2)]);
    }
}
