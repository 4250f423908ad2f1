//! Stock move tests
//!
//! Tests for relocating stock between locations including:
//! - Locking the source on execute
//! - Posting both legs on completion
//! - Stock in transit after a failed target leg

mod common;

use std::sync::Arc;

use rust_decimal::Decimal;

use common::*;
use shared::{
    CreateStockMoveRequest, MovementPageQuery, OperationType, StockKey, StockMoveItemRequest,
    StockMovePageQuery, StockMoveStatus, StockMoveType,
};
use wms_ledger_backend::config::Config;
use wms_ledger_backend::error::AppError;

fn move_line(from: i64, to: i64, quantity: &str) -> StockMoveItemRequest {
    StockMoveItemRequest {
        goods_id: 1,
        batch_no: None,
        serial_no: None,
        from_location_id: from,
        to_location_id: to,
        quantity: dec(quantity),
        remark: None,
    }
}

fn move_request(items: Vec<StockMoveItemRequest>) -> CreateStockMoveRequest {
    CreateStockMoveRequest {
        move_type: StockMoveType::Location,
        warehouse_id: 1,
        move_reason: Some("re-slotting".into()),
        remark: None,
        items,
    }
}

// ============================================================================
// Workflow Tests
// ============================================================================

#[cfg(test)]
mod workflow_tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_locks_and_complete_moves() {
        let services = services();
        let op = operator();
        stock_in(&services, 101, "10").await;
        let stock_move = services
            .stock_move
            .create(move_request(vec![move_line(101, 103, "4")]), &op)
            .await
            .unwrap();
        assert_eq!(stock_move.status, StockMoveStatus::Pending);
        assert_eq!(stock_move.total_quantity, dec("4"));

        let executing = services.stock_move.execute(stock_move.id, &op).await.unwrap();
        assert_eq!(executing.status, StockMoveStatus::Executing);
        assert!(executing.items[0].legs.source_locked);
        assert_eq!(quantity(&services, &key(101)).await, (dec("10"), dec("4")));

        let done = services.stock_move.complete(stock_move.id, &op).await.unwrap();
        assert_eq!(done.status, StockMoveStatus::Completed);
        assert_eq!(quantity(&services, &key(101)).await, (dec("6"), Decimal::ZERO));
        assert_eq!(quantity(&services, &key(103)).await, (dec("4"), Decimal::ZERO));

        let entries = services
            .inventory
            .movements(&MovementPageQuery {
                business_no: Some(stock_move.move_no.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        let ops: Vec<OperationType> = entries.list.iter().rev().map(|e| e.operation_type).collect();
        assert_eq!(
            ops,
            vec![OperationType::Lock, OperationType::MoveOut, OperationType::MoveIn]
        );
    }

    /// Moving everything off a location removes its balance
    #[tokio::test]
    async fn test_moving_everything_empties_source() {
        let services = services();
        let op = operator();
        stock_in(&services, 101, "5").await;
        let stock_move = services
            .stock_move
            .create(move_request(vec![move_line(101, 102, "5")]), &op)
            .await
            .unwrap();
        services.stock_move.execute(stock_move.id, &op).await.unwrap();
        services.stock_move.complete(stock_move.id, &op).await.unwrap();

        assert_eq!(quantity(&services, &key(101)).await, (Decimal::ZERO, Decimal::ZERO));
        assert_eq!(quantity(&services, &key(102)).await, (dec("5"), Decimal::ZERO));
        assert!(services.inventory.verify(&key(101)).await.unwrap().consistent);
    }

    #[tokio::test]
    async fn test_execute_without_stock_fails() {
        let services = services();
        let op = operator();
        stock_in(&services, 101, "2").await;
        let stock_move = services
            .stock_move
            .create(move_request(vec![move_line(101, 102, "3")]), &op)
            .await
            .unwrap();

        let err = services.stock_move.execute(stock_move.id, &op).await.unwrap_err();
        assert!(matches!(err, AppError::PartialFailure(_)));
        let stored = services.stock_move.get(stock_move.id).await.unwrap();
        assert_eq!(stored.status, StockMoveStatus::Pending);
        assert_eq!(quantity(&services, &key(101)).await, (dec("2"), Decimal::ZERO));
    }

    /// Without locking on execute the source is only checked on completion
    #[tokio::test]
    async fn test_unlocked_move_checks_on_complete() {
        let mut config = Config::default();
        config.ledger.lock_on_move_execute = false;
        let services = services_with(config);
        let op = operator();
        stock_in(&services, 101, "3").await;
        let stock_move = services
            .stock_move
            .create(move_request(vec![move_line(101, 102, "3")]), &op)
            .await
            .unwrap();
        let executing = services.stock_move.execute(stock_move.id, &op).await.unwrap();
        assert!(!executing.items[0].legs.source_locked);
        assert_eq!(quantity(&services, &key(101)).await, (dec("3"), Decimal::ZERO));

        services.stock_move.complete(stock_move.id, &op).await.unwrap();
        assert_eq!(quantity(&services, &key(102)).await.0, dec("3"));
    }

    #[tokio::test]
    async fn test_batch_dates_follow_the_stock() {
        let services = services();
        let op = operator();
        let mut line = inbound_line(101, 2, "4");
        line.batch_no = Some("B9".into());
        line.expire_date = Some(date(2030, 6, 30));
        receive_all(&services, inbound_request(vec![line])).await;

        let mut request = move_request(vec![move_line(101, 102, "4")]);
        request.items[0].goods_id = 2;
        request.items[0].batch_no = Some("B9".into());
        let stock_move = services.stock_move.create(request, &op).await.unwrap();
        services.stock_move.execute(stock_move.id, &op).await.unwrap();
        services.stock_move.complete(stock_move.id, &op).await.unwrap();

        let moved = services
            .inventory
            .get(&StockKey::new(1, 102, 2).with_batch("B9"))
            .await
            .unwrap();
        assert_eq!(moved.quantity, dec("4"));
        assert_eq!(moved.expire_date, Some(date(2030, 6, 30)));
    }

    #[tokio::test]
    async fn test_page_by_status() {
        let services = services();
        let op = operator();
        stock_in(&services, 101, "10").await;
        let first = services
            .stock_move
            .create(move_request(vec![move_line(101, 102, "1")]), &op)
            .await
            .unwrap();
        services
            .stock_move
            .create(move_request(vec![move_line(101, 103, "1")]), &op)
            .await
            .unwrap();
        services.stock_move.execute(first.id, &op).await.unwrap();

        let executing = services
            .stock_move
            .page(&StockMovePageQuery {
                status: Some(StockMoveStatus::Executing),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(executing.total, 1);
        assert_eq!(executing.list[0].id, first.id);
    }
}

// ============================================================================
// Validation Tests
// ============================================================================

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_same_or_foreign_location() {
        let services = services();
        let op = operator();

        let same = services
            .stock_move
            .create(move_request(vec![move_line(101, 101, "1")]), &op)
            .await;
        assert!(matches!(
            same,
            Err(AppError::Validation { ref field, .. }) if field == "toLocationId"
        ));

        let foreign = services
            .stock_move
            .create(move_request(vec![move_line(101, 201, "1")]), &op)
            .await;
        assert!(matches!(
            foreign,
            Err(AppError::Validation { ref field, .. }) if field == "toLocationId"
        ));
    }

    #[tokio::test]
    async fn test_update_only_while_pending() {
        let services = services();
        let op = operator();
        stock_in(&services, 101, "10").await;
        let stock_move = services
            .stock_move
            .create(move_request(vec![move_line(101, 102, "1")]), &op)
            .await
            .unwrap();
        let updated = services
            .stock_move
            .update(stock_move.id, move_request(vec![move_line(101, 103, "2")]), &op)
            .await
            .unwrap();
        assert_eq!(updated.items[0].to_location_id, 103);

        services.stock_move.execute(stock_move.id, &op).await.unwrap();
        assert!(matches!(
            services.stock_move.delete(stock_move.id, &op).await,
            Err(AppError::InvalidState(_))
        ));
    }
}

// ============================================================================
// Cancellation Tests
// ============================================================================

#[cfg(test)]
mod cancellation_tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_executing_releases_lock() {
        let services = services();
        let op = operator();
        stock_in(&services, 101, "10").await;
        let stock_move = services
            .stock_move
            .create(move_request(vec![move_line(101, 102, "4")]), &op)
            .await
            .unwrap();
        services.stock_move.execute(stock_move.id, &op).await.unwrap();

        let cancelled = services.stock_move.cancel(stock_move.id, &op).await.unwrap();
        assert_eq!(cancelled.status, StockMoveStatus::Cancelled);
        assert_eq!(quantity(&services, &key(101)).await, (dec("10"), Decimal::ZERO));
    }

    async fn partially_executed(services: &wms_ledger_backend::Services) -> i64 {
        let op = operator();
        stock_in(services, 101, "10").await;
        stock_in(services, 102, "1").await;
        let stock_move = services
            .stock_move
            .create(
                move_request(vec![move_line(101, 103, "10"), move_line(102, 103, "5")]),
                &op,
            )
            .await
            .unwrap();

        let err = services.stock_move.execute(stock_move.id, &op).await.unwrap_err();
        assert!(matches!(err, AppError::PartialFailure(_)));
        assert_eq!(quantity(services, &key(101)).await, (dec("10"), dec("10")));
        stock_move.id
    }

    /// Deleting a move whose execute half succeeded gives the locks back
    #[tokio::test]
    async fn test_delete_after_partial_execute_releases_lock() {
        let services = services();
        let id = partially_executed(&services).await;

        services.stock_move.delete(id, &operator()).await.unwrap();
        assert_eq!(quantity(&services, &key(101)).await, (dec("10"), Decimal::ZERO));
        assert_eq!(quantity(&services, &key(102)).await, (dec("1"), Decimal::ZERO));
        assert!(matches!(
            services.stock_move.get(id).await,
            Err(AppError::NotFound(_))
        ));
    }

    /// Replacing the lines drops the locks taken for the old ones
    #[tokio::test]
    async fn test_update_after_partial_execute_releases_lock() {
        let services = services();
        let op = operator();
        let id = partially_executed(&services).await;

        let updated = services
            .stock_move
            .update(id, move_request(vec![move_line(101, 103, "3")]), &op)
            .await
            .unwrap();
        assert_eq!(updated.status, StockMoveStatus::Pending);
        assert_eq!(updated.items.len(), 1);
        assert!(!updated.items[0].legs.source_locked);
        assert_eq!(quantity(&services, &key(101)).await, (dec("10"), Decimal::ZERO));

        services.stock_move.execute(id, &op).await.unwrap();
        assert_eq!(quantity(&services, &key(101)).await, (dec("10"), dec("3")));
    }

    /// Stock that left the source can only be completed, never cancelled
    #[tokio::test]
    async fn test_in_transit_blocks_cancel_until_completed() {
        let store = Arc::new(BlockingStore::new());
        let services = services_over(store.clone());
        let op = operator();
        stock_in(&services, 101, "10").await;
        let stock_move = services
            .stock_move
            .create(move_request(vec![move_line(101, 102, "4")]), &op)
            .await
            .unwrap();
        services.stock_move.execute(stock_move.id, &op).await.unwrap();

        store.block(102);
        let err = services.stock_move.complete(stock_move.id, &op).await.unwrap_err();
        assert!(matches!(err, AppError::PartialFailure(_)));

        let stored = services.stock_move.get(stock_move.id).await.unwrap();
        assert_eq!(stored.status, StockMoveStatus::Executing);
        assert!(stored.has_stock_in_transit());
        assert_eq!(quantity(&services, &key(101)).await, (dec("6"), Decimal::ZERO));
        assert!(matches!(
            services.stock_move.cancel(stock_move.id, &op).await,
            Err(AppError::InvalidState(_))
        ));

        store.unblock();
        let done = services.stock_move.complete(stock_move.id, &op).await.unwrap();
        assert_eq!(done.status, StockMoveStatus::Completed);
        assert_eq!(quantity(&services, &key(101)).await, (dec("6"), Decimal::ZERO));
        assert_eq!(quantity(&services, &key(102)).await, (dec("4"), Decimal::ZERO));
    }
}
