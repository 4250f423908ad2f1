//! Inbound document tests
//!
//! Tests for the receiving workflow including:
//! - Lifecycle transitions and their guards
//! - Posting received quantities to the ledger on completion
//! - Over-receipt tolerance and receipt arithmetic
//! - Partial failure and re-running completion

mod common;

use std::sync::Arc;

use rust_decimal::Decimal;

use common::*;
use shared::{
    CompleteInboundRequest, InboundItemRequest, InboundPageQuery, InboundStatus, OperationType,
    ReceiveItemRequest, StockKey,
};
use wms_ledger_backend::config::Config;
use wms_ledger_backend::error::AppError;
use wms_ledger_backend::Services;

fn receipt(item_id: i64, qualified: &str, unqualified: &str) -> ReceiveItemRequest {
    ReceiveItemRequest {
        item_id,
        received_quantity: dec(qualified) + dec(unqualified),
        qualified_quantity: dec(qualified),
        unqualified_quantity: dec(unqualified),
    }
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_computes_totals() {
        let services = services();
        let order = services
            .inbound
            .create(
                inbound_request(vec![inbound_line(101, 1, "10"), inbound_line(102, 1, "4")]),
                &operator(),
            )
            .await
            .unwrap();

        assert_eq!(order.status, InboundStatus::PendingAudit);
        assert!(order.inbound_no.starts_with("IN"));
        assert_eq!(order.total_quantity, dec("14"));
        assert_eq!(order.total_amount, dec("35"));
        assert_eq!(order.creator, "admin");
        assert!(order.items.iter().all(|i| !i.posted));
    }

    #[tokio::test]
    async fn test_full_receiving_flow_posts_stock() {
        let services = services();
        let order = receive_all(
            &services,
            inbound_request(vec![inbound_line(101, 1, "10"), inbound_line(102, 1, "4")]),
        )
        .await;

        assert_eq!(order.status, InboundStatus::Completed);
        assert_eq!(order.complete_by, Some(1));
        assert!(order.items.iter().all(|i| i.posted));
        assert_eq!(quantity(&services, &key(101)).await, (dec("10"), Decimal::ZERO));
        assert_eq!(quantity(&services, &key(102)).await, (dec("4"), Decimal::ZERO));

        let page = services
            .inventory
            .movements(&shared::MovementPageQuery {
                business_no: Some(order.inbound_no.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert!(page
            .list
            .iter()
            .all(|e| e.operation_type == OperationType::Inbound));
    }

    /// Receiving requires audit first
    #[tokio::test]
    async fn test_transitions_out_of_order_are_rejected() {
        let services = services();
        let op = operator();
        let order = services
            .inbound
            .create(inbound_request(vec![inbound_line(101, 1, "5")]), &op)
            .await
            .unwrap();

        let early = services.inbound.start_receiving(order.id, &op).await;
        assert!(matches!(early, Err(AppError::InvalidState(_))));

        services.inbound.audit(order.id, &op).await.unwrap();
        let twice = services.inbound.audit(order.id, &op).await;
        assert!(matches!(twice, Err(AppError::InvalidState(_))));

        let not_receiving = services
            .inbound
            .complete(order.id, CompleteInboundRequest::default(), &op)
            .await;
        assert!(matches!(not_receiving, Err(AppError::InvalidState(_))));
        assert_eq!(services.inbound.get(order.id).await.unwrap().status, InboundStatus::Audited);
    }

    #[tokio::test]
    async fn test_update_and_delete_only_while_pending() {
        let services = services();
        let op = operator();
        let order = services
            .inbound
            .create(inbound_request(vec![inbound_line(101, 1, "5")]), &op)
            .await
            .unwrap();

        let updated = services
            .inbound
            .update(order.id, inbound_request(vec![inbound_line(102, 1, "8")]), &op)
            .await
            .unwrap();
        assert_eq!(updated.total_quantity, dec("8"));
        assert_eq!(updated.inbound_no, order.inbound_no);

        services.inbound.audit(order.id, &op).await.unwrap();
        let late_update = services
            .inbound
            .update(order.id, inbound_request(vec![inbound_line(102, 1, "9")]), &op)
            .await;
        assert!(matches!(late_update, Err(AppError::InvalidState(_))));
        assert!(services.inbound.delete(order.id, &op).await.is_err());

        let fresh = services
            .inbound
            .create(inbound_request(vec![inbound_line(101, 1, "1")]), &op)
            .await
            .unwrap();
        services.inbound.delete(fresh.id, &op).await.unwrap();
        assert!(matches!(
            services.inbound.get(fresh.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_before_posting() {
        let services = services();
        let op = operator();
        let order = services
            .inbound
            .create(inbound_request(vec![inbound_line(101, 1, "5")]), &op)
            .await
            .unwrap();
        services.inbound.audit(order.id, &op).await.unwrap();
        let cancelled = services.inbound.cancel(order.id, &op).await.unwrap();
        assert_eq!(cancelled.status, InboundStatus::Cancelled);

        let again = services.inbound.cancel(order.id, &op).await;
        assert!(matches!(again, Err(AppError::InvalidState(_))));
        assert_eq!(quantity(&services, &key(101)).await, (Decimal::ZERO, Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_page_filters_by_status() {
        let services = services();
        let op = operator();
        receive_all(&services, inbound_request(vec![inbound_line(101, 1, "1")])).await;
        services
            .inbound
            .create(inbound_request(vec![inbound_line(101, 1, "2")]), &op)
            .await
            .unwrap();

        let pending = services
            .inbound
            .page(&InboundPageQuery {
                status: Some(InboundStatus::PendingAudit),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pending.total, 1);
        assert_eq!(pending.list[0].total_quantity, dec("2"));

        let all = services.inbound.page(&InboundPageQuery::default()).await.unwrap();
        assert_eq!(all.total, 2);
    }
}

// ============================================================================
// Validation Tests
// ============================================================================

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_bad_master_data() {
        let services = services();
        let op = operator();

        let foreign_location = services
            .inbound
            .create(inbound_request(vec![inbound_line(201, 1, "1")]), &op)
            .await;
        assert!(matches!(
            foreign_location,
            Err(AppError::Validation { ref field, .. }) if field == "locationId"
        ));

        let unknown_goods = services
            .inbound
            .create(inbound_request(vec![inbound_line(101, 99, "1")]), &op)
            .await;
        assert!(matches!(unknown_goods, Err(AppError::Validation { .. })));

        let missing_batch = services
            .inbound
            .create(inbound_request(vec![inbound_line(101, 2, "1")]), &op)
            .await;
        assert!(matches!(
            missing_batch,
            Err(AppError::Validation { ref field, .. }) if field == "batchNo"
        ));

        let zero = services
            .inbound
            .create(inbound_request(vec![inbound_line(101, 1, "0")]), &op)
            .await;
        assert!(matches!(zero, Err(AppError::Validation { .. })));

        let mut no_supplier = inbound_request(vec![inbound_line(101, 1, "1")]);
        no_supplier.supplier_id = None;
        let no_supplier = services.inbound.create(no_supplier, &op).await;
        assert!(matches!(no_supplier, Err(AppError::Validation { .. })));

        let empty = services.inbound.create(inbound_request(vec![]), &op).await;
        assert!(empty.is_err());
    }

    async fn rejected_on(services: &Services, line: InboundItemRequest, expected: &str) -> bool {
        let result = services
            .inbound
            .create(inbound_request(vec![line]), &operator())
            .await;
        matches!(result, Err(AppError::Validation { ref field, .. }) if field == expected)
    }

    /// Quantities and prices must fit NUMERIC(18,4) and never crash the request
    #[tokio::test]
    async fn test_out_of_range_figures_are_rejected() {
        let services = services();

        let mut huge = inbound_line(101, 1, "100000000000000000");
        huge.price = dec("100000000000000000");
        assert!(rejected_on(&services, huge, "planQuantity").await);

        let over_scale = inbound_line(101, 1, "1.00001");
        assert!(rejected_on(&services, over_scale, "planQuantity").await);

        let mut negative_price = inbound_line(101, 1, "1");
        negative_price.price = dec("-0.5");
        assert!(rejected_on(&services, negative_price, "price").await);

        let mut huge_price = inbound_line(101, 1, "1");
        huge_price.price = dec("100000000000000");
        assert!(rejected_on(&services, huge_price, "price").await);

        let mut huge_amount = inbound_line(101, 1, "99999999999999");
        huge_amount.price = dec("99999999999999");
        assert!(rejected_on(&services, huge_amount, "price").await);

        let mut largest = inbound_line(101, 1, "99999999999999.9999");
        largest.price = Decimal::ZERO;
        let order = services
            .inbound
            .create(inbound_request(vec![largest]), &operator())
            .await
            .unwrap();
        assert_eq!(order.total_amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_expiry_before_production_is_rejected() {
        let services = services();
        let mut line = inbound_line(101, 2, "1");
        line.batch_no = Some("B1".into());
        line.production_date = Some(date(2024, 6, 1));
        line.expire_date = Some(date(2024, 1, 1));

        let result = services
            .inbound
            .create(inbound_request(vec![line]), &operator())
            .await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    /// received must equal qualified + unqualified
    #[tokio::test]
    async fn test_receipt_arithmetic_is_checked() {
        let services = services();
        let op = operator();
        let order = services
            .inbound
            .create(inbound_request(vec![inbound_line(101, 1, "10")]), &op)
            .await
            .unwrap();
        services.inbound.audit(order.id, &op).await.unwrap();
        services.inbound.start_receiving(order.id, &op).await.unwrap();

        let bad = ReceiveItemRequest {
            item_id: order.items[0].id,
            received_quantity: dec("10"),
            qualified_quantity: dec("8"),
            unqualified_quantity: dec("1"),
        };
        let result = services.inbound.receive_item(order.id, bad, &op).await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_over_receipt_needs_tolerance() {
        let services = services();
        let op = operator();
        let order = services
            .inbound
            .create(inbound_request(vec![inbound_line(101, 1, "10")]), &op)
            .await
            .unwrap();
        services.inbound.audit(order.id, &op).await.unwrap();
        services.inbound.start_receiving(order.id, &op).await.unwrap();

        let over = services
            .inbound
            .receive_item(order.id, receipt(order.items[0].id, "11", "0"), &op)
            .await;
        assert!(matches!(over, Err(AppError::Validation { .. })));

        let mut config = Config::default();
        config.ledger.over_receipt_tolerance = dec("1.1");
        let tolerant = services_with(config);
        let order = tolerant
            .inbound
            .create(inbound_request(vec![inbound_line(101, 1, "10")]), &op)
            .await
            .unwrap();
        tolerant.inbound.audit(order.id, &op).await.unwrap();
        tolerant.inbound.start_receiving(order.id, &op).await.unwrap();
        let done = tolerant
            .inbound
            .complete(
                order.id,
                CompleteInboundRequest {
                    items: vec![receipt(order.items[0].id, "10", "1")],
                },
                &op,
            )
            .await
            .unwrap();
        assert_eq!(done.received_quantity, dec("11"));
        assert_eq!(quantity(&tolerant, &key(101)).await.0, dec("11"));
    }

    /// Recorded receipts carry over into completion; unreceived lines post nothing
    #[tokio::test]
    async fn test_short_receipt_posts_only_received() {
        let services = services();
        let op = operator();
        let order = services
            .inbound
            .create(
                inbound_request(vec![inbound_line(101, 1, "10"), inbound_line(102, 1, "5")]),
                &op,
            )
            .await
            .unwrap();
        services.inbound.audit(order.id, &op).await.unwrap();
        services.inbound.start_receiving(order.id, &op).await.unwrap();
        services
            .inbound
            .receive_item(order.id, receipt(order.items[0].id, "6", "1"), &op)
            .await
            .unwrap();

        let done = services
            .inbound
            .complete(order.id, CompleteInboundRequest::default(), &op)
            .await
            .unwrap();
        assert_eq!(done.status, InboundStatus::Completed);
        assert_eq!(done.received_quantity, dec("7"));
        assert_eq!(quantity(&services, &key(101)).await.0, dec("7"));
        assert_eq!(quantity(&services, &key(102)).await.0, Decimal::ZERO);
        assert!(!done.items[1].posted);
    }

    #[tokio::test]
    async fn test_batch_dates_reach_the_balance() {
        let services = services();
        let mut line = inbound_line(101, 2, "3");
        line.batch_no = Some("LOT-7".into());
        line.production_date = Some(date(2024, 1, 1));
        line.expire_date = Some(date(2025, 1, 1));
        receive_all(&services, inbound_request(vec![line])).await;

        let balance = services
            .inventory
            .get(&StockKey::new(1, 101, 2).with_batch("LOT-7"))
            .await
            .unwrap();
        assert_eq!(balance.quantity, dec("3"));
        assert_eq!(balance.expire_date, Some(date(2025, 1, 1)));
    }
}

// ============================================================================
// Partial Failure Tests
// ============================================================================

#[cfg(test)]
mod partial_failure_tests {
    use super::*;

    /// A failing line keeps the order receiving; the retry posts only what is missing
    #[tokio::test]
    async fn test_complete_partial_failure_then_rerun() {
        let store = Arc::new(BlockingStore::new());
        let services = services_over(store.clone());
        let op = operator();
        let order = services
            .inbound
            .create(
                inbound_request(vec![inbound_line(101, 1, "10"), inbound_line(102, 1, "5")]),
                &op,
            )
            .await
            .unwrap();
        services.inbound.audit(order.id, &op).await.unwrap();
        services.inbound.start_receiving(order.id, &op).await.unwrap();
        let receipts = CompleteInboundRequest {
            items: vec![
                receipt(order.items[0].id, "10", "0"),
                receipt(order.items[1].id, "5", "0"),
            ],
        };

        store.block(102);
        let err = services
            .inbound
            .complete(order.id, receipts, &op)
            .await
            .unwrap_err();
        match err {
            AppError::PartialFailure(failure) => {
                assert_eq!(failure.document_no, order.inbound_no);
                assert_eq!(failure.failed_item_ids(), vec![order.items[1].id]);
                assert_eq!(failure.failures[0].code, "BUSY");
            }
            other => panic!("expected partial failure, got {}", other),
        }

        let stored = services.inbound.get(order.id).await.unwrap();
        assert_eq!(stored.status, InboundStatus::Receiving);
        assert!(stored.items[0].posted);
        assert!(!stored.items[1].posted);
        assert_eq!(quantity(&services, &key(101)).await.0, dec("10"));

        // Posted stock pins the order: it can only be completed now
        assert!(matches!(
            services.inbound.cancel(order.id, &op).await,
            Err(AppError::InvalidState(_))
        ));

        store.unblock();
        let done = services
            .inbound
            .complete(order.id, CompleteInboundRequest::default(), &op)
            .await
            .unwrap();
        assert_eq!(done.status, InboundStatus::Completed);
        assert_eq!(quantity(&services, &key(101)).await.0, dec("10"));
        assert_eq!(quantity(&services, &key(102)).await.0, dec("5"));
    }
}
