//! Stock taking tests
//!
//! Tests for physical counts including:
//! - Plan scopes generating one taking per balance
//! - Count, review and adjust posting the difference
//! - Plan completion only once every taking is closed

mod common;

use std::sync::Arc;

use rust_decimal::Decimal;

use common::*;
use shared::{
    CreateStockTakingPlanRequest, CreateStockTakingRequest, MovementPageQuery, OperationType,
    StockKey, StockTakingPageQuery, StockTakingPlanStatus, StockTakingScopeType,
    StockTakingStatus, StockTakingType, SubmitCountRequest,
};
use wms_ledger_backend::error::AppError;
use wms_ledger_backend::Services;

fn plan_request(scope_type: StockTakingScopeType, scope_ids: Vec<i64>) -> CreateStockTakingPlanRequest {
    CreateStockTakingPlanRequest {
        plan_name: "Quarter close".into(),
        warehouse_id: 1,
        taking_type: StockTakingType::Full,
        scope_type,
        scope_ids,
        plan_start_time: None,
        plan_end_time: None,
        remark: None,
    }
}

fn count(actual: &str, reason: Option<&str>) -> SubmitCountRequest {
    SubmitCountRequest {
        actual_quantity: dec(actual),
        diff_reason: reason.map(String::from),
    }
}

/// Stock on 101 (area 11), 102 (area 11) and 103 (area 12)
async fn stocked() -> Services {
    let services = services();
    stock_in(&services, 101, "10").await;
    stock_in(&services, 102, "5").await;
    stock_in(&services, 103, "7").await;
    services
}

async fn started_plan(
    services: &Services,
    scope_type: StockTakingScopeType,
    scope_ids: Vec<i64>,
) -> shared::StockTakingPlan {
    let op = operator();
    let plan = services
        .stock_taking
        .create_plan(plan_request(scope_type, scope_ids), &op)
        .await
        .unwrap();
    services.stock_taking.audit_plan(plan.id, &op).await.unwrap();
    services.stock_taking.start_plan(plan.id, &op).await.unwrap()
}

async fn plan_takings(services: &Services, plan_id: i64) -> Vec<shared::StockTaking> {
    services
        .stock_taking
        .taking_page(&StockTakingPageQuery {
            plan_id: Some(plan_id),
            ..Default::default()
        })
        .await
        .unwrap()
        .list
}

// ============================================================================
// Plan Tests
// ============================================================================

#[cfg(test)]
mod plan_tests {
    use super::*;

    #[tokio::test]
    async fn test_warehouse_scope_covers_every_balance() {
        let services = stocked().await;
        let plan = started_plan(&services, StockTakingScopeType::Warehouse, vec![]).await;

        assert_eq!(plan.status, StockTakingPlanStatus::Processing);
        assert_eq!(plan.total_count, 3);
        let takings = plan_takings(&services, plan.id).await;
        let mut books: Vec<Decimal> = takings.iter().map(|t| t.book_quantity).collect();
        books.sort();
        assert_eq!(books, vec![dec("5"), dec("7"), dec("10")]);
        assert!(takings.iter().all(|t| t.status == StockTakingStatus::Pending));
    }

    #[tokio::test]
    async fn test_area_and_location_scopes() {
        let services = stocked().await;

        let area = started_plan(&services, StockTakingScopeType::Area, vec![11]).await;
        assert_eq!(area.total_count, 2);

        let location = started_plan(&services, StockTakingScopeType::Location, vec![103]).await;
        let takings = plan_takings(&services, location.id).await;
        assert_eq!(takings.len(), 1);
        assert_eq!(takings[0].key, key(103));

        let goods = started_plan(&services, StockTakingScopeType::Goods, vec![2]).await;
        assert_eq!(goods.total_count, 0);
    }

    #[tokio::test]
    async fn test_plan_validation() {
        let services = services();
        let op = operator();

        let no_ids = services
            .stock_taking
            .create_plan(plan_request(StockTakingScopeType::Location, vec![]), &op)
            .await;
        assert!(matches!(
            no_ids,
            Err(AppError::Validation { ref field, .. }) if field == "scopeIds"
        ));

        let plan = services
            .stock_taking
            .create_plan(plan_request(StockTakingScopeType::Warehouse, vec![]), &op)
            .await
            .unwrap();
        let unaudited = services.stock_taking.start_plan(plan.id, &op).await;
        assert!(matches!(unaudited, Err(AppError::InvalidState(_))));
    }

    /// A plan closes only after all of its takings are adjusted or cancelled
    #[tokio::test]
    async fn test_complete_requires_closed_takings() {
        let services = stocked().await;
        let op = operator();
        let plan = started_plan(&services, StockTakingScopeType::Area, vec![11]).await;
        let takings = plan_takings(&services, plan.id).await;

        let early = services.stock_taking.complete_plan(plan.id, &op).await;
        assert!(matches!(early, Err(AppError::InvalidState(_))));

        let first = &takings[0];
        let actual = (first.book_quantity - Decimal::ONE).to_string();
        services
            .stock_taking
            .submit(first.id, count(&actual, Some("breakage")), &op)
            .await
            .unwrap();
        services.stock_taking.review(first.id, &op).await.unwrap();
        services.stock_taking.adjust(first.id, &op).await.unwrap();
        services.stock_taking.cancel_taking(takings[1].id, &op).await.unwrap();

        let done = services.stock_taking.complete_plan(plan.id, &op).await.unwrap();
        assert_eq!(done.status, StockTakingPlanStatus::Completed);
        assert_eq!(done.completed_count, 2);
        assert_eq!(done.diff_count, 1);
        assert!(done.actual_end_time.is_some());
    }

    /// Takings adjusted in parallel are all counted on the plan
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_adjusts_keep_progress() {
        let services = Arc::new(stocked().await);
        let op = operator();
        let plan = started_plan(&services, StockTakingScopeType::Warehouse, vec![]).await;
        let takings = plan_takings(&services, plan.id).await;
        assert_eq!(takings.len(), 3);

        let mut handles = Vec::new();
        for taking in takings {
            let actual = (taking.book_quantity + Decimal::ONE).to_string();
            services
                .stock_taking
                .submit(taking.id, count(&actual, Some("found")), &op)
                .await
                .unwrap();
            services.stock_taking.review(taking.id, &op).await.unwrap();
            let services = services.clone();
            handles.push(tokio::spawn(async move {
                services.stock_taking.adjust(taking.id, &operator()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let counted = services.stock_taking.get_plan(plan.id).await.unwrap();
        assert_eq!(counted.completed_count, 3);
        assert_eq!(counted.diff_count, 3);
        let done = services.stock_taking.complete_plan(plan.id, &op).await.unwrap();
        assert_eq!(done.status, StockTakingPlanStatus::Completed);
    }

    /// Cancelling a plan leaves takings that were already adjusted alone
    #[tokio::test]
    async fn test_cancel_plan_keeps_adjusted_takings() {
        let services = stocked().await;
        let op = operator();
        let plan = started_plan(&services, StockTakingScopeType::Area, vec![11]).await;
        let takings = plan_takings(&services, plan.id).await;

        let first = &takings[0];
        let actual = (first.book_quantity - Decimal::ONE).to_string();
        services
            .stock_taking
            .submit(first.id, count(&actual, Some("breakage")), &op)
            .await
            .unwrap();
        services.stock_taking.review(first.id, &op).await.unwrap();
        services.stock_taking.adjust(first.id, &op).await.unwrap();

        let cancelled = services.stock_taking.cancel_plan(plan.id, &op).await.unwrap();
        assert_eq!(cancelled.status, StockTakingPlanStatus::Cancelled);

        let adjusted = services.stock_taking.get_taking(first.id).await.unwrap();
        assert_eq!(adjusted.status, StockTakingStatus::Adjusted);
        assert!(adjusted.posted);
        let other = services.stock_taking.get_taking(takings[1].id).await.unwrap();
        assert_eq!(other.status, StockTakingStatus::Cancelled);
        assert_eq!(
            quantity(&services, &first.key).await.0,
            first.book_quantity - Decimal::ONE
        );

        let stored = services.stock_taking.get_plan(plan.id).await.unwrap();
        assert_eq!(stored.status, StockTakingPlanStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_plan_cancels_open_takings() {
        let services = stocked().await;
        let op = operator();
        let plan = started_plan(&services, StockTakingScopeType::Warehouse, vec![]).await;

        let cancelled = services.stock_taking.cancel_plan(plan.id, &op).await.unwrap();
        assert_eq!(cancelled.status, StockTakingPlanStatus::Cancelled);
        assert!(plan_takings(&services, plan.id)
            .await
            .iter()
            .all(|t| t.status == StockTakingStatus::Cancelled));
    }
}

// ============================================================================
// Taking Tests
// ============================================================================

#[cfg(test)]
mod taking_tests {
    use super::*;

    async fn standalone(services: &Services, key: StockKey) -> shared::StockTaking {
        services
            .stock_taking
            .create_taking(CreateStockTakingRequest { key, remark: None }, &operator())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_shortage_posts_negative_adjustment() {
        let services = stocked().await;
        let op = operator();
        let taking = standalone(&services, key(101)).await;
        assert_eq!(taking.book_quantity, dec("10"));
        assert!(taking.plan_id.is_none());

        let counted = services
            .stock_taking
            .submit(taking.id, count("8", Some("missing")), &op)
            .await
            .unwrap();
        assert_eq!(counted.status, StockTakingStatus::Counted);
        assert_eq!(counted.difference(), Some(dec("-2")));

        services.stock_taking.review(taking.id, &op).await.unwrap();
        let adjusted = services.stock_taking.adjust(taking.id, &op).await.unwrap();
        assert_eq!(adjusted.status, StockTakingStatus::Adjusted);
        assert!(adjusted.posted);
        assert_eq!(quantity(&services, &key(101)).await.0, dec("8"));

        let entries = services
            .inventory
            .movements(&MovementPageQuery {
                business_no: Some(taking.taking_no.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(entries.total, 1);
        assert_eq!(entries.list[0].operation_type, OperationType::TakingAdjust);
        assert_eq!(entries.list[0].quantity_change, dec("-2"));
        assert_eq!(entries.list[0].remark.as_deref(), Some("missing"));
    }

    /// Matching counts close the taking without touching the ledger
    #[tokio::test]
    async fn test_matching_count_posts_nothing() {
        let services = stocked().await;
        let op = operator();
        let taking = standalone(&services, key(102)).await;
        services
            .stock_taking
            .submit(taking.id, count("5", None), &op)
            .await
            .unwrap();
        services.stock_taking.review(taking.id, &op).await.unwrap();
        let adjusted = services.stock_taking.adjust(taking.id, &op).await.unwrap();

        assert!(!adjusted.posted);
        let entries = services
            .inventory
            .movements(&MovementPageQuery {
                business_no: Some(taking.taking_no.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(entries.total, 0);
    }

    /// Counting stock where the ledger has none creates the balance
    #[tokio::test]
    async fn test_found_stock_creates_balance() {
        let services = services();
        let op = operator();
        let taking = standalone(&services, key(103)).await;
        assert_eq!(taking.book_quantity, Decimal::ZERO);

        services
            .stock_taking
            .submit(taking.id, count("3", Some("found")), &op)
            .await
            .unwrap();
        services.stock_taking.review(taking.id, &op).await.unwrap();
        services.stock_taking.adjust(taking.id, &op).await.unwrap();
        assert_eq!(quantity(&services, &key(103)).await.0, dec("3"));
    }

    #[tokio::test]
    async fn test_steps_must_follow_order() {
        let services = stocked().await;
        let op = operator();
        let taking = standalone(&services, key(101)).await;

        assert!(matches!(
            services.stock_taking.review(taking.id, &op).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            services.stock_taking.adjust(taking.id, &op).await,
            Err(AppError::InvalidState(_))
        ));
        let negative = services
            .stock_taking
            .submit(taking.id, count("-1", None), &op)
            .await;
        assert!(matches!(negative, Err(AppError::Validation { .. })));

        services
            .stock_taking
            .submit(taking.id, count("10", None), &op)
            .await
            .unwrap();
        let resubmit = services.stock_taking.submit(taking.id, count("9", None), &op).await;
        assert!(matches!(resubmit, Err(AppError::InvalidState(_))));
    }

    /// A shortage cannot eat into stock reserved for an outbound
    #[tokio::test]
    async fn test_shortage_cannot_break_reservations() {
        let services = stocked().await;
        let op = operator();
        let taking = standalone(&services, key(102)).await;
        let order = audited_outbound(&services, vec![outbound_line(102, "4")]).await;
        services.outbound.start_picking(order.id, &op).await.unwrap();

        services
            .stock_taking
            .submit(taking.id, count("2", None), &op)
            .await
            .unwrap();
        services.stock_taking.review(taking.id, &op).await.unwrap();
        let err = services.stock_taking.adjust(taking.id, &op).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientAvailable { .. }));

        let stored = services.stock_taking.get_taking(taking.id).await.unwrap();
        assert_eq!(stored.status, StockTakingStatus::Reviewed);
        assert_eq!(quantity(&services, &key(102)).await, (dec("5"), dec("4")));
    }

    #[tokio::test]
    async fn test_taking_on_unknown_location_is_rejected() {
        let services = services();
        let result = services
            .stock_taking
            .create_taking(
                CreateStockTakingRequest {
                    key: StockKey::new(1, 999, 1),
                    remark: None,
                },
                &operator(),
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }
}
