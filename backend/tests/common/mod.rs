//! Fixtures shared by the integration tests
//!
//! Every test gets its own in-memory ledger and the demo master data:
//! warehouse 1 with locations 101, 102 (area 11) and 103 (area 12),
//! warehouse 2 with location 201, goods 1 (no batch, safety stock 10) and
//! goods 2 (batch tracked, safety stock 5, category 2 under 1).

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use shared::{
    CompleteInboundRequest, CreateInboundRequest, CreateOutboundRequest, InboundItemRequest,
    InboundOrder, InboundType, MovementEntry, OperatorContext, OutboundItemRequest, OutboundOrder,
    OutboundType, ReceiveItemRequest, StockBalance, StockKey,
};
use wms_ledger_backend::{
    config::Config,
    error::{AppError, AppResult},
    external::StaticMasterData,
    store::{BalanceFilter, LedgerStore, MemoryLedgerStore, MovementFilter},
    Services,
};

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn operator() -> OperatorContext {
    OperatorContext::new(1, "admin")
}

pub fn services() -> Services {
    services_with(Config::default())
}

pub fn services_with(config: Config) -> Services {
    Services::new(
        &config,
        Arc::new(MemoryLedgerStore::new()),
        Arc::new(StaticMasterData::demo()),
    )
}

pub fn services_over(store: Arc<dyn LedgerStore>) -> Services {
    Services::new(&Config::default(), store, Arc::new(StaticMasterData::demo()))
}

/// In-memory store that refuses every commit on one location while blocked
pub struct BlockingStore {
    inner: MemoryLedgerStore,
    blocked_location: AtomicI64,
}

impl BlockingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryLedgerStore::new(),
            blocked_location: AtomicI64::new(0),
        }
    }

    pub fn block(&self, location_id: i64) {
        self.blocked_location.store(location_id, Ordering::SeqCst);
    }

    pub fn unblock(&self) {
        self.blocked_location.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for BlockingStore {
    async fn load(&self, key: &StockKey) -> AppResult<Option<StockBalance>> {
        self.inner.load(key).await
    }

    async fn commit(
        &self,
        expected_version: i64,
        next: StockBalance,
        entry: MovementEntry,
    ) -> AppResult<(StockBalance, MovementEntry)> {
        if next.key.location_id == self.blocked_location.load(Ordering::SeqCst) {
            return Err(AppError::Busy(format!("location {} is blocked", next.key.location_id)));
        }
        self.inner.commit(expected_version, next, entry).await
    }

    async fn append(&self, entry: MovementEntry) -> AppResult<MovementEntry> {
        self.inner.append(entry).await
    }

    async fn entries(&self, filter: &MovementFilter) -> AppResult<Vec<MovementEntry>> {
        self.inner.entries(filter).await
    }

    async fn balances(&self, filter: &BalanceFilter) -> AppResult<Vec<StockBalance>> {
        self.inner.balances(filter).await
    }
}

/// Key of unbatched goods 1 in warehouse 1
pub fn key(location_id: i64) -> StockKey {
    StockKey::new(1, location_id, 1)
}

pub fn inbound_line(location_id: i64, goods_id: i64, quantity: &str) -> InboundItemRequest {
    InboundItemRequest {
        goods_id,
        location_id,
        batch_no: None,
        serial_no: None,
        production_date: None,
        expire_date: None,
        plan_quantity: dec(quantity),
        price: dec("2.5"),
        remark: None,
    }
}

pub fn inbound_request(items: Vec<InboundItemRequest>) -> CreateInboundRequest {
    CreateInboundRequest {
        inbound_type: InboundType::Purchase,
        warehouse_id: 1,
        supplier_id: Some(1),
        expected_arrival_time: None,
        remark: None,
        items,
    }
}

/// Receive every line in full and complete the inbound
pub async fn receive_all(services: &Services, request: CreateInboundRequest) -> InboundOrder {
    let op = operator();
    let order = services.inbound.create(request, &op).await.unwrap();
    services.inbound.audit(order.id, &op).await.unwrap();
    services.inbound.start_receiving(order.id, &op).await.unwrap();
    let receipts = order
        .items
        .iter()
        .map(|i| ReceiveItemRequest {
            item_id: i.id,
            received_quantity: i.plan_quantity,
            qualified_quantity: i.plan_quantity,
            unqualified_quantity: Decimal::ZERO,
        })
        .collect();
    services
        .inbound
        .complete(order.id, CompleteInboundRequest { items: receipts }, &op)
        .await
        .unwrap()
}

/// Put `quantity` of goods 1 on `location_id` in warehouse 1
pub async fn stock_in(services: &Services, location_id: i64, quantity: &str) -> InboundOrder {
    receive_all(
        services,
        inbound_request(vec![inbound_line(location_id, 1, quantity)]),
    )
    .await
}

pub fn outbound_line(location_id: i64, quantity: &str) -> OutboundItemRequest {
    OutboundItemRequest {
        goods_id: 1,
        location_id,
        batch_no: None,
        serial_no: None,
        plan_quantity: dec(quantity),
        price: dec("4"),
        remark: None,
    }
}

pub fn outbound_request(items: Vec<OutboundItemRequest>) -> CreateOutboundRequest {
    CreateOutboundRequest {
        outbound_type: OutboundType::Sale,
        warehouse_id: 1,
        customer_id: Some(1),
        expected_shipment_time: None,
        remark: None,
        items,
    }
}

/// Create and audit an outbound
pub async fn audited_outbound(services: &Services, items: Vec<OutboundItemRequest>) -> OutboundOrder {
    let op = operator();
    let order = services
        .outbound
        .create(outbound_request(items), &op)
        .await
        .unwrap();
    services.outbound.audit(order.id, &op).await.unwrap()
}

pub async fn quantity(services: &Services, key: &StockKey) -> (Decimal, Decimal) {
    let balance = services.inventory.get(key).await.unwrap();
    (balance.quantity, balance.lock_quantity)
}
