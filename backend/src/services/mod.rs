//! Business logic services for the warehouse inventory ledger

pub mod checks;
pub mod inbound;
pub mod inventory;
pub mod ledger;
pub mod movement_log;
pub mod outbound;
pub mod picking;
pub mod reporting;
pub mod repository;
pub mod reservation;
pub mod retry;
pub mod stock_move;
pub mod stock_taking;

use std::sync::Arc;

pub use inbound::InboundService;
pub use inventory::InventoryService;
pub use ledger::{Ledger, MovementMeta};
pub use movement_log::MovementLog;
pub use outbound::OutboundService;
pub use picking::PickingService;
pub use reporting::ReportingService;
pub use repository::DocumentNumbers;
pub use reservation::ReservationManager;
pub use retry::{RetryPolicy, RetryingLedger};
pub use stock_move::StockMoveService;
pub use stock_taking::StockTakingService;

use crate::config::Config;
use crate::external::MasterData;
use crate::store::LedgerStore;

/// Every service wired against one ledger store and one master-data source
pub struct Services {
    pub inventory: InventoryService,
    pub inbound: InboundService,
    pub outbound: Arc<OutboundService>,
    pub picking: PickingService,
    pub stock_move: StockMoveService,
    pub stock_taking: StockTakingService,
    pub reporting: Arc<ReportingService>,
    pub master: Arc<dyn MasterData>,
}

impl Services {
    pub fn new(config: &Config, store: Arc<dyn LedgerStore>, master: Arc<dyn MasterData>) -> Self {
        let ledger = Ledger::new(store.clone());
        let log = MovementLog::new(store);
        let retrying = RetryingLedger::new(ledger.clone(), RetryPolicy::new(config.ledger.max_retries));
        let numbers = Arc::new(DocumentNumbers::new());

        let reservations = Arc::new(ReservationManager::new(retrying.clone()));
        let outbound = Arc::new(OutboundService::new(
            reservations,
            master.clone(),
            numbers.clone(),
        ));

        Self {
            inventory: InventoryService::new(retrying.clone(), log.clone()),
            inbound: InboundService::new(
                retrying.clone(),
                master.clone(),
                numbers.clone(),
                config.ledger.over_receipt_tolerance,
            ),
            picking: PickingService::new(
                outbound.clone(),
                master.clone(),
                numbers.clone(),
                config.picking.clone(),
            ),
            outbound,
            stock_move: StockMoveService::new(
                retrying.clone(),
                master.clone(),
                numbers.clone(),
                config.ledger.lock_on_move_execute,
            ),
            stock_taking: StockTakingService::new(retrying, master.clone(), numbers),
            reporting: Arc::new(ReportingService::new(
                ledger,
                log,
                master.clone(),
                config.warning.expiring_within_days,
            )),
            master,
        }
    }
}
