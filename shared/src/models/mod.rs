//! Domain models for the warehouse inventory ledger

mod inbound;
mod lifecycle;
mod master;
mod movement;
mod outbound;
mod picking;
mod report;
mod reservation;
mod stock;
mod stock_move;
mod stock_taking;

pub use inbound::*;
pub use lifecycle::*;
pub use master::*;
pub use movement::*;
pub use outbound::*;
pub use picking::*;
pub use report::*;
pub use reservation::*;
pub use stock::*;
pub use stock_move::*;
pub use stock_taking::*;
