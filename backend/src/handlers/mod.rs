//! HTTP request handlers

pub mod health;
pub mod inbound;
pub mod inventory;
pub mod outbound;
pub mod picking;
pub mod reporting;
pub mod stock_move;
pub mod stock_taking;

pub use health::health_check;
