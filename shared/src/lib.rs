//! Shared types and models for the warehouse inventory ledger
//!
//! This crate holds the pure domain: ledger keys and balances, the movement
//! log entry, every document header/line type with its lifecycle, and the
//! validation rules that run before anything touches the ledger.

#[macro_use]
pub mod codes;
pub mod models;
pub mod types;
pub mod validation;

pub use codes::UnknownCode;
pub use models::*;
pub use types::*;
pub use validation::*;
