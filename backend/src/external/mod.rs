//! External collaborators

pub mod master_data;

pub use master_data::{MasterData, StaticMasterData};
