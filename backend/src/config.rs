//! Configuration management for the warehouse inventory ledger
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with WMS__ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Ledger storage and policy parameters
    pub ledger: LedgerConfig,

    /// Warning thresholds
    pub warning: WarningConfig,

    /// Wave generation group sizes
    pub picking: PickingConfig,

    /// Background snapshot job
    pub snapshot: SnapshotConfig,

    /// Log output
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; required when `ledger.storage = "postgres"`
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

/// Where balances and the movement log are kept
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    pub storage: StorageKind,

    /// Attempts per ledger call before giving up with ConcurrencyExhausted
    pub max_retries: u32,

    /// Document received total may reach plan total times this factor
    pub over_receipt_tolerance: Decimal,

    /// Lock source stock when a stock move starts executing
    pub lock_on_move_execute: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WarningConfig {
    /// Batches expiring within this many days are reported
    pub expiring_within_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PickingConfig {
    pub batch_wave_size: usize,
    pub zone_wave_size: usize,
    pub single_wave_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("WMS__ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("ledger.storage", "memory")?
            .set_default("ledger.max_retries", 3)?
            .set_default("ledger.over_receipt_tolerance", "1.0")?
            .set_default("ledger.lock_on_move_execute", true)?
            .set_default("warning.expiring_within_days", 7)?
            .set_default("picking.batch_wave_size", 20)?
            .set_default("picking.zone_wave_size", 10)?
            .set_default("picking.single_wave_size", 5)?
            .set_default("snapshot.enabled", true)?
            .set_default("snapshot.interval_secs", 86400)?
            .set_default("log.json", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (WMS__ prefix)
            .add_source(
                Environment::with_prefix("WMS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject policy values the services cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.max_retries == 0 {
            return Err(ConfigError::Message(
                "ledger.max_retries must be at least 1".into(),
            ));
        }
        shared::validate_tolerance(self.ledger.over_receipt_tolerance)
            .map_err(|msg| ConfigError::Message(format!("ledger.over_receipt_tolerance: {}", msg)))?;
        if self.picking.batch_wave_size == 0
            || self.picking.zone_wave_size == 0
            || self.picking.single_wave_size == 0
        {
            return Err(ConfigError::Message("wave sizes must be positive".into()));
        }
        if self.ledger.storage == StorageKind::Postgres && self.database.url.is_none() {
            return Err(ConfigError::Message(
                "database.url is required for postgres storage".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "test".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                min_connections: 2,
            },
            ledger: LedgerConfig::default(),
            warning: WarningConfig {
                expiring_within_days: 7,
            },
            picking: PickingConfig {
                batch_wave_size: 20,
                zone_wave_size: 10,
                single_wave_size: 5,
            },
            snapshot: SnapshotConfig {
                enabled: false,
                interval_secs: 86400,
            },
            log: LogConfig { json: false },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            storage: StorageKind::Memory,
            max_retries: 3,
            over_receipt_tolerance: Decimal::ONE,
            lock_on_move_execute: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ledger.max_retries, 3);
        assert_eq!(config.ledger.over_receipt_tolerance, Decimal::ONE);
    }

    #[test]
    fn test_rejects_bad_policy() {
        let mut config = Config::default();
        config.ledger.max_retries = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ledger.storage = StorageKind::Postgres;
        assert!(config.validate().is_err());
    }
}
