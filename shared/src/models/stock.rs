//! Ledger keys and stock balances

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::PageParam;

/// Identity of one stock balance: (warehouse, location, goods, batch?, serial?)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockKey {
    pub warehouse_id: i64,
    pub location_id: i64,
    pub goods_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_no: Option<String>,
}

impl StockKey {
    pub fn new(warehouse_id: i64, location_id: i64, goods_id: i64) -> Self {
        Self {
            warehouse_id,
            location_id,
            goods_id,
            batch_no: None,
            serial_no: None,
        }
    }

    pub fn with_batch(mut self, batch_no: impl Into<String>) -> Self {
        self.batch_no = Some(batch_no.into());
        self
    }

    pub fn with_serial(mut self, serial_no: impl Into<String>) -> Self {
        self.serial_no = Some(serial_no.into());
        self
    }

    /// Builds a key, treating blank batch/serial strings as absent
    pub fn from_parts(
        warehouse_id: i64,
        location_id: i64,
        goods_id: i64,
        batch_no: Option<&str>,
        serial_no: Option<&str>,
    ) -> Self {
        let clean = |s: Option<&str>| {
            s.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            warehouse_id,
            location_id,
            goods_id,
            batch_no: clean(batch_no),
            serial_no: clean(serial_no),
        }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "w{}/l{}/g{}",
            self.warehouse_id, self.location_id, self.goods_id
        )?;
        if let Some(batch) = &self.batch_no {
            write!(f, "/b:{}", batch)?;
        }
        if let Some(serial) = &self.serial_no {
            write!(f, "/s:{}", serial)?;
        }
        Ok(())
    }
}

coded_enum! {
    /// Quality status of a balance
    #[derive(Default)]
    pub enum InventoryStatus ("inventory status") {
        #[default]
        Normal = 1 => "normal",
        Frozen = 2 => "frozen",
        PendingInspection = 3 => "pending-inspection",
        Damaged = 4 => "damaged",
    }
}

impl InventoryStatus {
    /// Frozen and damaged stock cannot be reserved
    pub fn is_lockable(self) -> bool {
        match self {
            InventoryStatus::Normal | InventoryStatus::PendingInspection => true,
            InventoryStatus::Frozen | InventoryStatus::Damaged => false,
        }
    }
}

/// Current on-hand and reserved quantity for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockBalance {
    #[serde(flatten)]
    pub key: StockKey,
    pub quantity: Decimal,
    pub lock_quantity: Decimal,
    /// Optimistic-lock token; 0 means the balance has never been written
    pub version: i64,
    pub status: InventoryStatus,
    pub production_date: Option<NaiveDate>,
    pub expire_date: Option<NaiveDate>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StockBalance {
    /// The lazily created balance for a key nobody has written yet
    pub fn zero(key: StockKey) -> Self {
        Self {
            key,
            quantity: Decimal::ZERO,
            lock_quantity: Decimal::ZERO,
            version: 0,
            status: InventoryStatus::Normal,
            production_date: None,
            expire_date: None,
            updated_at: None,
        }
    }

    pub fn available(&self) -> Decimal {
        self.quantity - self.lock_quantity
    }

    /// `quantity >= lockQuantity >= 0`
    pub fn is_consistent(&self) -> bool {
        self.lock_quantity >= Decimal::ZERO && self.quantity >= self.lock_quantity
    }

    /// A balance with nothing on hand and nothing locked is removed from the store
    pub fn is_empty(&self) -> bool {
        self.quantity.is_zero() && self.lock_quantity.is_zero()
    }

    /// Days until the batch expires (negative once expired)
    pub fn days_to_expiry(&self, today: NaiveDate) -> Option<i64> {
        self.expire_date.map(|d| (d - today).num_days())
    }
}

/// Balance page query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockPageQuery {
    pub page_no: Option<u32>,
    pub page_size: Option<u32>,
    pub warehouse_id: Option<i64>,
    pub location_id: Option<i64>,
    pub goods_id: Option<i64>,
    pub batch_no: Option<String>,
    pub status: Option<InventoryStatus>,
}

impl StockPageQuery {
    pub fn page(&self) -> PageParam {
        PageParam::from_query(self.page_no, self.page_size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusRequest {
    #[serde(flatten)]
    pub key: StockKey,
    pub status: InventoryStatus,
    pub remark: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_and_blank_parts() {
        let key = StockKey::from_parts(1, 2, 3, Some("  "), Some("SN-1"));
        assert_eq!(key.batch_no, None);
        assert_eq!(key.to_string(), "w1/l2/g3/s:SN-1");
        assert_eq!(StockKey::new(1, 2, 3).with_batch("B1").to_string(), "w1/l2/g3/b:B1");
    }

    #[test]
    fn test_zero_balance() {
        let balance = StockBalance::zero(StockKey::new(1, 1, 1));
        assert_eq!(balance.version, 0);
        assert!(balance.is_empty());
        assert!(balance.is_consistent());
        assert_eq!(balance.available(), Decimal::ZERO);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(InventoryStatus::try_from(2), Ok(InventoryStatus::Frozen));
        assert!(InventoryStatus::try_from(9).is_err());
        assert!(!InventoryStatus::Damaged.is_lockable());
        assert!(InventoryStatus::PendingInspection.is_lockable());

        let json = serde_json::to_string(&InventoryStatus::Damaged).unwrap();
        assert_eq!(json, "4");
        assert!(serde_json::from_str::<InventoryStatus>("7").is_err());
    }

    #[test]
    fn test_balance_serializes_flat_camel_case() {
        let mut balance = StockBalance::zero(StockKey::new(1, 2, 3).with_batch("B"));
        balance.quantity = Decimal::new(5, 0);
        let value = serde_json::to_value(&balance).unwrap();
        assert_eq!(value["warehouseId"], 1);
        assert_eq!(value["batchNo"], "B");
        assert_eq!(value["lockQuantity"], "0");
        assert_eq!(value["status"], 1);
    }
}
