//! Master-data collaborator
//!
//! Warehouses, locations, goods, suppliers, customers and operator names are
//! owned by other services. The ledger only reads the handful of fields it
//! needs through [`MasterData`].

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use rust_decimal::Decimal;

use shared::{GoodsInfo, HierarchyNode, LocationInfo};

use crate::error::AppResult;

#[async_trait]
pub trait MasterData: Send + Sync {
    async fn warehouse_exists(&self, warehouse_id: i64) -> AppResult<bool>;

    async fn location(&self, location_id: i64) -> AppResult<Option<LocationInfo>>;

    async fn locations_in_warehouse(&self, warehouse_id: i64) -> AppResult<Vec<LocationInfo>>;

    async fn goods(&self, goods_id: i64) -> AppResult<Option<GoodsInfo>>;

    async fn all_goods(&self) -> AppResult<Vec<GoodsInfo>>;

    /// Flat (id, parent id) list of goods categories
    async fn goods_categories(&self) -> AppResult<Vec<HierarchyNode>>;

    async fn supplier_exists(&self, supplier_id: i64) -> AppResult<bool>;

    async fn customer_exists(&self, customer_id: i64) -> AppResult<bool>;

    /// Display name for an operator id, if the identity service knows it
    async fn operator_name(&self, operator_id: i64) -> AppResult<Option<String>>;
}

/// Fixed in-memory master data
#[derive(Debug, Clone, Default)]
pub struct StaticMasterData {
    warehouses: BTreeSet<i64>,
    locations: BTreeMap<i64, LocationInfo>,
    goods: BTreeMap<i64, GoodsInfo>,
    categories: Vec<HierarchyNode>,
    suppliers: BTreeSet<i64>,
    customers: BTreeSet<i64>,
    operators: BTreeMap<i64, String>,
}

impl StaticMasterData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warehouse(mut self, warehouse_id: i64) -> Self {
        self.warehouses.insert(warehouse_id);
        self
    }

    pub fn with_location(mut self, location_id: i64, warehouse_id: i64, area_id: i64) -> Self {
        self.warehouses.insert(warehouse_id);
        self.locations.insert(
            location_id,
            LocationInfo {
                id: location_id,
                warehouse_id,
                area_id,
            },
        );
        self
    }

    pub fn with_goods(mut self, goods: GoodsInfo) -> Self {
        self.goods.insert(goods.id, goods);
        self
    }

    pub fn with_category(mut self, category_id: i64, parent_id: Option<i64>) -> Self {
        self.categories.push(HierarchyNode {
            id: category_id,
            parent_id,
        });
        self
    }

    pub fn with_supplier(mut self, supplier_id: i64) -> Self {
        self.suppliers.insert(supplier_id);
        self
    }

    pub fn with_customer(mut self, customer_id: i64) -> Self {
        self.customers.insert(customer_id);
        self
    }

    pub fn with_operator(mut self, operator_id: i64, name: impl Into<String>) -> Self {
        self.operators.insert(operator_id, name.into());
        self
    }

    /// A small warehouse used when no master-data service is wired in
    pub fn demo() -> Self {
        let goods = |id: i64, sku: &str, name: &str, safety: i64, need_batch: bool| GoodsInfo {
            id,
            sku: sku.to_string(),
            name: name.to_string(),
            unit: "pcs".to_string(),
            category_id: Some(if need_batch { 2 } else { 1 }),
            safety_stock: Decimal::from(safety),
            need_batch,
            need_serial: false,
        };

        Self::new()
            .with_location(101, 1, 11)
            .with_location(102, 1, 11)
            .with_location(103, 1, 12)
            .with_location(201, 2, 21)
            .with_category(1, None)
            .with_category(2, Some(1))
            .with_goods(goods(1, "SKU-0001", "Standard carton", 10, false))
            .with_goods(goods(2, "SKU-0002", "Dated consumable", 5, true))
            .with_supplier(1)
            .with_customer(1)
            .with_operator(1, "admin")
    }
}

#[async_trait]
impl MasterData for StaticMasterData {
    async fn warehouse_exists(&self, warehouse_id: i64) -> AppResult<bool> {
        Ok(self.warehouses.contains(&warehouse_id))
    }

    async fn location(&self, location_id: i64) -> AppResult<Option<LocationInfo>> {
        Ok(self.locations.get(&location_id).copied())
    }

    async fn locations_in_warehouse(&self, warehouse_id: i64) -> AppResult<Vec<LocationInfo>> {
        Ok(self
            .locations
            .values()
            .filter(|l| l.warehouse_id == warehouse_id)
            .copied()
            .collect())
    }

    async fn goods(&self, goods_id: i64) -> AppResult<Option<GoodsInfo>> {
        Ok(self.goods.get(&goods_id).cloned())
    }

    async fn all_goods(&self) -> AppResult<Vec<GoodsInfo>> {
        Ok(self.goods.values().cloned().collect())
    }

    async fn goods_categories(&self) -> AppResult<Vec<HierarchyNode>> {
        Ok(self.categories.clone())
    }

    async fn supplier_exists(&self, supplier_id: i64) -> AppResult<bool> {
        Ok(self.suppliers.contains(&supplier_id))
    }

    async fn customer_exists(&self, customer_id: i64) -> AppResult<bool> {
        Ok(self.customers.contains(&customer_id))
    }

    async fn operator_name(&self, operator_id: i64) -> AppResult<Option<String>> {
        Ok(self.operators.get(&operator_id).cloned())
    }
}
