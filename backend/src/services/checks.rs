//! Master-data checks shared by the document services

use rust_decimal::Decimal;

use shared::{
    line_amount, validate_positive_quantity, validate_price, validate_tracking, GoodsInfo,
    LocationInfo,
};

use crate::error::{AppError, AppResult, LineFailure, TransitionFailure, ValidateField};
use crate::external::MasterData;

pub async fn require_warehouse(master: &dyn MasterData, warehouse_id: i64) -> AppResult<()> {
    if !master.warehouse_exists(warehouse_id).await? {
        return Err(AppError::validation(
            "warehouseId",
            format!("Warehouse {} does not exist", warehouse_id),
        ));
    }
    Ok(())
}

/// Location must exist and sit inside `warehouse_id`
pub async fn require_location(
    master: &dyn MasterData,
    warehouse_id: i64,
    location_id: i64,
    field: &str,
) -> AppResult<LocationInfo> {
    match master.location(location_id).await? {
        Some(location) if location.warehouse_id == warehouse_id => Ok(location),
        Some(_) => Err(AppError::validation(
            field,
            format!(
                "Location {} does not belong to warehouse {}",
                location_id, warehouse_id
            ),
        )),
        None => Err(AppError::validation(
            field,
            format!("Location {} does not exist", location_id),
        )),
    }
}

pub async fn require_goods(master: &dyn MasterData, goods_id: i64) -> AppResult<GoodsInfo> {
    master.goods(goods_id).await?.ok_or_else(|| {
        AppError::validation("goodsId", format!("Goods {} does not exist", goods_id))
    })
}

/// The checks every stock-carrying line goes through on create and update
pub async fn check_line(
    master: &dyn MasterData,
    warehouse_id: i64,
    goods_id: i64,
    location_id: i64,
    batch_no: Option<&str>,
    serial_no: Option<&str>,
    quantity: Decimal,
) -> AppResult<GoodsInfo> {
    validate_positive_quantity(quantity).on_field("planQuantity")?;
    let goods = require_goods(master, goods_id).await?;
    validate_tracking(&goods, batch_no, serial_no).on_field("batchNo")?;
    require_location(master, warehouse_id, location_id, "locationId").await?;
    Ok(goods)
}

/// Validate a line's unit price and return its amount
pub fn priced_amount(quantity: Decimal, price: Decimal) -> AppResult<Decimal> {
    validate_price(price).on_field("price")?;
    line_amount(quantity, price).on_field("price")
}

/// Build the partial-failure error for a transition and log it
pub fn partial_failure(
    document_no: &str,
    action: &str,
    failures: Vec<LineFailure>,
) -> AppError {
    let failure = TransitionFailure {
        document_no: document_no.to_string(),
        action: action.to_string(),
        failures,
    };
    tracing::warn!(
        document_no,
        action,
        failed_items = ?failure.failed_item_ids(),
        "transition left document in prior status"
    );
    AppError::PartialFailure(failure)
}
