//! Validation utilities for ledger documents
//!
//! Every check here runs before any ledger call, so a failure never leaves a
//! partially applied document behind.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::GoodsInfo;

// ============================================================================
// Quantity Validations
// ============================================================================

/// Decimal places a stored quantity or price may carry (NUMERIC(18,4))
pub const STORED_DECIMAL_SCALE: u32 = 4;

/// Largest magnitude a stored quantity or price may reach: 14 integer digits
pub fn max_stored_decimal() -> Decimal {
    Decimal::new(999_999_999_999_999_999, STORED_DECIMAL_SCALE)
}

/// Validate a value fits the stored decimal column without rounding
pub fn validate_stored_decimal(value: Decimal) -> Result<(), &'static str> {
    if value.normalize().scale() > STORED_DECIMAL_SCALE {
        return Err("Value cannot have more than 4 decimal places");
    }
    if value.abs() > max_stored_decimal() {
        return Err("Value cannot have more than 14 integer digits");
    }
    Ok(())
}

/// Validate a planned or moved quantity is strictly positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    validate_stored_decimal(quantity)
}

/// Validate a counted or picked quantity is not negative
pub fn validate_non_negative_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity < Decimal::ZERO {
        return Err("Quantity cannot be negative");
    }
    validate_stored_decimal(quantity)
}

/// Validate a unit price is not negative
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    validate_stored_decimal(price)
}

/// Line amount `quantity * price`, rounded to the stored scale
pub fn line_amount(quantity: Decimal, price: Decimal) -> Result<Decimal, &'static str> {
    let amount = quantity
        .checked_mul(price)
        .map(|a| a.round_dp(STORED_DECIMAL_SCALE))
        .ok_or("Line amount is too large")?;
    if amount.abs() > max_stored_decimal() {
        return Err("Line amount is too large");
    }
    Ok(amount)
}

/// Validate receipt figures for one inbound line: received = qualified + unqualified
pub fn validate_receipt(
    received: Decimal,
    qualified: Decimal,
    unqualified: Decimal,
) -> Result<(), &'static str> {
    if received < Decimal::ZERO || qualified < Decimal::ZERO || unqualified < Decimal::ZERO {
        return Err("Receipt quantities cannot be negative");
    }
    validate_stored_decimal(received)?;
    validate_stored_decimal(qualified)?;
    validate_stored_decimal(unqualified)?;
    if qualified.checked_add(unqualified) != Some(received) {
        return Err("Received quantity must equal qualified plus unqualified quantity");
    }
    Ok(())
}

/// Validate the document total received stays within plan * tolerance
pub fn validate_over_receipt(
    total_received: Decimal,
    total_planned: Decimal,
    tolerance: Decimal,
) -> Result<(), &'static str> {
    let allowed = total_planned.checked_mul(tolerance).unwrap_or(Decimal::MAX);
    if total_received > allowed {
        return Err("Received quantity exceeds the planned quantity allowed by tolerance");
    }
    Ok(())
}

/// Validate an over-receipt tolerance factor (1.0 means no over-receipt)
pub fn validate_tolerance(tolerance: Decimal) -> Result<(), &'static str> {
    if tolerance < Decimal::ONE {
        return Err("Over-receipt tolerance must be at least 1.0");
    }
    Ok(())
}

/// Validate a picked quantity: 0 <= actual <= plan
pub fn validate_pick(actual: Decimal, plan: Decimal) -> Result<(), &'static str> {
    validate_non_negative_quantity(actual)?;
    if actual > plan {
        return Err("Picked quantity cannot exceed planned quantity");
    }
    Ok(())
}

// ============================================================================
// Tracking Validations
// ============================================================================

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Validate batch/serial numbers are present when the goods master requires them
pub fn validate_tracking(
    goods: &GoodsInfo,
    batch_no: Option<&str>,
    serial_no: Option<&str>,
) -> Result<(), &'static str> {
    if goods.need_batch && is_blank(batch_no) {
        return Err("Batch number is required for this goods");
    }
    if goods.need_serial && is_blank(serial_no) {
        return Err("Serial number is required for this goods");
    }
    Ok(())
}

/// Validate production date is not after expiry date
pub fn validate_batch_dates(
    production_date: Option<NaiveDate>,
    expire_date: Option<NaiveDate>,
) -> Result<(), &'static str> {
    if let (Some(produced), Some(expires)) = (production_date, expire_date) {
        if produced > expires {
            return Err("Production date cannot be after expire date");
        }
    }
    Ok(())
}

/// Validate a move relocates stock rather than moving it onto itself
pub fn validate_distinct_locations(from: i64, to: i64) -> Result<(), &'static str> {
    if from == to {
        return Err("Source and target location must differ");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn goods(need_batch: bool, need_serial: bool) -> GoodsInfo {
        GoodsInfo {
            id: 1,
            sku: "SKU-1".into(),
            name: "Widget".into(),
            unit: "pcs".into(),
            category_id: None,
            safety_stock: Decimal::ZERO,
            need_batch,
            need_serial,
        }
    }

    // ========================================================================
    // Quantity Validation Tests
    // ========================================================================

    #[test]
    fn test_positive_quantity() {
        assert!(validate_positive_quantity(dec("0.001")).is_ok());
        assert!(validate_positive_quantity(dec("0")).is_err());
        assert!(validate_positive_quantity(dec("-1")).is_err());
    }

    #[test]
    fn test_stored_decimal_domain() {
        assert!(validate_stored_decimal(dec("99999999999999.9999")).is_ok());
        assert!(validate_stored_decimal(dec("100000000000000")).is_err());
        assert!(validate_stored_decimal(dec("-100000000000000")).is_err());
        assert!(validate_stored_decimal(dec("1.00001")).is_err());
        // trailing zeros do not count towards the scale
        assert!(validate_stored_decimal(dec("1.500000")).is_ok());
        assert!(validate_positive_quantity(dec("100000000000000000")).is_err());
        assert!(validate_non_negative_quantity(dec("0.00001")).is_err());
    }

    #[test]
    fn test_price_and_line_amount() {
        assert!(validate_price(Decimal::ZERO).is_ok());
        assert!(validate_price(dec("-0.01")).is_err());
        assert!(validate_price(dec("100000000000000000")).is_err());
        assert_eq!(line_amount(dec("4"), dec("2.5")), Ok(dec("10")));
        assert_eq!(line_amount(dec("0.0001"), dec("0.0001")), Ok(Decimal::ZERO));
        assert!(line_amount(dec("99999999999999"), dec("99999999999999")).is_err());
    }

    #[test]
    fn test_receipt_must_balance() {
        assert!(validate_receipt(dec("100"), dec("90"), dec("10")).is_ok());
        assert!(validate_receipt(dec("100"), dec("90"), dec("9")).is_err());
        assert!(validate_receipt(dec("0"), dec("0"), dec("0")).is_ok());
        assert!(validate_receipt(dec("-1"), dec("-1"), dec("0")).is_err());
    }

    #[test]
    fn test_over_receipt_tolerance() {
        assert!(validate_over_receipt(dec("100"), dec("100"), Decimal::ONE).is_ok());
        assert!(validate_over_receipt(dec("101"), dec("100"), Decimal::ONE).is_err());
        assert!(validate_over_receipt(dec("105"), dec("100"), dec("1.05")).is_ok());
        assert!(validate_tolerance(dec("0.9")).is_err());
        assert!(validate_tolerance(Decimal::ONE).is_ok());
    }

    #[test]
    fn test_pick_bounds() {
        assert!(validate_pick(dec("10"), dec("10")).is_ok());
        assert!(validate_pick(dec("0"), dec("10")).is_ok());
        assert!(validate_pick(dec("11"), dec("10")).is_err());
        assert!(validate_pick(dec("-1"), dec("10")).is_err());
    }

    // ========================================================================
    // Tracking Validation Tests
    // ========================================================================

    #[test]
    fn test_tracking_requirements() {
        assert!(validate_tracking(&goods(false, false), None, None).is_ok());
        assert!(validate_tracking(&goods(true, false), None, None).is_err());
        assert!(validate_tracking(&goods(true, false), Some("  "), None).is_err());
        assert!(validate_tracking(&goods(true, false), Some("B1"), None).is_ok());
        assert!(validate_tracking(&goods(false, true), Some("B1"), None).is_err());
        assert!(validate_tracking(&goods(true, true), Some("B1"), Some("S1")).is_ok());
    }

    #[test]
    fn test_batch_dates() {
        let early = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let late = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(validate_batch_dates(Some(early), Some(late)).is_ok());
        assert!(validate_batch_dates(Some(late), Some(early)).is_err());
        assert!(validate_batch_dates(None, Some(early)).is_ok());
    }

    #[test]
    fn test_distinct_locations() {
        assert!(validate_distinct_locations(1, 2).is_ok());
        assert!(validate_distinct_locations(3, 3).is_err());
    }
}
