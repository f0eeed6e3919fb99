//! Integration tests for the stock threshold rule and order money math.

use almacen_core::{RESTOCK_THRESHOLD, StockLevel, line_subtotal};
use rust_decimal::Decimal;

// =============================================================================
// Threshold Rule
// =============================================================================

#[test]
fn zero_stock_is_critical() {
    assert_eq!(StockLevel::evaluate(0), Some(StockLevel::Critical));
}

#[test]
fn one_through_three_is_low() {
    for stock in 1..=RESTOCK_THRESHOLD {
        assert_eq!(StockLevel::evaluate(stock), Some(StockLevel::Low), "{stock}");
    }
}

#[test]
fn above_threshold_needs_no_alert() {
    assert_eq!(StockLevel::evaluate(RESTOCK_THRESHOLD + 1), None);
    assert_eq!(StockLevel::evaluate(250), None);
}

#[test]
fn alert_levels_serialize_lowercase() {
    assert_eq!(
        serde_json::to_string(&StockLevel::Critical).expect("serialize"),
        "\"critical\""
    );
    assert_eq!(
        serde_json::to_string(&StockLevel::Low).expect("serialize"),
        "\"low\""
    );
}

// =============================================================================
// Money Math
// =============================================================================

#[test]
fn order_total_for_a_two_unit_cart() {
    // Cart [{product: 10, qty: 2}] at price 100.00 totals exactly 200.00.
    let price = Decimal::new(10000, 2);
    assert_eq!(line_subtotal(2, price), Decimal::new(20000, 2));
}

#[test]
fn totals_are_exact_over_many_lines() {
    // 0.10 summed 100 times is exactly 10.00 - no float drift.
    let unit = Decimal::new(10, 2);
    let total: Decimal = (0..100).map(|_| line_subtotal(1, unit)).sum();
    assert_eq!(total, Decimal::new(1000, 2));
}
