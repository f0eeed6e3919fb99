//! Money helpers for the store's single operating currency.
//!
//! The store prices everything in Uruguayan pesos. Amounts are carried as
//! [`Decimal`] end to end (the database column is `NUMERIC(12,2)`), so no
//! float arithmetic ever touches a price.

use rust_decimal::Decimal;

/// ISO 4217 code of the store's single operating currency.
pub const STORE_CURRENCY: &str = "UYU";

/// Compute a line subtotal from a quantity and a unit-price snapshot.
///
/// Decimal multiplication is exact for the precisions involved here, so the
/// order total computed as the sum of these subtotals is exact as well.
#[must_use]
pub fn line_subtotal(quantity: i32, unit_price: Decimal) -> Decimal {
    Decimal::from(quantity) * unit_price
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtotal_is_exact() {
        // 3 x 19.99 = 59.97
        assert_eq!(line_subtotal(3, Decimal::new(1999, 2)), Decimal::new(5997, 2));
        // 2 x 100.00 = 200.00
        assert_eq!(line_subtotal(2, Decimal::new(10000, 2)), Decimal::new(20000, 2));
    }

    #[test]
    fn subtotal_of_zero_quantity_is_zero() {
        assert_eq!(line_subtotal(0, Decimal::new(4550, 2)), Decimal::ZERO);
    }
}
