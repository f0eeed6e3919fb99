//! Status enums for products, orders, and stock alerts.
//!
//! [`OrderStatus`] owns the order state machine: the transition table lives
//! here and nowhere else. [`StockLevel`] owns the low-stock threshold rule
//! shared by the order-driven decrement and the manual stock adjustment.

use serde::{Deserialize, Serialize};

/// Catalog visibility of a product.
///
/// Inactive products remain readable by staff but cannot be ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "product_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
}

/// Lifecycle status of an order.
///
/// ```text
/// pending -> in_progress -> ready      (terminal)
///    \            \
///     `------------`-----> cancelled   (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    InProgress,
    Ready,
    Cancelled,
}

impl OrderStatus {
    /// Whether the state machine allows moving from `self` to `to`.
    ///
    /// Re-applying the current status is not a transition; callers treat it
    /// as an idempotent no-op before consulting this table.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::InProgress | Self::Cancelled)
                | (Self::InProgress, Self::Ready | Self::Cancelled)
        )
    }

    /// Terminal states admit no further transitions and may be archived.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Ready => write!(f, "ready"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "ready" => Ok(Self::Ready),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Number of units at or below which a stock alert is recorded.
pub const RESTOCK_THRESHOLD: i32 = 3;

/// Severity of a stock alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "alert_level", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum StockLevel {
    Low,
    Critical,
}

impl StockLevel {
    /// Evaluate the resulting stock of a product against the restock rule.
    ///
    /// This is the single source of truth for both the order-driven
    /// decrement and the manual stock adjustment: 0 units is `Critical`,
    /// 1..=3 is `Low`, anything above the threshold needs no alert.
    #[must_use]
    pub const fn evaluate(stock: i32) -> Option<Self> {
        if stock <= 0 {
            Some(Self::Critical)
        } else if stock <= RESTOCK_THRESHOLD {
            Some(Self::Low)
        } else {
            None
        }
    }
}

impl std::fmt::Display for StockLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::InProgress,
        OrderStatus::Ready,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn transition_table_is_exact() {
        let allowed = [
            (OrderStatus::Pending, OrderStatus::InProgress),
            (OrderStatus::Pending, OrderStatus::Cancelled),
            (OrderStatus::InProgress, OrderStatus::Ready),
            (OrderStatus::InProgress, OrderStatus::Cancelled),
        ];

        for from in ALL {
            for to in ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "{from} -> {to} should be {expected}"
                );
            }
        }
    }

    #[test]
    fn terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::InProgress.is_terminal());
        assert!(OrderStatus::Ready.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn status_round_trips_through_display() {
        for status in ALL {
            let parsed: OrderStatus = status.to_string().parse().expect("parse");
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn stock_level_boundaries() {
        assert_eq!(StockLevel::evaluate(0), Some(StockLevel::Critical));
        assert_eq!(StockLevel::evaluate(1), Some(StockLevel::Low));
        assert_eq!(StockLevel::evaluate(3), Some(StockLevel::Low));
        assert_eq!(StockLevel::evaluate(4), None);
        assert_eq!(StockLevel::evaluate(100), None);
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_string(&OrderStatus::InProgress).expect("serialize");
        assert_eq!(json, "\"in_progress\"");
        let level = serde_json::to_string(&StockLevel::Critical).expect("serialize");
        assert_eq!(level, "\"critical\"");
    }
}
