//! Stock alert history models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use almacen_core::{ProductId, StockAlertId, StockLevel};

/// One append-only restock alert record.
#[derive(Debug, Clone, Serialize)]
pub struct StockAlert {
    pub id: StockAlertId,
    pub product_id: ProductId,
    pub stock_at_event: i32,
    pub level: StockLevel,
    pub created_at: DateTime<Utc>,
}

/// History listing row: alert plus the current product name.
#[derive(Debug, Clone, Serialize)]
pub struct StockAlertEntry {
    pub id: StockAlertId,
    pub product_id: ProductId,
    pub product_name: String,
    pub stock_at_event: i32,
    pub level: StockLevel,
    pub created_at: DateTime<Utc>,
}
