//! Database operations for the append-only stock alert history.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use almacen_core::{ProductId, StockAlertId, StockLevel};

use super::RepositoryError;
use crate::models::{StockAlert, StockAlertEntry};

#[derive(Debug, sqlx::FromRow)]
struct StockAlertRow {
    id: i32,
    product_id: i32,
    stock_at_event: i32,
    level: StockLevel,
    created_at: DateTime<Utc>,
}

impl From<StockAlertRow> for StockAlert {
    fn from(row: StockAlertRow) -> Self {
        Self {
            id: StockAlertId::new(row.id),
            product_id: ProductId::new(row.product_id),
            stock_at_event: row.stock_at_event,
            level: row.level,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockAlertEntryRow {
    id: i32,
    product_id: i32,
    product_name: String,
    stock_at_event: i32,
    level: StockLevel,
    created_at: DateTime<Utc>,
}

impl From<StockAlertEntryRow> for StockAlertEntry {
    fn from(row: StockAlertEntryRow) -> Self {
        Self {
            id: StockAlertId::new(row.id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            stock_at_event: row.stock_at_event,
            level: row.level,
            created_at: row.created_at,
        }
    }
}

/// Record one alert inside an open transaction.
///
/// Alert rows are historical record; they are never updated or deleted by
/// normal flow.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert(
    conn: &mut PgConnection,
    product_id: ProductId,
    stock_at_event: i32,
    level: StockLevel,
) -> Result<StockAlert, RepositoryError> {
    let row = sqlx::query_as::<_, StockAlertRow>(
        r"
        INSERT INTO stock_alerts (product_id, stock_at_event, level)
        VALUES ($1, $2, $3)
        RETURNING id, product_id, stock_at_event, level, created_at
        ",
    )
    .bind(product_id.as_i32())
    .bind(stock_at_event)
    .bind(level)
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}

/// List alert history, critical first, newest first within a level.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list(pool: &PgPool, limit: i64) -> Result<Vec<StockAlertEntry>, RepositoryError> {
    let rows = sqlx::query_as::<_, StockAlertEntryRow>(
        r"
        SELECT
            a.id, a.product_id, p.name AS product_name,
            a.stock_at_event, a.level, a.created_at
        FROM stock_alerts a
        JOIN products p ON p.id = a.product_id
        ORDER BY
            CASE a.level WHEN 'critical' THEN 0 ELSE 1 END,
            a.created_at DESC
        LIMIT $1
        ",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}
