//! Database operations for orders and order items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use almacen_core::{OrderId, OrderItemId, OrderStatus, ProductId, UserId};

use super::RepositoryError;
use crate::models::{DeliveryInfo, NewOrderItem, Order, OrderItem, OrderSummary, OrderWithItems};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    status: OrderStatus,
    total: Decimal,
    currency: String,
    recipient_name: Option<String>,
    recipient_phone: Option<String>,
    delivery_address: Option<String>,
    notes: Option<String>,
    archived: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            status: row.status,
            total: row.total,
            currency: row.currency.trim_end().to_string(),
            recipient_name: row.recipient_name,
            recipient_phone: row.recipient_phone,
            delivery_address: row.delivery_address,
            notes: row.notes,
            archived: row.archived,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: Option<i32>,
    name_snapshot: String,
    unit_price_snapshot: Decimal,
    quantity: i32,
    subtotal: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: row.product_id.map(ProductId::new),
            name_snapshot: row.name_snapshot,
            unit_price_snapshot: row.unit_price_snapshot,
            quantity: row.quantity,
            subtotal: row.subtotal,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderSummaryRow {
    id: i32,
    user_id: i32,
    user_email: String,
    status: OrderStatus,
    total: Decimal,
    currency: String,
    archived: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderSummaryRow> for OrderSummary {
    fn from(row: OrderSummaryRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            user_email: row.user_email,
            status: row.status,
            total: row.total,
            currency: row.currency.trim_end().to_string(),
            archived: row.archived,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ORDER_COLUMNS: &str = "\
    id, user_id, status, total, currency, recipient_name, recipient_phone, \
    delivery_address, notes, archived, created_at, updated_at";

/// Insert an order header inside an open transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
#[allow(clippy::too_many_arguments)]
pub async fn insert_order(
    conn: &mut PgConnection,
    user_id: UserId,
    total: Decimal,
    currency: &str,
    delivery: &DeliveryInfo,
    created_by_ip: Option<&str>,
    created_by_user_agent: Option<&str>,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "INSERT INTO orders
            (user_id, status, total, currency,
             recipient_name, recipient_phone, delivery_address, notes,
             created_by_ip, created_by_user_agent)
         VALUES ($1, 'pending', $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(user_id.as_i32())
    .bind(total)
    .bind(currency)
    .bind(delivery.recipient_name.as_deref())
    .bind(delivery.recipient_phone.as_deref())
    .bind(delivery.delivery_address.as_deref())
    .bind(delivery.notes.as_deref())
    .bind(created_by_ip)
    .bind(created_by_user_agent)
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}

/// Bulk-insert the items of an order inside the same transaction as its
/// header.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_items(
    conn: &mut PgConnection,
    order_id: OrderId,
    items: &[NewOrderItem],
) -> Result<Vec<OrderItem>, RepositoryError> {
    let product_ids: Vec<i32> = items.iter().map(|i| i.product_id.as_i32()).collect();
    let names: Vec<String> = items.iter().map(|i| i.name_snapshot.clone()).collect();
    let prices: Vec<Decimal> = items.iter().map(|i| i.unit_price_snapshot).collect();
    let quantities: Vec<i32> = items.iter().map(|i| i.quantity).collect();
    let subtotals: Vec<Decimal> = items.iter().map(|i| i.subtotal).collect();

    let rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        INSERT INTO order_items
            (order_id, product_id, name_snapshot, unit_price_snapshot, quantity, subtotal)
        SELECT $1, pid, name, price, qty, sub
        FROM unnest($2::int4[], $3::text[], $4::numeric[], $5::int4[], $6::numeric[])
            AS t (pid, name, price, qty, sub)
        RETURNING id, order_id, product_id, name_snapshot, unit_price_snapshot,
                  quantity, subtotal
        ",
    )
    .bind(order_id.as_i32())
    .bind(&product_ids)
    .bind(&names)
    .bind(&prices)
    .bind(&quantities)
    .bind(&subtotals)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// List a customer's own orders, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_user(pool: &PgPool, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id.as_i32())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Staff listing of all orders, optionally filtered by status.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_all(
    pool: &PgPool,
    status: Option<OrderStatus>,
) -> Result<Vec<OrderSummary>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderSummaryRow>(
        r"
        SELECT
            o.id, o.user_id, u.email AS user_email,
            o.status, o.total, o.currency, o.archived, o.created_at, o.updated_at
        FROM orders o
        JOIN users u ON u.id = o.user_id
        WHERE ($1::order_status IS NULL OR o.status = $1)
        ORDER BY o.created_at DESC
        LIMIT 200
        ",
    )
    .bind(status)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Fetch an order header.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(pool: &PgPool, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
    ))
    .bind(id.as_i32())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Into::into))
}

/// Fetch an order with its items.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn get_with_items(
    pool: &PgPool,
    id: OrderId,
) -> Result<Option<OrderWithItems>, RepositoryError> {
    let Some(order) = get(pool, id).await? else {
        return Ok(None);
    };

    let rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT id, order_id, product_id, name_snapshot, unit_price_snapshot,
               quantity, subtotal
        FROM order_items
        WHERE order_id = $1
        ORDER BY id ASC
        ",
    )
    .bind(id.as_i32())
    .fetch_all(pool)
    .await?;

    Ok(Some(OrderWithItems {
        order,
        items: rows.into_iter().map(Into::into).collect(),
    }))
}

/// Apply a guarded status transition.
///
/// The `WHERE status = $2` guard makes the update a compare-and-swap: a
/// concurrent transition that already moved the order away from `from`
/// leaves this statement affecting zero rows, and the caller re-reads.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn update_status(
    pool: &PgPool,
    id: OrderId,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<bool, RepositoryError> {
    let result =
        sqlx::query("UPDATE orders SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2")
            .bind(id.as_i32())
            .bind(from)
            .bind(to)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark an order as archived. Idempotent at the storage level.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_archived(pool: &PgPool, id: OrderId) -> Result<bool, RepositoryError> {
    let result = sqlx::query("UPDATE orders SET archived = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(id.as_i32())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
