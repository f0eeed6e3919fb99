//! Database operations for the product catalog and live stock.
//!
//! The conditional bulk decrement in [`decrement_stock`] is the race-safety
//! primitive for concurrent order placement: each row only decrements where
//! sufficient stock still exists at decrement time, and the caller compares
//! the decremented-row count against the requested product count.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use almacen_core::{ProductId, ProductStatus};

use super::RepositoryError;
use crate::models::{Product, ProductSnapshot};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    price: Decimal,
    original_price: Option<Decimal>,
    stock: i32,
    status: ProductStatus,
    barcode: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
    description: Option<String>,
    has_image: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            price: row.price,
            original_price: row.original_price,
            stock: row.stock,
            status: row.status,
            barcode: row.barcode,
            category: row.category,
            subcategory: row.subcategory,
            description: row.description,
            has_image: row.has_image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    id: i32,
    name: String,
    price: Decimal,
    status: ProductStatus,
    stock: i32,
}

impl From<SnapshotRow> for ProductSnapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            price: row.price,
            status: row.status,
            stock: row.stock,
        }
    }
}

/// Resulting stock of one decremented row.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct StockRow {
    pub id: i32,
    pub stock: i32,
}

const PRODUCT_COLUMNS: &str = "\
    id, name, price, original_price, stock, status, barcode, category, \
    subcategory, description, (image IS NOT NULL) AS has_image, \
    created_at, updated_at";

/// List products visible to customers (active only).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_active(pool: &PgPool) -> Result<Vec<Product>, RepositoryError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE status = 'active' ORDER BY name ASC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// List the full catalog (staff view), newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_all(pool: &PgPool) -> Result<Vec<Product>, RepositoryError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id DESC LIMIT 200"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Get one product by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(pool: &PgPool, id: ProductId) -> Result<Option<Product>, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id.as_i32())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Into::into))
}

/// Fetch the stored image bytes and MIME type for a product.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_image(
    pool: &PgPool,
    id: ProductId,
) -> Result<Option<(Vec<u8>, String)>, RepositoryError> {
    let row = sqlx::query_as::<_, (Option<Vec<u8>>, Option<String>)>(
        "SELECT image, image_mime FROM products WHERE id = $1",
    )
    .bind(id.as_i32())
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(|(image, mime)| {
        let image = image?;
        let mime = mime.unwrap_or_else(|| "application/octet-stream".to_string());
        (!image.is_empty()).then_some((image, mime))
    }))
}

/// Read name, price, status and stock for a set of products inside an open
/// transaction. Prices for order placement come from here, never from the
/// client.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn snapshots(
    conn: &mut PgConnection,
    ids: &[i32],
) -> Result<Vec<ProductSnapshot>, RepositoryError> {
    let rows = sqlx::query_as::<_, SnapshotRow>(
        "SELECT id, name, price, status, stock FROM products WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Conditionally decrement stock for every requested product in one
/// statement.
///
/// Each row is decremented only where the product is active and holds at
/// least the requested quantity *at decrement time*. Returns the resulting
/// stock of every row that was actually decremented; the caller must verify
/// that the returned row count equals `ids.len()` and roll back otherwise.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    ids: &[i32],
    quantities: &[i32],
) -> Result<Vec<StockRow>, RepositoryError> {
    let rows = sqlx::query_as::<_, StockRow>(
        r"
        UPDATE products AS p
        SET stock = p.stock - d.qty, updated_at = NOW()
        FROM (SELECT unnest($1::int4[]) AS id, unnest($2::int4[]) AS qty) AS d
        WHERE p.id = d.id
          AND p.status = 'active'
          AND p.stock >= d.qty
        RETURNING p.id, p.stock
        ",
    )
    .bind(ids)
    .bind(quantities)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Read the current stock of a single product inside an open transaction.
///
/// Used to report the available quantity after a decrement shortfall.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn current_stock(
    conn: &mut PgConnection,
    id: ProductId,
) -> Result<Option<i32>, RepositoryError> {
    let row = sqlx::query_as::<_, (i32,)>("SELECT stock FROM products WHERE id = $1")
        .bind(id.as_i32())
        .fetch_optional(conn)
        .await?;

    Ok(row.map(|(stock,)| stock))
}

/// Set the absolute stock of a product inside an open transaction, returning
/// the new value.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn set_stock(
    conn: &mut PgConnection,
    id: ProductId,
    stock: i32,
) -> Result<Option<i32>, RepositoryError> {
    let row = sqlx::query_as::<_, (i32,)>(
        "UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1 RETURNING stock",
    )
    .bind(id.as_i32())
    .bind(stock)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(|(stock,)| stock))
}

/// Apply the scalar fields of a product patch.
///
/// Absent fields keep their stored value via `COALESCE`; the image is
/// handled separately by [`set_image`] / [`clear_image`]. Returns `false`
/// when the product does not exist.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` on a duplicate barcode,
/// `RepositoryError::Database` for other database errors.
#[allow(clippy::too_many_arguments)]
pub async fn update_fields(
    pool: &PgPool,
    id: ProductId,
    name: Option<&str>,
    price: Option<Decimal>,
    original_price: Option<Decimal>,
    status: Option<ProductStatus>,
    barcode: Option<&str>,
    category: Option<&str>,
    subcategory: Option<&str>,
    description: Option<&str>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE products
        SET
            name = COALESCE($2, name),
            price = COALESCE($3, price),
            original_price = COALESCE($4, original_price),
            status = COALESCE($5, status),
            barcode = COALESCE($6, barcode),
            category = COALESCE($7, category),
            subcategory = COALESCE($8, subcategory),
            description = COALESCE($9, description),
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id.as_i32())
    .bind(name)
    .bind(price)
    .bind(original_price)
    .bind(status)
    .bind(barcode)
    .bind(category)
    .bind(subcategory)
    .bind(description)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict("barcode is already in use".to_string());
        }
        RepositoryError::Database(e)
    })?;

    Ok(result.rows_affected() > 0)
}

/// Store a product image. Returns `false` when the product does not exist.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn set_image(
    pool: &PgPool,
    id: ProductId,
    image: &[u8],
    mime: &str,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE products SET image = $2, image_mime = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(id.as_i32())
    .bind(image)
    .bind(mime)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove a product image. Returns `false` when the product does not exist.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn clear_image(pool: &PgPool, id: ProductId) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE products SET image = NULL, image_mime = NULL, updated_at = NOW() WHERE id = $1",
    )
    .bind(id.as_i32())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
