//! Database operations for the Almacén `PostgreSQL` store.
//!
//! ## Tables
//!
//! - `users` - accounts and roles
//! - `products` - catalog, prices and live stock
//! - `orders` / `order_items` - committed orders with price snapshots
//! - `stock_alerts` - append-only restock alert history
//! - `sessions` - hashed refresh-token sessions
//! - `push_subscriptions` - Web Push delivery credentials
//!
//! # Migrations
//!
//! Migrations live in `crates/server/migrations/` and are embedded via
//! `sqlx::migrate!`; the server applies them on startup.
//!
//! All modules expose free async functions taking an explicit executor
//! (`&PgPool` for standalone statements, `&mut PgConnection` for statements
//! that must join an open transaction). Nothing reaches for an ambient pool.

pub mod orders;
pub mod products;
pub mod push_subscriptions;
pub mod sessions;
pub mod stock_alerts;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate email or barcode).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
