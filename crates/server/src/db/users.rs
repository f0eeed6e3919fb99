//! Database operations for user accounts.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use almacen_core::{Role, UserId};

use super::RepositoryError;
use crate::models::User;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    password_hash: String,
    role: Role,
    active: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::new(row.id),
            email: row.email,
            password_hash: row.password_hash,
            role: row.role,
            active: row.active,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
        }
    }
}

/// Find a user by (lowercased) email.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, RepositoryError> {
    let row = sqlx::query_as::<_, UserRow>(
        r"
        SELECT id, email, password_hash, role, active, last_login_at, created_at
        FROM users
        WHERE email = $1
        ",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Into::into))
}

/// Find a user by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_id(pool: &PgPool, id: UserId) -> Result<Option<User>, RepositoryError> {
    let row = sqlx::query_as::<_, UserRow>(
        r"
        SELECT id, email, password_hash, role, active, last_login_at, created_at
        FROM users
        WHERE id = $1
        ",
    )
    .bind(id.as_i32())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Into::into))
}

/// Insert a new user.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` when the email is already registered,
/// `RepositoryError::Database` for other database errors.
pub async fn insert(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    role: Role,
) -> Result<User, RepositoryError> {
    let row = sqlx::query_as::<_, UserRow>(
        r"
        INSERT INTO users (email, password_hash, role)
        VALUES ($1, $2, $3)
        RETURNING id, email, password_hash, role, active, last_login_at, created_at
        ",
    )
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(format!("email {email} is already registered"));
        }
        RepositoryError::Database(e)
    })?;

    Ok(row.into())
}

/// Record a successful login.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn touch_last_login(pool: &PgPool, id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(id.as_i32())
        .execute(pool)
        .await?;

    Ok(())
}
