//! Database operations for refresh-token sessions.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use almacen_core::{Role, UserId};

use super::RepositoryError;
use crate::models::{Session, SessionWithUser};

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: i32,
    refresh_token_hash: String,
    user_agent: Option<String>,
    ip: Option<String>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            user_id: UserId::new(row.user_id),
            refresh_token_hash: row.refresh_token_hash,
            user_agent: row.user_agent,
            ip: row.ip,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionWithUserRow {
    id: Uuid,
    user_id: i32,
    refresh_token_hash: String,
    user_agent: Option<String>,
    ip: Option<String>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    email: String,
    role: Role,
    user_active: bool,
}

impl From<SessionWithUserRow> for SessionWithUser {
    fn from(row: SessionWithUserRow) -> Self {
        Self {
            session: Session {
                id: row.id,
                user_id: UserId::new(row.user_id),
                refresh_token_hash: row.refresh_token_hash,
                user_agent: row.user_agent,
                ip: row.ip,
                expires_at: row.expires_at,
                revoked_at: row.revoked_at,
                created_at: row.created_at,
            },
            email: row.email,
            role: row.role,
            user_active: row.user_active,
        }
    }
}

/// Store a new session with the digest of its refresh token.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert(
    pool: &PgPool,
    user_id: UserId,
    refresh_token_hash: &str,
    user_agent: Option<&str>,
    ip: Option<&str>,
    expires_at: DateTime<Utc>,
) -> Result<Session, RepositoryError> {
    let row = sqlx::query_as::<_, SessionRow>(
        r"
        INSERT INTO sessions (user_id, refresh_token_hash, user_agent, ip, expires_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, refresh_token_hash, user_agent, ip,
                  expires_at, revoked_at, created_at
        ",
    )
    .bind(user_id.as_i32())
    .bind(refresh_token_hash)
    .bind(user_agent)
    .bind(ip)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(row.into())
}

/// Look up a session (with the owning user) by refresh-token digest.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_hash(
    pool: &PgPool,
    refresh_token_hash: &str,
) -> Result<Option<SessionWithUser>, RepositoryError> {
    let row = sqlx::query_as::<_, SessionWithUserRow>(
        r"
        SELECT
            s.id, s.user_id, s.refresh_token_hash, s.user_agent, s.ip,
            s.expires_at, s.revoked_at, s.created_at,
            u.email, u.role, u.active AS user_active
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.refresh_token_hash = $1
        ",
    )
    .bind(refresh_token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Into::into))
}

/// Revoke the session matching a refresh-token digest.
///
/// Returns the number of sessions revoked (0 when the digest matched
/// nothing or the session was already revoked).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn revoke_by_hash(
    pool: &PgPool,
    refresh_token_hash: &str,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        "UPDATE sessions SET revoked_at = NOW() WHERE refresh_token_hash = $1 AND revoked_at IS NULL",
    )
    .bind(refresh_token_hash)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
