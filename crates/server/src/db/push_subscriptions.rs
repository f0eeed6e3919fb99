//! Database operations for Web Push subscriptions.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use almacen_core::{PushSubscriptionId, Role, UserId};

use super::RepositoryError;
use crate::models::{PushSubscription, PushTarget};

#[derive(Debug, sqlx::FromRow)]
struct PushSubscriptionRow {
    id: i32,
    user_id: i32,
    endpoint: String,
    p256dh: String,
    auth: String,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PushSubscriptionRow> for PushSubscription {
    fn from(row: PushSubscriptionRow) -> Self {
        Self {
            id: PushSubscriptionId::new(row.id),
            user_id: UserId::new(row.user_id),
            endpoint: row.endpoint,
            p256dh: row.p256dh,
            auth: row.auth,
            user_agent: row.user_agent,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PushTargetRow {
    endpoint: String,
    p256dh: String,
    auth: String,
}

impl From<PushTargetRow> for PushTarget {
    fn from(row: PushTargetRow) -> Self {
        Self {
            endpoint: row.endpoint,
            p256dh: row.p256dh,
            auth: row.auth,
        }
    }
}

/// Upsert a subscription by endpoint.
///
/// A browser re-registering an existing endpoint (possibly under a
/// different user after a login switch) takes ownership of the row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn upsert(
    pool: &PgPool,
    user_id: UserId,
    endpoint: &str,
    p256dh: &str,
    auth: &str,
    user_agent: Option<&str>,
) -> Result<PushSubscription, RepositoryError> {
    let row = sqlx::query_as::<_, PushSubscriptionRow>(
        r"
        INSERT INTO push_subscriptions (user_id, endpoint, p256dh, auth, user_agent)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (endpoint) DO UPDATE SET
            user_id = EXCLUDED.user_id,
            p256dh = EXCLUDED.p256dh,
            auth = EXCLUDED.auth,
            user_agent = EXCLUDED.user_agent,
            updated_at = NOW()
        RETURNING id, user_id, endpoint, p256dh, auth, user_agent, created_at, updated_at
        ",
    )
    .bind(user_id.as_i32())
    .bind(endpoint)
    .bind(p256dh)
    .bind(auth)
    .bind(user_agent)
    .fetch_one(pool)
    .await?;

    Ok(row.into())
}

/// Drop older subscriptions for the same (user, device fingerprint),
/// keeping only `keep_endpoint`.
///
/// Keeps the registry at one live row per device so endpoints do not pile
/// up on machines that re-subscribe often.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn prune_same_device(
    pool: &PgPool,
    user_id: UserId,
    user_agent: &str,
    keep_endpoint: &str,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r"
        DELETE FROM push_subscriptions
        WHERE user_id = $1 AND user_agent = $2 AND endpoint <> $3
        ",
    )
    .bind(user_id.as_i32())
    .bind(user_agent)
    .bind(keep_endpoint)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Delete a subscription by endpoint. Used both for explicit unsubscription
/// and for self-healing cleanup after a gone/not-found gateway response.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn delete_by_endpoint(pool: &PgPool, endpoint: &str) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = $1")
        .bind(endpoint)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// List a user's subscriptions, most recently refreshed first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_user(
    pool: &PgPool,
    user_id: UserId,
) -> Result<Vec<PushSubscription>, RepositoryError> {
    let rows = sqlx::query_as::<_, PushSubscriptionRow>(
        r"
        SELECT id, user_id, endpoint, p256dh, auth, user_agent, created_at, updated_at
        FROM push_subscriptions
        WHERE user_id = $1
        ORDER BY updated_at DESC, created_at DESC
        ",
    )
    .bind(user_id.as_i32())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Delivery targets for one user.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn targets_for_user(
    pool: &PgPool,
    user_id: UserId,
) -> Result<Vec<PushTarget>, RepositoryError> {
    let rows = sqlx::query_as::<_, PushTargetRow>(
        "SELECT endpoint, p256dh, auth FROM push_subscriptions WHERE user_id = $1",
    )
    .bind(user_id.as_i32())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Delivery targets for every active user holding one of the given roles.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn targets_for_roles(
    pool: &PgPool,
    roles: &[Role],
) -> Result<Vec<PushTarget>, RepositoryError> {
    let rows = sqlx::query_as::<_, PushTargetRow>(
        r"
        SELECT s.endpoint, s.p256dh, s.auth
        FROM push_subscriptions s
        JOIN users u ON u.id = s.user_id
        WHERE u.role = ANY($1) AND u.active
        ",
    )
    .bind(roles)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}
