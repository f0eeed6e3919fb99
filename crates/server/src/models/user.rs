//! User account model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use almacen_core::{Role, UserId};

/// A registered user.
///
/// The password hash never leaves the server; it is skipped on
/// serialization so a `User` can be embedded in API responses directly.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
