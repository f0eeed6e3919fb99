//! Refresh-token session model.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use almacen_core::{Role, UserId};

/// A refresh-token session row.
///
/// Only the SHA-256 digest of the refresh token is stored; the raw token
/// exists solely on the client.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: UserId,
    pub refresh_token_hash: String,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A session is live when it has not been revoked and has not expired.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

/// A session joined with the owning user's auth-relevant columns, as needed
/// by the refresh flow.
#[derive(Debug, Clone)]
pub struct SessionWithUser {
    pub session: Session,
    pub email: String,
    pub role: Role,
    pub user_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_in: Duration, revoked: bool) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::nil(),
            user_id: UserId::new(1),
            refresh_token_hash: "digest".to_string(),
            user_agent: None,
            ip: None,
            expires_at: now + expires_in,
            revoked_at: revoked.then_some(now),
            created_at: now,
        }
    }

    #[test]
    fn live_session() {
        assert!(session(Duration::days(1), false).is_live(Utc::now()));
    }

    #[test]
    fn revoked_session_is_dead() {
        assert!(!session(Duration::days(1), true).is_live(Utc::now()));
    }

    #[test]
    fn expired_session_is_dead() {
        assert!(!session(Duration::seconds(-5), false).is_live(Utc::now()));
    }
}
