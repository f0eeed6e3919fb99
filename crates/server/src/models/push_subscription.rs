//! Web Push subscription models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use almacen_core::{PushSubscriptionId, UserId};

/// A stored push subscription.
///
/// The cryptographic keys are write-only from the API's perspective; they
/// are omitted from listings.
#[derive(Debug, Clone, Serialize)]
pub struct PushSubscription {
    pub id: PushSubscriptionId,
    pub user_id: UserId,
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub p256dh: String,
    #[serde(skip_serializing)]
    pub auth: String,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The browser `PushSubscription.toJSON()` shape sent on registration.
#[derive(Debug, Clone, Deserialize)]
pub struct PushSubscriptionInput {
    pub endpoint: String,
    pub keys: PushSubscriptionKeys,
}

/// Encryption keys of a browser push subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct PushSubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// The minimal slice of a subscription needed to deliver one push message.
#[derive(Debug, Clone)]
pub struct PushTarget {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_subscription_json_parses() {
        let input: PushSubscriptionInput = serde_json::from_str(
            r#"{
                "endpoint": "https://push.example.org/send/abc",
                "expirationTime": null,
                "keys": { "p256dh": "BPK...", "auth": "4vQ..." }
            }"#,
        )
        .expect("parse");
        assert_eq!(input.endpoint, "https://push.example.org/send/abc");
        assert_eq!(input.keys.auth, "4vQ...");
    }
}
