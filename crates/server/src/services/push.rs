//! Web Push delivery through the configured push gateway.
//!
//! Push delivery is a side effect of business operations and never fails
//! them: every error in this module is logged and folded into the returned
//! [`PushOutcome`]. Without a VAPID identity the service degrades to
//! "push unavailable" rather than erroring.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::Serialize;
use sqlx::PgPool;
use web_push::{
    ContentEncoding, HyperWebPushClient, SubscriptionInfo, URL_SAFE_NO_PAD,
    VapidSignatureBuilder, WebPushClient, WebPushError, WebPushMessageBuilder,
};

use almacen_core::{Role, UserId};

use crate::config::VapidConfig;
use crate::db::push_subscriptions;
use crate::models::PushTarget;

/// Payload delivered opaquely through the push gateway.
#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub body: String,
    #[serde(flatten)]
    pub entity: serde_json::Map<String, serde_json::Value>,
    pub at: DateTime<Utc>,
}

impl PushPayload {
    /// Build a payload stamped with the current time.
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            title: title.into(),
            body: body.into(),
            entity: serde_json::Map::new(),
            at: Utc::now(),
        }
    }

    /// Attach an entity reference (e.g. the affected order or product id).
    #[must_use]
    pub fn with_entity(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.entity.insert(key.to_string(), value.into());
        self
    }
}

/// Counters describing one fan-out attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushOutcome {
    /// Subscriptions matched by the target selector.
    pub attempted: usize,
    /// Deliveries accepted by the gateway.
    pub delivered: usize,
    /// Dead subscriptions removed after a gone/not-found response.
    pub pruned: usize,
}

/// Web Push delivery service.
///
/// Cloning is cheap; all clones share the same HTTP client and pool.
#[derive(Clone)]
pub struct PushService {
    inner: Arc<PushInner>,
}

struct PushInner {
    pool: PgPool,
    vapid: Option<VapidConfig>,
    client: HyperWebPushClient,
}

enum Delivery {
    Delivered,
    /// The gateway reported the subscription permanently dead.
    Dead,
    Failed,
}

impl PushService {
    #[must_use]
    pub fn new(pool: PgPool, vapid: Option<VapidConfig>) -> Self {
        Self {
            inner: Arc::new(PushInner {
                pool,
                vapid,
                client: HyperWebPushClient::default(),
            }),
        }
    }

    /// Whether push delivery is configured.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.inner.vapid.is_some()
    }

    /// The VAPID public key browsers need to subscribe, if configured.
    #[must_use]
    pub fn public_key(&self) -> Option<&str> {
        self.inner.vapid.as_ref().map(|v| v.public_key.as_str())
    }

    /// Deliver a payload to every subscription of one user.
    pub async fn push_to_user(&self, user_id: UserId, payload: &PushPayload) -> PushOutcome {
        let targets = match push_subscriptions::targets_for_user(&self.inner.pool, user_id).await {
            Ok(targets) => targets,
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "failed to load push targets");
                return PushOutcome::default();
            }
        };

        self.deliver_all(targets, payload).await
    }

    /// Deliver a payload to every subscription of every active user holding
    /// one of the given roles.
    pub async fn push_to_roles(&self, roles: &[Role], payload: &PushPayload) -> PushOutcome {
        if roles.is_empty() {
            return PushOutcome::default();
        }

        let targets = match push_subscriptions::targets_for_roles(&self.inner.pool, roles).await {
            Ok(targets) => targets,
            Err(err) => {
                tracing::warn!(?roles, error = %err, "failed to load push targets");
                return PushOutcome::default();
            }
        };

        self.deliver_all(targets, payload).await
    }

    async fn deliver_all(&self, targets: Vec<PushTarget>, payload: &PushPayload) -> PushOutcome {
        let Some(vapid) = self.inner.vapid.as_ref() else {
            tracing::debug!("push delivery skipped: VAPID identity not configured");
            return PushOutcome::default();
        };

        let data = match serde_json::to_vec(payload) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode push payload");
                return PushOutcome::default();
            }
        };

        let mut outcome = PushOutcome {
            attempted: targets.len(),
            ..PushOutcome::default()
        };

        for target in targets {
            match self.deliver_one(vapid, &target, &data).await {
                Delivery::Delivered => outcome.delivered += 1,
                Delivery::Dead => {
                    // Self-healing cleanup: the endpoint is permanently gone.
                    match push_subscriptions::delete_by_endpoint(&self.inner.pool, &target.endpoint)
                        .await
                    {
                        Ok(_) => outcome.pruned += 1,
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to prune dead push subscription");
                        }
                    }
                }
                Delivery::Failed => {}
            }
        }

        outcome
    }

    async fn deliver_one(&self, vapid: &VapidConfig, target: &PushTarget, data: &[u8]) -> Delivery {
        let subscription = SubscriptionInfo::new(
            target.endpoint.clone(),
            target.p256dh.clone(),
            target.auth.clone(),
        );

        let signature = VapidSignatureBuilder::from_base64(
            vapid.private_key.expose_secret(),
            URL_SAFE_NO_PAD,
            &subscription,
        )
        .and_then(|mut builder| {
            builder.add_claim("sub", vapid.subject.as_str());
            builder.build()
        });

        let signature = match signature {
            Ok(signature) => signature,
            Err(err) => {
                tracing::warn!(error = %err, "failed to build VAPID signature");
                return Delivery::Failed;
            }
        };

        let mut builder = WebPushMessageBuilder::new(&subscription);
        builder.set_payload(ContentEncoding::Aes128Gcm, data);
        builder.set_vapid_signature(signature);

        let message = match builder.build() {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, "failed to build push message");
                return Delivery::Failed;
            }
        };

        match self.inner.client.send(message).await {
            Ok(()) => Delivery::Delivered,
            Err(WebPushError::EndpointNotValid | WebPushError::EndpointNotFound) => {
                Delivery::Dead
            }
            Err(err) => {
                tracing::warn!(endpoint = %target.endpoint, error = %err, "push delivery failed");
                Delivery::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_has_the_wire_shape() {
        let payload = PushPayload::new("order_ready", "Order ready", "Order #7 can be picked up")
            .with_entity("order_id", 7);

        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json["type"], "order_ready");
        assert_eq!(json["title"], "Order ready");
        assert_eq!(json["body"], "Order #7 can be picked up");
        assert_eq!(json["order_id"], 7);
        assert!(json["at"].is_string());
    }

    #[test]
    fn outcome_defaults_to_zero() {
        let outcome = PushOutcome::default();
        assert_eq!(outcome.attempted, 0);
        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.pruned, 0);
    }
}
