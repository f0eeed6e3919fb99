//! Integration tests for push payload shape and the disabled-push path.

use almacen_core::UserId;
use almacen_server::config::VapidConfig;
use almacen_server::services::push::{PushOutcome, PushPayload, PushService};
use secrecy::SecretString;

fn lazy_pool() -> sqlx::PgPool {
    sqlx::PgPool::connect_lazy("postgres://localhost/unused").expect("lazy pool")
}

#[test]
fn payload_matches_the_gateway_contract() {
    let payload = PushPayload::new("order_ready", "Order ready", "Order #42 is ready for pickup")
        .with_entity("order_id", 42);

    let json = serde_json::to_value(&payload).expect("serialize");
    assert_eq!(json["type"], "order_ready");
    assert_eq!(json["title"], "Order ready");
    assert_eq!(json["body"], "Order #42 is ready for pickup");
    assert_eq!(json["order_id"], 42);

    // Timestamps are RFC 3339 strings.
    let at = json["at"].as_str().expect("at is a string");
    assert!(chrono::DateTime::parse_from_rfc3339(at).is_ok());
}

#[tokio::test]
async fn service_reports_push_availability() {
    let disabled = PushService::new(lazy_pool(), None);
    assert!(!disabled.enabled());
    assert!(disabled.public_key().is_none());

    let vapid = VapidConfig {
        subject: "mailto:ops@almacen.example".to_string(),
        public_key: "BPgedpT3mYrchKh3u5pVYcYbuH3QAnZLhmYL4jCfkQlP".to_string(),
        private_key: SecretString::from("kept-out-of-the-assertions"),
    };
    let enabled = PushService::new(lazy_pool(), Some(vapid));
    assert!(enabled.enabled());
    assert_eq!(
        enabled.public_key(),
        Some("BPgedpT3mYrchKh3u5pVYcYbuH3QAnZLhmYL4jCfkQlP")
    );
}

#[tokio::test]
async fn disabled_push_degrades_to_zero_outcome() {
    // Without a VAPID identity, delivery is skipped entirely - not an
    // error - and no subscriptions are even looked up beyond the target
    // query.
    let service = PushService::new(lazy_pool(), None);
    let payload = PushPayload::new("test", "t", "b").with_entity("user_id", 1);

    // The lazy pool cannot reach a database; target lookup failures are
    // swallowed and fold into an all-zero outcome.
    let outcome = service.push_to_user(UserId::new(1), &payload).await;
    assert_eq!(outcome, PushOutcome::default());
}
