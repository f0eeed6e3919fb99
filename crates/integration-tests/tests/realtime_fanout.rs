//! Integration tests for the realtime fan-out hub.
//!
//! These exercise the delivery guarantees end to end against the server's
//! hub: partition isolation, dead-channel cleanup, and the last-channel
//! key removal for per-customer registries.

use almacen_core::UserId;
use almacen_server::realtime::{
    EVENT_ORDER_CREATED, EVENT_ORDER_STATUS_CHANGED, EVENT_STOCK_UPDATE, EventHub,
};
use serde_json::json;

#[tokio::test]
async fn staff_and_customer_audiences_both_receive_order_created() {
    let hub = EventHub::new();
    let customer = UserId::new(11);

    let (_staff, mut staff_rx) = hub.subscribe_staff();
    let (_own, mut customer_rx) = hub.subscribe_customer(customer);

    let payload = json!({ "order_id": 1, "user_id": 11, "at": "2026-08-07T12:00:00Z" });
    hub.publish_staff(EVENT_ORDER_CREATED, &payload);
    hub.publish_customer(customer, EVENT_ORDER_CREATED, &payload);

    assert!(staff_rx.recv().await.is_some());
    assert!(customer_rx.recv().await.is_some());
}

#[tokio::test]
async fn customers_never_see_each_others_events() {
    let hub = EventHub::new();
    let alice = UserId::new(1);
    let bob = UserId::new(2);

    let (_a, mut alice_rx) = hub.subscribe_customer(alice);
    let (_b, mut bob_rx) = hub.subscribe_customer(bob);

    hub.publish_customer(alice, EVENT_ORDER_STATUS_CHANGED, &json!({ "order_id": 5 }));

    assert!(alice_rx.recv().await.is_some());
    assert!(bob_rx.try_recv().is_err());
}

#[tokio::test]
async fn multiple_tabs_of_one_customer_all_receive() {
    let hub = EventHub::new();
    let customer = UserId::new(3);

    let (_tab1, mut rx1) = hub.subscribe_customer(customer);
    let (_tab2, mut rx2) = hub.subscribe_customer(customer);
    assert_eq!(hub.customer_channels(customer), 2);

    hub.publish_customer(customer, EVENT_ORDER_STATUS_CHANGED, &json!({ "order_id": 8 }));

    assert!(rx1.recv().await.is_some());
    assert!(rx2.recv().await.is_some());
}

#[tokio::test]
async fn disconnect_cleanup_scenario() {
    // A per-customer channel closes; a later publish to that customer
    // neither errors nor retains the dead channel, and the last channel's
    // removal frees the key entirely.
    let hub = EventHub::new();
    let customer = UserId::new(9);

    let (guard, rx) = hub.subscribe_customer(customer);
    assert_eq!(hub.customer_channels(customer), 1);

    drop(rx);
    hub.publish_customer(customer, EVENT_ORDER_STATUS_CHANGED, &json!({ "order_id": 2 }));
    assert_eq!(hub.customer_channels(customer), 0);

    // Publishing to the now-absent key is a no-op.
    hub.publish_customer(customer, EVENT_ORDER_STATUS_CHANGED, &json!({ "order_id": 3 }));
    drop(guard);
}

#[tokio::test]
async fn one_dead_stock_watcher_does_not_break_the_rest() {
    let hub = EventHub::new();

    let (_live, mut live_rx) = hub.subscribe_stock();
    let (_dead, dead_rx) = hub.subscribe_stock();
    drop(dead_rx);

    hub.publish_stock(EVENT_STOCK_UPDATE, &json!({ "product_id": 10, "stock": 3 }));

    assert!(live_rx.recv().await.is_some());
    assert_eq!(hub.stock_channels(), 1);
}

#[tokio::test]
async fn events_missed_before_subscribing_are_not_replayed() {
    let hub = EventHub::new();

    hub.publish_stock(EVENT_STOCK_UPDATE, &json!({ "product_id": 1, "stock": 4 }));

    let (_guard, mut rx) = hub.subscribe_stock();
    assert!(rx.try_recv().is_err(), "no replay for late subscribers");
}
