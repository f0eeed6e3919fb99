//! Subscriber registries and broadcast plumbing.
//!
//! The hub owns all channel registries behind its own locks; subscribe,
//! unsubscribe and publish are the only mutation surface. Handlers hold a
//! [`Subscription`] guard whose `Drop` unsubscribes, so a closed transport
//! cleans its registry entry up promptly without any polling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::response::sse::Event;
use serde::Serialize;
use tokio::sync::mpsc;

use almacen_core::UserId;

type Channel = mpsc::UnboundedSender<Event>;
type Registry = HashMap<u64, Channel>;

/// Broadcast hub for all server-sent-event audiences.
///
/// Cloning is cheap; all clones share the same registries.
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    next_id: AtomicU64,
    staff: Mutex<Registry>,
    stock: Mutex<Registry>,
    customers: Mutex<HashMap<UserId, Registry>>,
}

/// The audience a channel is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    Staff,
    Stock,
    Customer(UserId),
}

/// Registration guard returned by the subscribe methods.
///
/// Dropping the guard removes the channel from its registry; for a
/// per-customer channel, dropping the last guard frees the customer's
/// entry entirely.
pub struct Subscription {
    hub: Arc<HubInner>,
    audience: Audience,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.remove(self.audience, self.id);
    }
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a staff dashboard channel.
    #[must_use]
    pub fn subscribe_staff(&self) -> (Subscription, mpsc::UnboundedReceiver<Event>) {
        self.subscribe(Audience::Staff)
    }

    /// Register a live stock watcher channel.
    #[must_use]
    pub fn subscribe_stock(&self) -> (Subscription, mpsc::UnboundedReceiver<Event>) {
        self.subscribe(Audience::Stock)
    }

    /// Register a channel for one customer. A customer may hold several
    /// simultaneous channels (multiple tabs or devices).
    #[must_use]
    pub fn subscribe_customer(
        &self,
        user_id: UserId,
    ) -> (Subscription, mpsc::UnboundedReceiver<Event>) {
        self.subscribe(Audience::Customer(user_id))
    }

    fn subscribe(&self, audience: Audience) -> (Subscription, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        match audience {
            Audience::Staff => {
                lock(&self.inner.staff).insert(id, tx);
            }
            Audience::Stock => {
                lock(&self.inner.stock).insert(id, tx);
            }
            Audience::Customer(user_id) => {
                lock(&self.inner.customers)
                    .entry(user_id)
                    .or_default()
                    .insert(id, tx);
            }
        }

        let guard = Subscription {
            hub: Arc::clone(&self.inner),
            audience,
            id,
        };
        (guard, rx)
    }

    /// Broadcast an event to every staff channel.
    pub fn publish_staff<T: Serialize>(&self, event: &str, payload: &T) {
        if let Some(ev) = encode(event, payload) {
            broadcast(&mut lock(&self.inner.staff), &ev);
        }
    }

    /// Broadcast an event to every stock watcher channel.
    pub fn publish_stock<T: Serialize>(&self, event: &str, payload: &T) {
        if let Some(ev) = encode(event, payload) {
            broadcast(&mut lock(&self.inner.stock), &ev);
        }
    }

    /// Broadcast an event to every channel of one customer.
    pub fn publish_customer<T: Serialize>(&self, user_id: UserId, event: &str, payload: &T) {
        let Some(ev) = encode(event, payload) else {
            return;
        };

        let mut customers = lock(&self.inner.customers);
        if let Some(registry) = customers.get_mut(&user_id) {
            broadcast(registry, &ev);
            if registry.is_empty() {
                customers.remove(&user_id);
            }
        }
    }

    /// Number of live staff channels (test observability).
    #[must_use]
    pub fn staff_channels(&self) -> usize {
        lock(&self.inner.staff).len()
    }

    /// Number of live stock watcher channels (test observability).
    #[must_use]
    pub fn stock_channels(&self) -> usize {
        lock(&self.inner.stock).len()
    }

    /// Number of live channels for one customer (test observability).
    #[must_use]
    pub fn customer_channels(&self, user_id: UserId) -> usize {
        lock(&self.inner.customers)
            .get(&user_id)
            .map_or(0, Registry::len)
    }
}

impl HubInner {
    fn remove(&self, audience: Audience, id: u64) {
        match audience {
            Audience::Staff => {
                lock(&self.staff).remove(&id);
            }
            Audience::Stock => {
                lock(&self.stock).remove(&id);
            }
            Audience::Customer(user_id) => {
                let mut customers = lock(&self.customers);
                if let Some(registry) = customers.get_mut(&user_id) {
                    registry.remove(&id);
                    if registry.is_empty() {
                        customers.remove(&user_id);
                    }
                }
            }
        }
    }
}

/// Serialize a payload into a named SSE event. Serialization failures are
/// logged and swallowed; notification is never allowed to surface an error.
fn encode<T: Serialize>(event: &str, payload: &T) -> Option<Event> {
    match Event::default().event(event).json_data(payload) {
        Ok(ev) => Some(ev),
        Err(err) => {
            tracing::warn!(event, error = %err, "failed to encode realtime event");
            None
        }
    }
}

/// Write an event to every channel in a registry, dropping channels whose
/// receiver is gone. One dead connection never aborts the broadcast.
fn broadcast(registry: &mut Registry, ev: &Event) {
    registry.retain(|_, tx| tx.send(ev.clone()).is_ok());
}

/// Lock a registry mutex, recovering from poisoning.
///
/// The registries hold plain maps, so a panic mid-mutation cannot leave
/// them logically inconsistent; continuing with the recovered guard is
/// safe.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn staff_broadcast_reaches_all_channels() {
        let hub = EventHub::new();
        let (_guard_a, mut rx_a) = hub.subscribe_staff();
        let (_guard_b, mut rx_b) = hub.subscribe_staff();

        hub.publish_staff("order_created", &json!({ "order_id": 1 }));

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn audiences_are_isolated() {
        let hub = EventHub::new();
        let (_staff_guard, mut staff_rx) = hub.subscribe_staff();
        let (_stock_guard, mut stock_rx) = hub.subscribe_stock();

        hub.publish_stock("stock_update", &json!({ "product_id": 7, "stock": 2 }));

        assert!(stock_rx.recv().await.is_some());
        assert!(staff_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn customer_channels_are_keyed() {
        let hub = EventHub::new();
        let alice = UserId::new(1);
        let bob = UserId::new(2);
        let (_a, mut rx_alice) = hub.subscribe_customer(alice);
        let (_b, mut rx_bob) = hub.subscribe_customer(bob);

        hub.publish_customer(alice, "order_status_changed", &json!({ "order_id": 3 }));

        assert!(rx_alice.recv().await.is_some());
        assert!(rx_bob.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_channel_is_pruned_without_aborting_broadcast() {
        let hub = EventHub::new();
        let (_live_guard, mut live_rx) = hub.subscribe_staff();
        let (_dead_guard, dead_rx) = hub.subscribe_staff();
        drop(dead_rx);

        assert_eq!(hub.staff_channels(), 2);
        hub.publish_staff("order_created", &json!({ "order_id": 9 }));

        // The live channel still got the event; the dead one was removed.
        assert!(live_rx.recv().await.is_some());
        assert_eq!(hub.staff_channels(), 1);
    }

    #[tokio::test]
    async fn dropping_guard_unsubscribes() {
        let hub = EventHub::new();
        let (guard, _rx) = hub.subscribe_stock();
        assert_eq!(hub.stock_channels(), 1);

        drop(guard);
        assert_eq!(hub.stock_channels(), 0);
    }

    #[tokio::test]
    async fn last_customer_channel_frees_the_key() {
        let hub = EventHub::new();
        let carol = UserId::new(5);

        let (guard_a, _rx_a) = hub.subscribe_customer(carol);
        let (guard_b, rx_b) = hub.subscribe_customer(carol);
        assert_eq!(hub.customer_channels(carol), 2);

        drop(guard_a);
        assert_eq!(hub.customer_channels(carol), 1);

        // Publishing to a dropped receiver prunes it and, as the last
        // channel, removes the customer's registry entry entirely.
        drop(rx_b);
        hub.publish_customer(carol, "order_status_changed", &json!({ "order_id": 1 }));
        assert_eq!(hub.customer_channels(carol), 0);
        drop(guard_b);

        // Publishing to an absent key is a no-op, not an error.
        hub.publish_customer(carol, "order_status_changed", &json!({ "order_id": 2 }));
    }
}
