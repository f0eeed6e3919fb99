//! In-process real-time fan-out.
//!
//! Events are broadcast over three independent audiences: the staff
//! dashboard, per-customer channels, and the live stock watchers. Delivery
//! is at-most-once and best-effort; a client that connects after an event
//! was published re-fetches current state through the query endpoints.

pub mod hub;

pub use hub::{EventHub, Subscription};

/// A new order was committed.
pub const EVENT_ORDER_CREATED: &str = "order_created";
/// An order moved to a new status.
pub const EVENT_ORDER_STATUS_CHANGED: &str = "order_status_changed";
/// A product's live stock changed.
pub const EVENT_STOCK_UPDATE: &str = "stock_update";
/// A product crossed the restock threshold.
pub const EVENT_RESTOCK_UPDATE: &str = "restock_update";
/// Keep-alive marker.
pub const EVENT_PING: &str = "ping";
