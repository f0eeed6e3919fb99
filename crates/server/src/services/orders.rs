//! Order placement and lifecycle.
//!
//! [`OrderService::place_order`] turns a raw cart into a committed order
//! with price integrity and stock consistency under concurrent requests.
//! The conditional bulk decrement (`db::products::decrement_stock`) is the
//! sole concurrency mechanism: validation reads are advisory, the decrement
//! predicate is authoritative.
//!
//! All realtime and push notifications fire strictly after commit and never
//! affect the outcome of the transaction that triggered them.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;

use almacen_core::{
    OrderId, OrderStatus, ProductId, ProductStatus, Role, STORE_CURRENCY, StockLevel, UserId,
    line_subtotal,
};

use crate::db::{self, RepositoryError, products::StockRow};
use crate::middleware::RequestMeta;
use crate::models::{CartLine, DeliveryInfo, NewOrderItem, Order, OrderWithItems, StockAlert};
use crate::realtime::{
    EVENT_ORDER_CREATED, EVENT_ORDER_STATUS_CHANGED, EVENT_RESTOCK_UPDATE, EVENT_STOCK_UPDATE,
    EventHub,
};
use crate::services::push::{PushPayload, PushService};

/// Typed rejections of the order engine.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The cart was empty or empty after dropping malformed lines.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A requested product does not exist.
    #[error("product {0} does not exist")]
    ProductNotFound(ProductId),

    /// A requested product is not active.
    #[error("product {0} is not active")]
    ProductInactive(ProductId),

    /// A requested product holds less stock than requested.
    #[error("product {product} has only {available} units available")]
    InsufficientStock {
        product: ProductId,
        available: i32,
    },

    /// The order does not exist.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// The state machine forbids the requested transition.
    #[error("order cannot move from {from} to {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    /// The order is in a state that forbids the operation (e.g. archived).
    #[error("{0}")]
    InvalidState(String),

    /// Infrastructure failure; the only retryable kind.
    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(RepositoryError::Database(err))
    }
}

/// Staff roles that receive restock pushes.
const STAFF_ROLES: [Role; 2] = [Role::Operator, Role::Admin];

/// Order placement and lifecycle service.
///
/// Holds cheap clones of the shared handles; notification work is spawned
/// so a slow push gateway never blocks a request.
#[derive(Clone)]
pub struct OrderService {
    pool: PgPool,
    hub: EventHub,
    push: PushService,
}

impl OrderService {
    #[must_use]
    pub const fn new(pool: PgPool, hub: EventHub, push: PushService) -> Self {
        Self { pool, hub, push }
    }

    /// Place an order for a customer.
    ///
    /// Validates the normalized cart, atomically decrements stock, records
    /// threshold alerts, and persists the order with its price snapshots -
    /// all in one transaction. Fan-out happens after commit.
    ///
    /// # Errors
    ///
    /// Returns a typed [`OrderError`] for every business rejection;
    /// `OrderError::Store` for infrastructure failures. A failed call has no
    /// partial effect.
    pub async fn place_order(
        &self,
        customer: UserId,
        lines: &[CartLine],
        delivery: &DeliveryInfo,
        meta: &RequestMeta,
    ) -> Result<OrderWithItems, OrderError> {
        let cart = normalize_cart(lines);
        if cart.is_empty() {
            return Err(OrderError::InvalidInput(
                "cart is empty or contains no valid lines".to_string(),
            ));
        }

        let ids: Vec<i32> = cart.iter().map(|(id, _)| id.as_i32()).collect();
        let quantities: Vec<i32> = cart.iter().map(|(_, qty)| *qty).collect();

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        // Price authority: name/price/status/stock come from the store,
        // inside the transaction. Client-sent prices are never consulted.
        let snapshots = db::products::snapshots(&mut tx, &ids).await?;
        let by_id: HashMap<ProductId, _> = snapshots.into_iter().map(|s| (s.id, s)).collect();

        for (product, _) in &cart {
            if !by_id.contains_key(product) {
                return Err(OrderError::ProductNotFound(*product));
            }
        }
        for (product, _) in &cart {
            if by_id.get(product).is_some_and(|s| s.status != ProductStatus::Active) {
                return Err(OrderError::ProductInactive(*product));
            }
        }
        for (product, quantity) in &cart {
            if let Some(snapshot) = by_id.get(product)
                && snapshot.stock < *quantity
            {
                return Err(OrderError::InsufficientStock {
                    product: *product,
                    available: snapshot.stock,
                });
            }
        }

        // The race-safety step: decrement all rows in one conditional bulk
        // update and re-verify the affected-row count instead of trusting
        // the validation read above.
        let decremented = db::products::decrement_stock(&mut tx, &ids, &quantities).await?;
        if decremented.len() != cart.len() {
            let applied: HashSet<i32> = decremented.iter().map(|row| row.id).collect();
            let Some((product, _)) = cart.iter().find(|(id, _)| !applied.contains(&id.as_i32()))
            else {
                return Err(OrderError::Store(RepositoryError::DataCorruption(
                    "stock decrement affected more rows than requested".to_string(),
                )));
            };
            let available = db::products::current_stock(&mut tx, *product)
                .await?
                .unwrap_or(0);
            // Dropping the transaction rolls back the partial decrement.
            return Err(OrderError::InsufficientStock {
                product: *product,
                available,
            });
        }

        let mut alerts: Vec<(StockAlert, String)> = Vec::new();
        for row in &decremented {
            if let Some(level) = StockLevel::evaluate(row.stock) {
                let product = ProductId::new(row.id);
                let alert = db::stock_alerts::insert(&mut tx, product, row.stock, level).await?;
                let name = by_id
                    .get(&product)
                    .map_or_else(String::new, |s| s.name.clone());
                alerts.push((alert, name));
            }
        }

        let mut items = Vec::with_capacity(cart.len());
        let mut total = Decimal::ZERO;
        for (product, quantity) in &cart {
            let Some(snapshot) = by_id.get(product) else {
                // Unreachable: existence was validated above.
                return Err(OrderError::ProductNotFound(*product));
            };
            let subtotal = line_subtotal(*quantity, snapshot.price);
            total += subtotal;
            items.push(NewOrderItem {
                product_id: *product,
                name_snapshot: snapshot.name.clone(),
                unit_price_snapshot: snapshot.price,
                quantity: *quantity,
                subtotal,
            });
        }

        let order = db::orders::insert_order(
            &mut tx,
            customer,
            total,
            STORE_CURRENCY,
            delivery,
            meta.ip.as_deref(),
            meta.user_agent.as_deref(),
        )
        .await?;
        let items = db::orders::insert_items(&mut tx, order.id, &items).await?;

        tx.commit().await.map_err(RepositoryError::from)?;

        self.notify_order_placed(&order, &decremented, &alerts);

        Ok(OrderWithItems { order, items })
    }

    /// Apply a status transition.
    ///
    /// Requesting the current status is an idempotent no-op that emits
    /// nothing; push to the customer fires only on an actual edge into
    /// `ready`.
    ///
    /// # Errors
    ///
    /// `OrderNotFound`, `InvalidState` for archived orders,
    /// `InvalidTransition` for moves the state machine forbids, or
    /// `Store` on infrastructure failure.
    pub async fn transition(&self, order_id: OrderId, to: OrderStatus) -> Result<Order, OrderError> {
        let order = db::orders::get(&self.pool, order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;

        if order.archived {
            return Err(OrderError::InvalidState(format!(
                "order {order_id} is archived and cannot change status"
            )));
        }
        if order.status == to {
            return Ok(order);
        }
        if !order.status.can_transition_to(to) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to,
            });
        }

        let applied = db::orders::update_status(&self.pool, order_id, order.status, to).await?;
        if !applied {
            // Lost a race with a concurrent transition; judge the request
            // against the fresh state.
            let fresh = db::orders::get(&self.pool, order_id)
                .await?
                .ok_or(OrderError::OrderNotFound(order_id))?;
            if fresh.status == to {
                return Ok(fresh);
            }
            return Err(OrderError::InvalidTransition {
                from: fresh.status,
                to,
            });
        }

        let updated = db::orders::get(&self.pool, order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;

        self.notify_status_changed(&updated);

        Ok(updated)
    }

    /// Mark a terminal-state order as archived. Idempotent.
    ///
    /// # Errors
    ///
    /// `OrderNotFound`, `InvalidState` when the order is not terminal, or
    /// `Store` on infrastructure failure.
    pub async fn archive(&self, order_id: OrderId) -> Result<Order, OrderError> {
        let order = db::orders::get(&self.pool, order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;

        if order.archived {
            return Ok(order);
        }
        if !order.status.is_terminal() {
            return Err(OrderError::InvalidState(format!(
                "order {order_id} is {} and cannot be archived",
                order.status
            )));
        }

        db::orders::set_archived(&self.pool, order_id).await?;

        db::orders::get(&self.pool, order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    fn notify_order_placed(
        &self,
        order: &Order,
        stock: &[StockRow],
        alerts: &[(StockAlert, String)],
    ) {
        let at = Utc::now();

        for row in stock {
            self.hub.publish_stock(
                EVENT_STOCK_UPDATE,
                &json!({ "product_id": row.id, "stock": row.stock, "at": at }),
            );
        }

        for (alert, _) in alerts {
            self.hub.publish_staff(
                EVENT_RESTOCK_UPDATE,
                &json!({
                    "product_id": alert.product_id,
                    "stock": alert.stock_at_event,
                    "level": alert.level,
                    "at": at,
                }),
            );
        }

        let payload = json!({
            "order_id": order.id,
            "status": order.status,
            "total": order.total,
            "currency": order.currency,
            "user_id": order.user_id,
            "at": at,
        });
        self.hub.publish_staff(EVENT_ORDER_CREATED, &payload);
        self.hub
            .publish_customer(order.user_id, EVENT_ORDER_CREATED, &payload);

        for (alert, name) in alerts {
            let push = self.push.clone();
            let title = match alert.level {
                StockLevel::Critical => "Out of stock",
                StockLevel::Low => "Low stock",
            };
            let payload = PushPayload::new(
                "restock_alert",
                title,
                format!("{name}: {} units left", alert.stock_at_event),
            )
            .with_entity("product_id", alert.product_id.as_i32());
            tokio::spawn(async move {
                let outcome = push.push_to_roles(&STAFF_ROLES, &payload).await;
                tracing::debug!(?outcome, "restock push dispatched");
            });
        }
    }

    fn notify_status_changed(&self, order: &Order) {
        let payload = json!({
            "order_id": order.id,
            "status": order.status,
            "user_id": order.user_id,
            "at": Utc::now(),
        });
        self.hub.publish_staff(EVENT_ORDER_STATUS_CHANGED, &payload);
        self.hub
            .publish_customer(order.user_id, EVENT_ORDER_STATUS_CHANGED, &payload);

        // Edge-trigger: this runs only after an actual state change, so a
        // repeated no-op request never re-notifies.
        if order.status == OrderStatus::Ready {
            let push = self.push.clone();
            let user_id = order.user_id;
            let payload = PushPayload::new(
                "order_ready",
                "Order ready",
                format!("Order #{} is ready for pickup", order.id),
            )
            .with_entity("order_id", order.id.as_i32());
            tokio::spawn(async move {
                let outcome = push.push_to_user(user_id, &payload).await;
                tracing::debug!(?outcome, "order-ready push dispatched");
            });
        }
    }
}

/// Normalize a raw cart: drop malformed lines, merge duplicate products by
/// summing quantities, preserve first-seen order.
///
/// Dropping (rather than rejecting) malformed lines mirrors the API
/// contract; an entirely invalid cart surfaces as `InvalidInput` in
/// [`OrderService::place_order`].
fn normalize_cart(lines: &[CartLine]) -> Vec<(ProductId, i32)> {
    let mut ordered: Vec<(ProductId, i64)> = Vec::new();
    let mut index: HashMap<ProductId, usize> = HashMap::new();

    for line in lines {
        if line.quantity <= 0 {
            continue;
        }
        if let Some(&at) = index.get(&line.product_id) {
            if let Some(entry) = ordered.get_mut(at) {
                entry.1 = entry.1.saturating_add(line.quantity);
            }
        } else {
            index.insert(line.product_id, ordered.len());
            ordered.push((line.product_id, line.quantity));
        }
    }

    ordered
        .into_iter()
        .map(|(product, qty)| {
            let qty = i32::try_from(qty.min(i64::from(i32::MAX))).unwrap_or(i32::MAX);
            (product, qty)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: i32, quantity: i64) -> CartLine {
        CartLine {
            product_id: ProductId::new(product_id),
            quantity,
        }
    }

    #[test]
    fn duplicate_lines_are_merged() {
        let cart = normalize_cart(&[line(10, 2), line(11, 1), line(10, 3)]);
        assert_eq!(
            cart,
            vec![(ProductId::new(10), 5), (ProductId::new(11), 1)]
        );
    }

    #[test]
    fn malformed_lines_are_dropped_silently() {
        let cart = normalize_cart(&[line(10, 0), line(11, -4), line(12, 2)]);
        assert_eq!(cart, vec![(ProductId::new(12), 2)]);
    }

    #[test]
    fn fully_malformed_cart_normalizes_to_empty() {
        assert!(normalize_cart(&[line(10, 0), line(10, -1)]).is_empty());
        assert!(normalize_cart(&[]).is_empty());
    }

    #[test]
    fn oversized_quantities_saturate() {
        let cart = normalize_cart(&[line(10, i64::from(i32::MAX)), line(10, 50)]);
        assert_eq!(cart, vec![(ProductId::new(10), i32::MAX)]);
    }

    #[test]
    fn rejections_name_the_offending_entity() {
        let err = OrderError::InsufficientStock {
            product: ProductId::new(10),
            available: 2,
        };
        assert_eq!(err.to_string(), "product 10 has only 2 units available");

        let err = OrderError::InvalidTransition {
            from: OrderStatus::Ready,
            to: OrderStatus::InProgress,
        };
        assert_eq!(err.to_string(), "order cannot move from ready to in_progress");
    }
}
