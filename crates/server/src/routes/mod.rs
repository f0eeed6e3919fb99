//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST /api/auth/register        - Create a customer account
//! POST /api/auth/login           - Issue access + refresh tokens
//! POST /api/auth/refresh         - Exchange a refresh token
//! POST /api/auth/logout          - Revoke a refresh session
//!
//! # Catalog
//! GET   /api/products            - Active products (public)
//! GET   /api/products/all        - Full catalog (staff)
//! PATCH /api/products/{id}       - Patch a product (staff)
//! GET   /api/products/{id}/image - Product image bytes (public)
//!
//! # Orders
//! POST  /api/orders              - Place an order (customer|admin)
//! GET   /api/orders/mine         - Own orders (customer|admin)
//! GET   /api/orders              - All orders (staff)
//! GET   /api/orders/{id}         - Order detail (owner or staff)
//! PATCH /api/orders/{id}/status  - Transition an order (staff)
//! POST  /api/orders/{id}/archive - Archive a terminal order (staff)
//! GET   /api/orders/stream       - Staff order event stream (SSE)
//! GET   /api/orders/stream/mine  - Own order event stream (SSE)
//!
//! # Stock
//! PUT /api/stock/{id}            - Set absolute stock (staff)
//! GET /api/stock/stream          - Live stock event stream (SSE, any user)
//!
//! # Restock alerts
//! GET /api/restock-alerts        - Alert history (staff)
//!
//! # Web Push
//! GET  /api/push/public-key      - VAPID public key (public)
//! POST /api/push/subscribe       - Register a subscription
//! POST /api/push/unsubscribe     - Remove a subscription by endpoint
//! GET  /api/push/subscriptions   - Own subscriptions
//! POST /api/push/test            - Send a self-test push
//! ```

use axum::Router;

use crate::state::AppState;

pub mod alerts;
pub mod auth;
pub mod orders;
pub mod products;
pub mod push;
pub mod stock;
mod stream;

/// Build the API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(products::router())
        .merge(orders::router())
        .merge(stock::router())
        .merge(alerts::router())
        .merge(push::router())
}
