//! Order models and order-placement inputs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use almacen_core::{OrderId, OrderItemId, OrderStatus, ProductId, UserId};

/// A committed order header.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total: Decimal,
    pub currency: String,
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of a committed order.
///
/// `name_snapshot` and `unit_price_snapshot` are the historical record taken
/// at order time; they never track later product edits. `product_id` is a
/// weak reference and becomes `None` if the product is ever deleted.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub name_snapshot: String,
    pub unit_price_snapshot: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}

/// An order together with its items, as returned by the detail endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Staff listing row: order header plus the owning customer's email.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub user_id: UserId,
    pub user_email: String,
    pub status: OrderStatus,
    pub total: Decimal,
    pub currency: String,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A raw cart line as submitted by a client.
///
/// Quantities arrive as `i64` so out-of-range values survive deserialization
/// and can be dropped during normalization instead of failing the request.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Delivery details captured with an order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryInfo {
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
}

/// A validated order line ready for insertion, with its price snapshot.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub name_snapshot: String,
    pub unit_price_snapshot: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}
