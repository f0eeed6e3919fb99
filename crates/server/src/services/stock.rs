//! Manual stock adjustment.
//!
//! Shares the threshold rule (`StockLevel::evaluate`) and the notification
//! fan-out with the order-driven decrement, so both paths stay in lock-step.

use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;

use almacen_core::{ProductId, Role, StockLevel};

use crate::db::{self, RepositoryError};
use crate::models::StockAlert;
use crate::realtime::{EVENT_RESTOCK_UPDATE, EVENT_STOCK_UPDATE, EventHub};
use crate::services::push::{PushPayload, PushService};

/// Typed rejections of the stock adjustment flow.
#[derive(Debug, Error)]
pub enum StockError {
    /// The adjustment parameters were malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The product does not exist.
    #[error("product {0} does not exist")]
    ProductNotFound(ProductId),

    /// Infrastructure failure; the only retryable kind.
    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}

/// Result of a manual stock adjustment.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub stock: i32,
    pub alert: Option<StockAlert>,
}

/// Staff roles that receive restock pushes.
const STAFF_ROLES: [Role; 2] = [Role::Operator, Role::Admin];

/// Manual stock adjustment service.
#[derive(Clone)]
pub struct StockService {
    pool: PgPool,
    hub: EventHub,
    push: PushService,
}

impl StockService {
    #[must_use]
    pub const fn new(pool: PgPool, hub: EventHub, push: PushService) -> Self {
        Self { pool, hub, push }
    }

    /// Set the absolute stock of a product.
    ///
    /// Applies the same threshold evaluation as the order-driven decrement:
    /// a resulting stock at or below the threshold records an alert row in
    /// the same transaction, and the same events fan out after commit.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for negative stock, `ProductNotFound` for an unknown
    /// product, `Store` on infrastructure failure.
    pub async fn set_stock(
        &self,
        product_id: ProductId,
        stock: i32,
    ) -> Result<StockAdjustment, StockError> {
        if stock < 0 {
            return Err(StockError::InvalidInput(
                "stock cannot be negative".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let Some(stock) = db::products::set_stock(&mut tx, product_id, stock).await? else {
            return Err(StockError::ProductNotFound(product_id));
        };

        let mut alert = None;
        if let Some(level) = StockLevel::evaluate(stock) {
            alert = Some(db::stock_alerts::insert(&mut tx, product_id, stock, level).await?);
        }

        tx.commit().await.map_err(RepositoryError::from)?;

        self.notify(product_id, stock, alert.as_ref());

        Ok(StockAdjustment {
            product_id,
            stock,
            alert,
        })
    }

    fn notify(&self, product_id: ProductId, stock: i32, alert: Option<&StockAlert>) {
        let at = Utc::now();

        self.hub.publish_stock(
            EVENT_STOCK_UPDATE,
            &json!({ "product_id": product_id, "stock": stock, "at": at }),
        );

        if let Some(alert) = alert {
            self.hub.publish_staff(
                EVENT_RESTOCK_UPDATE,
                &json!({
                    "product_id": alert.product_id,
                    "stock": alert.stock_at_event,
                    "level": alert.level,
                    "at": at,
                }),
            );

            let push = self.push.clone();
            let title = match alert.level {
                StockLevel::Critical => "Out of stock",
                StockLevel::Low => "Low stock",
            };
            let payload = PushPayload::new(
                "restock_alert",
                title,
                format!("Product {product_id}: {stock} units left"),
            )
            .with_entity("product_id", product_id.as_i32());
            tokio::spawn(async move {
                let outcome = push.push_to_roles(&STAFF_ROLES, &payload).await;
                tracing::debug!(?outcome, "restock push dispatched");
            });
        }
    }
}
