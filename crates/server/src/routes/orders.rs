//! Order route handlers, including the SSE streams.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde::Deserialize;

use almacen_core::{OrderId, OrderStatus, Role};

use crate::db;
use crate::error::AppError;
use crate::middleware::{AuthUser, RequestMeta, SseAuthUser};
use crate::models::{CartLine, DeliveryInfo, Order, OrderSummary, OrderWithItems};
use crate::routes::stream::sse_response;
use crate::services::orders::OrderService;
use crate::state::AppState;

/// Roles allowed to place and list their own orders.
const ORDER_PLACERS: [Role; 2] = [Role::Customer, Role::Admin];

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", post(create_order).get(list_orders))
        .route("/api/orders/mine", get(my_orders))
        .route("/api/orders/stream", get(stream_orders))
        .route("/api/orders/stream/mine", get(stream_my_orders))
        .route("/api/orders/{id}", get(order_detail))
        .route("/api/orders/{id}/status", patch(change_status))
        .route("/api/orders/{id}/archive", post(archive_order))
}

#[derive(Debug, Deserialize)]
struct CreateOrderRequest {
    items: Vec<CartLine>,
    #[serde(default)]
    delivery: DeliveryInfo,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
struct TransitionRequest {
    status: OrderStatus,
}

fn order_service(state: &AppState) -> OrderService {
    OrderService::new(
        state.pool().clone(),
        state.hub().clone(),
        state.push().clone(),
    )
}

/// Place an order from a cart.
async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderWithItems>), AppError> {
    user.require_role(&ORDER_PLACERS)?;

    let order = order_service(&state)
        .place_order(user.id, &req.items, &req.delivery, &meta)
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// The requesting customer's own orders.
async fn my_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Order>>, AppError> {
    user.require_role(&ORDER_PLACERS)?;
    let orders = db::orders::list_for_user(state.pool(), user.id).await?;
    Ok(Json(orders))
}

/// Staff listing of all orders, optionally filtered by status.
async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderSummary>>, AppError> {
    user.require_staff()?;
    let orders = db::orders::list_all(state.pool(), query.status).await?;
    Ok(Json(orders))
}

/// Order detail with items. Customers may only read their own orders.
async fn order_detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<Json<OrderWithItems>, AppError> {
    let id = OrderId::new(id);
    let Some(order) = db::orders::get_with_items(state.pool(), id).await? else {
        return Err(AppError::NotFound(format!("order {id}")));
    };

    if !user.role.is_staff() && order.order.user_id != user.id {
        return Err(AppError::Forbidden(
            "orders are only visible to their owner".to_string(),
        ));
    }

    Ok(Json(order))
}

/// Apply a status transition.
async fn change_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Order>, AppError> {
    user.require_staff()?;
    let order = order_service(&state)
        .transition(OrderId::new(id), req.status)
        .await?;
    Ok(Json(order))
}

/// Archive a terminal-state order.
async fn archive_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<Json<Order>, AppError> {
    user.require_staff()?;
    let order = order_service(&state).archive(OrderId::new(id)).await?;
    Ok(Json(order))
}

/// SSE stream of order events for the staff dashboard.
async fn stream_orders(
    State(state): State<AppState>,
    SseAuthUser(user): SseAuthUser,
) -> Result<impl IntoResponse, AppError> {
    user.require_staff()?;
    let (subscription, rx) = state.hub().subscribe_staff();
    Ok(sse_response(subscription, rx))
}

/// SSE stream of the requesting customer's own order events.
async fn stream_my_orders(
    State(state): State<AppState>,
    SseAuthUser(user): SseAuthUser,
) -> Result<impl IntoResponse, AppError> {
    let (subscription, rx) = state.hub().subscribe_customer(user.id);
    Ok(sse_response(subscription, rx))
}
