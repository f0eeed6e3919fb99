//! Stock adjustment and live stock stream.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
};
use serde::Deserialize;

use almacen_core::ProductId;

use crate::error::AppError;
use crate::middleware::{AuthUser, SseAuthUser};
use crate::routes::stream::sse_response;
use crate::services::stock::{StockAdjustment, StockService};
use crate::state::AppState;

/// Build the stock router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/stock/{id}", put(set_stock))
        .route("/api/stock/stream", get(stream_stock))
}

#[derive(Debug, Deserialize)]
struct SetStockRequest {
    stock: i32,
}

/// Set the absolute stock of a product (staff).
async fn set_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(req): Json<SetStockRequest>,
) -> Result<Json<StockAdjustment>, AppError> {
    user.require_staff()?;

    let service = StockService::new(
        state.pool().clone(),
        state.hub().clone(),
        state.push().clone(),
    );
    let adjustment = service.set_stock(ProductId::new(id), req.stock).await?;
    Ok(Json(adjustment))
}

/// SSE stream of live stock updates, open to any authenticated user.
async fn stream_stock(
    State(state): State<AppState>,
    SseAuthUser(_user): SseAuthUser,
) -> Result<impl IntoResponse, AppError> {
    let (subscription, rx) = state.hub().subscribe_stock();
    Ok(sse_response(subscription, rx))
}
