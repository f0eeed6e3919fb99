//! Restock alert history.

use axum::{Json, Router, extract::State, routing::get};

use crate::db;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::StockAlertEntry;
use crate::state::AppState;

const HISTORY_LIMIT: i64 = 200;

/// Build the alerts router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/restock-alerts", get(list_alerts))
}

/// Alert history for the staff dashboard, critical entries first.
async fn list_alerts(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<StockAlertEntry>>, AppError> {
    user.require_staff()?;
    let alerts = db::stock_alerts::list(state.pool(), HISTORY_LIMIT).await?;
    Ok(Json(alerts))
}
