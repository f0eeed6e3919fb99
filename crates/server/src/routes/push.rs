//! Web Push subscription management routes.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::db;
use crate::error::AppError;
use crate::middleware::{AuthUser, RequestMeta};
use crate::models::{PushSubscription, PushSubscriptionInput};
use crate::services::push::{PushOutcome, PushPayload};
use crate::state::AppState;

/// Build the push router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/push/public-key", get(public_key))
        .route("/api/push/subscribe", post(subscribe))
        .route("/api/push/unsubscribe", post(unsubscribe))
        .route("/api/push/subscriptions", get(my_subscriptions))
        .route("/api/push/test", post(test_push))
}

#[derive(Debug, Serialize)]
struct PublicKeyResponse {
    enabled: bool,
    public_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnsubscribeRequest {
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct UnsubscribeResponse {
    removed: u64,
}

/// The VAPID public key browsers need to subscribe.
///
/// An unconfigured push identity is not an error; the response simply says
/// push is unavailable.
async fn public_key(State(state): State<AppState>) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        enabled: state.push().enabled(),
        public_key: state.push().public_key().map(ToString::to_string),
    })
}

/// Register (or refresh) a push subscription for the requesting user.
///
/// Upserts by endpoint, then prunes older endpoints registered from the
/// same device so each (user, device) pair keeps a single live row.
async fn subscribe(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Json(input): Json<PushSubscriptionInput>,
) -> Result<Json<PushSubscription>, AppError> {
    if input.endpoint.is_empty() {
        return Err(AppError::BadRequest("endpoint is required".to_string()));
    }

    let subscription = db::push_subscriptions::upsert(
        state.pool(),
        user.id,
        &input.endpoint,
        &input.keys.p256dh,
        &input.keys.auth,
        meta.user_agent.as_deref(),
    )
    .await?;

    if let Some(user_agent) = meta.user_agent.as_deref() {
        db::push_subscriptions::prune_same_device(
            state.pool(),
            user.id,
            user_agent,
            &input.endpoint,
        )
        .await?;
    }

    Ok(Json(subscription))
}

/// Remove a subscription by endpoint.
async fn unsubscribe(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(req): Json<UnsubscribeRequest>,
) -> Result<Json<UnsubscribeResponse>, AppError> {
    let removed = db::push_subscriptions::delete_by_endpoint(state.pool(), &req.endpoint).await?;
    Ok(Json(UnsubscribeResponse { removed }))
}

/// The requesting user's registered subscriptions.
async fn my_subscriptions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<PushSubscription>>, AppError> {
    let subscriptions = db::push_subscriptions::list_for_user(state.pool(), user.id).await?;
    Ok(Json(subscriptions))
}

/// Send a self-test push to the requesting user's devices.
async fn test_push(State(state): State<AppState>, user: AuthUser) -> Json<PushOutcome> {
    let payload = PushPayload::new(
        "test",
        "Push check",
        "Web Push delivery is working for this account",
    )
    .with_entity("user_id", user.id.as_i32());

    let outcome = state.push().push_to_user(user.id, &payload).await;
    Json(outcome)
}
