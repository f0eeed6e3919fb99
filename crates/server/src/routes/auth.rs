//! Auth route handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::middleware::RequestMeta;
use crate::models::User;
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    user: User,
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    access_token: String,
    user: RefreshedUser,
}

#[derive(Debug, Serialize)]
struct RefreshedUser {
    id: almacen_core::UserId,
    role: almacen_core::Role,
    email: String,
}

#[derive(Debug, Serialize)]
struct LogoutResponse {
    revoked: u64,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let service = AuthService::new(state.pool().clone(), state.config().jwt.clone());
    let user = service.register(&req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AppState>,
    meta: RequestMeta,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let service = AuthService::new(state.pool().clone(), state.config().jwt.clone());
    let outcome = service.login(&req.email, &req.password, &meta).await?;
    Ok(Json(LoginResponse {
        access_token: outcome.access_token,
        refresh_token: outcome.refresh_token,
        user: outcome.user,
    }))
}

async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    let service = AuthService::new(state.pool().clone(), state.config().jwt.clone());
    let outcome = service.refresh(&req.refresh_token).await?;
    Ok(Json(RefreshResponse {
        access_token: outcome.access_token,
        user: RefreshedUser {
            id: outcome.user_id,
            role: outcome.role,
            email: outcome.email,
        },
    }))
}

async fn logout(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<LogoutResponse>, AppError> {
    let service = AuthService::new(state.pool().clone(), state.config().jwt.clone());
    let revoked = service.logout(&req.refresh_token).await?;
    Ok(Json(LogoutResponse { revoked }))
}
