//! Unified error handling for the server.
//!
//! Business-rule rejections carry a human-readable reason naming the
//! offending entity and map to 4xx statuses; infrastructure failures map to
//! a generic 500 without leaking internal detail and are the only kind a
//! client should retry.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::orders::OrderError;
use crate::services::stock::StockError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Order placement or transition rejected.
    #[error("{0}")]
    Order(#[from] OrderError),

    /// Stock adjustment rejected.
    #[error("{0}")]
    Stock(#[from] StockError),

    /// Authentication flow rejected.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated principal lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body rendered for every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Order(err) => order_status(err),
            Self::Stock(err) => match err {
                StockError::ProductNotFound(_) => StatusCode::NOT_FOUND,
                StockError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                StockError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::InvalidToken => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::EmailTaken(_) => StatusCode::CONFLICT,
                AuthError::InvalidEmail(_) | AuthError::WeakPassword => StatusCode::BAD_REQUEST,
                AuthError::Store(_) | AuthError::Credential(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Whether this error is an infrastructure failure whose detail must not
    /// reach the client.
    fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Order(OrderError::Store(_))
                | Self::Stock(StockError::Store(_))
                | Self::Auth(AuthError::Store(_) | AuthError::Credential(_))
        )
    }
}

fn order_status(err: &OrderError) -> StatusCode {
    match err {
        OrderError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        OrderError::ProductNotFound(_) | OrderError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        OrderError::ProductInactive(_)
        | OrderError::InsufficientStock { .. }
        | OrderError::InvalidTransition { .. }
        | OrderError::InvalidState(_) => StatusCode::CONFLICT,
        OrderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log and capture infrastructure failures
        if self.is_internal() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "request failed with internal error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let message = if self.is_internal() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use almacen_core::{OrderId, OrderStatus, ProductId};

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn business_rejections_map_to_client_errors() {
        assert_eq!(
            status_of(AppError::Order(OrderError::InvalidInput(
                "cart is empty".to_string()
            ))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::Order(OrderError::ProductNotFound(
                ProductId::new(4)
            ))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::Order(OrderError::InsufficientStock {
                product: ProductId::new(4),
                available: 1,
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::Order(OrderError::InvalidTransition {
                from: OrderStatus::Ready,
                to: OrderStatus::InProgress,
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::Order(OrderError::OrderNotFound(OrderId::new(1)))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn auth_rejections_map_to_expected_statuses() {
        assert_eq!(
            status_of(AppError::Auth(AuthError::InvalidCredentials)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AppError::Auth(AuthError::EmailTaken(
                "a@b.example".to_string()
            ))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::Forbidden("staff only".to_string())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn infrastructure_failures_hide_detail() {
        let err = AppError::Internal("pool exhausted on shard 3".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn business_errors_name_the_offending_entity() {
        let err = AppError::Order(OrderError::InsufficientStock {
            product: ProductId::new(10),
            available: 2,
        });
        let message = err.to_string();
        assert!(message.contains("10"));
        assert!(message.contains('2'));
    }
}
