//! Authentication extractors.
//!
//! [`AuthUser`] reads a `Bearer` access token from the `Authorization`
//! header. [`SseAuthUser`] reads the same token from the `?token=` query
//! parameter, because `EventSource` cannot set request headers.

use axum::extract::{FromRequestParts, Query};
use axum::http::{header, request::Parts};
use serde::Deserialize;

use almacen_core::{Role, UserId};

use crate::error::AppError;
use crate::services::auth::decode_access_token;
use crate::state::AppState;

/// The authenticated principal of a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: UserId,
    pub role: Role,
    pub email: String,
}

impl AuthUser {
    /// Require one of the given roles.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` naming the required roles.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            let roles: Vec<String> = allowed.iter().map(ToString::to_string).collect();
            Err(AppError::Forbidden(format!(
                "requires one of: {}",
                roles.join(", ")
            )))
        }
    }

    /// Require a staff role (operator or admin).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` for non-staff principals.
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden("staff only".to_string()))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Reuse a principal extracted earlier in the same request.
        if let Some(user) = parts.extensions.get::<Self>() {
            return Ok(user.clone());
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        let user = principal_from_token(state, token)?;
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// Authenticated principal for SSE endpoints (`?token=` query parameter).
#[derive(Debug, Clone)]
pub struct SseAuthUser(pub AuthUser);

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl FromRequestParts<AppState> for SseAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let query = Query::<TokenQuery>::try_from_uri(&parts.uri)
            .map_err(|_| AppError::Unauthorized("missing stream token".to_string()))?;
        let token = query
            .0
            .token
            .ok_or_else(|| AppError::Unauthorized("missing stream token".to_string()))?;

        Ok(Self(principal_from_token(state, &token)?))
    }
}

fn principal_from_token(state: &AppState, token: &str) -> Result<AuthUser, AppError> {
    let claims = decode_access_token(&state.config().jwt, token)
        .map_err(|_| AppError::Unauthorized("invalid or expired token".to_string()))?;

    Ok(AuthUser {
        id: claims.user_id().map_err(|_| {
            AppError::Unauthorized("invalid or expired token".to_string())
        })?,
        role: claims.role,
        email: claims.email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            id: UserId::new(1),
            role,
            email: "t@almacen.example".to_string(),
        }
    }

    #[test]
    fn staff_gate() {
        assert!(user(Role::Operator).require_staff().is_ok());
        assert!(user(Role::Admin).require_staff().is_ok());
        assert!(user(Role::Customer).require_staff().is_err());
    }

    #[test]
    fn role_gate_matches_operation_matrix() {
        // Order creation: customer or admin, never operator.
        let create = [Role::Customer, Role::Admin];
        assert!(user(Role::Customer).require_role(&create).is_ok());
        assert!(user(Role::Admin).require_role(&create).is_ok());
        assert!(user(Role::Operator).require_role(&create).is_err());
    }
}
