//! Credential auth: registration, login, token refresh, logout.
//!
//! Access tokens are short-lived JWTs; refresh tokens are long-lived JWTs
//! whose SHA-256 digest is stored in the `sessions` table so they can be
//! revoked. The raw refresh token never touches the database.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::password_hash::rand_core::OsRng;
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use thiserror::Error;

use almacen_core::{Role, UserId};

use crate::config::JwtConfig;
use crate::db::{self, RepositoryError};
use crate::middleware::RequestMeta;
use crate::models::User;

const MIN_PASSWORD_LENGTH: usize = 8;

/// Typed rejections of the auth flows.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email, wrong password, or inactive account. Deliberately one
    /// generic variant so responses cannot be used to enumerate users.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The email address is malformed.
    #[error("invalid email: {0}")]
    InvalidEmail(String),

    /// The password does not meet the minimum length.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,

    /// The email is already registered.
    #[error("email {0} is already registered")]
    EmailTaken(String),

    /// The presented token is invalid, expired, or its session is dead.
    #[error("invalid or expired token")]
    InvalidToken,

    /// Password hashing failed (infrastructure).
    #[error("credential processing failed: {0}")]
    Credential(String),

    /// Infrastructure failure; the only retryable kind.
    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User ID.
    pub sub: String,
    pub role: Role,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl AccessClaims {
    /// The user ID the token was issued for.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` when the subject is not numeric.
    pub fn user_id(&self) -> Result<UserId, AuthError> {
        self.sub
            .parse::<i32>()
            .map(UserId::new)
            .map_err(|_| AuthError::InvalidToken)
    }
}

/// Claims carried by a refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RefreshClaims {
    sub: String,
    exp: i64,
    iat: i64,
}

/// Tokens and user returned by a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

/// Fresh access token returned by the refresh flow.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access_token: String,
    pub user_id: UserId,
    pub role: Role,
    pub email: String,
}

/// Credential auth service.
#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    jwt: JwtConfig,
}

impl AuthService {
    #[must_use]
    pub const fn new(pool: PgPool, jwt: JwtConfig) -> Self {
        Self { pool, jwt }
    }

    /// Register a new customer account.
    ///
    /// # Errors
    ///
    /// `InvalidEmail`, `WeakPassword`, `EmailTaken`, or `Store`.
    pub async fn register(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email)?;
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword);
        }

        let password_hash = hash_password(password)?;

        match db::users::insert(&self.pool, &email, &password_hash, Role::Customer).await {
            Ok(user) => Ok(user),
            Err(RepositoryError::Conflict(_)) => Err(AuthError::EmailTaken(email)),
            Err(err) => Err(err.into()),
        }
    }

    /// Log a user in with email and password.
    ///
    /// Issues an access token and a refresh token, stores the refresh
    /// token's digest as a session, and records the login time.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` on any credential mismatch (including inactive
    /// accounts), `Store` on infrastructure failure.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        meta: &RequestMeta,
    ) -> Result<LoginOutcome, AuthError> {
        let email = email.trim().to_lowercase();

        let Some(user) = db::users::find_by_email(&self.pool, &email).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !user.active || !verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self.issue_access_token(user.id, user.role, &user.email)?;
        let refresh_token = self.issue_refresh_token(user.id)?;

        let expires_at = Utc::now() + Duration::days(self.jwt.refresh_ttl_days);
        db::sessions::insert(
            &self.pool,
            user.id,
            &token_digest(&refresh_token),
            meta.user_agent.as_deref(),
            meta.ip.as_deref(),
            expires_at,
        )
        .await?;

        db::users::touch_last_login(&self.pool, user.id).await?;

        Ok(LoginOutcome {
            access_token,
            refresh_token,
            user,
        })
    }

    /// Exchange a live refresh token for a fresh access token.
    ///
    /// The token must verify, and its session row must exist, be unrevoked,
    /// be unexpired, and belong to a still-active user.
    ///
    /// # Errors
    ///
    /// `InvalidToken` on any verification failure, `Store` on
    /// infrastructure failure.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome, AuthError> {
        let claims = decode::<RefreshClaims>(
            refresh_token,
            &DecodingKey::from_secret(self.jwt.refresh_secret.expose_secret().as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?
        .claims;

        let Some(found) = db::sessions::find_by_hash(&self.pool, &token_digest(refresh_token)).await?
        else {
            return Err(AuthError::InvalidToken);
        };

        if claims.sub != found.session.user_id.to_string()
            || !found.session.is_live(Utc::now())
            || !found.user_active
        {
            return Err(AuthError::InvalidToken);
        }

        let access_token =
            self.issue_access_token(found.session.user_id, found.role, &found.email)?;

        Ok(RefreshOutcome {
            access_token,
            user_id: found.session.user_id,
            role: found.role,
            email: found.email,
        })
    }

    /// Revoke the session behind a refresh token.
    ///
    /// Always succeeds from the client's perspective; returns how many
    /// sessions were actually revoked (0 for an unknown or already-revoked
    /// token).
    ///
    /// # Errors
    ///
    /// `Store` on infrastructure failure.
    pub async fn logout(&self, refresh_token: &str) -> Result<u64, AuthError> {
        let revoked = db::sessions::revoke_by_hash(&self.pool, &token_digest(refresh_token)).await?;
        Ok(revoked)
    }

    /// Issue a signed access token for a principal.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Credential` if signing fails.
    pub fn issue_access_token(
        &self,
        user_id: UserId,
        role: Role,
        email: &str,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id.to_string(),
            role,
            email: email.to_string(),
            exp: (now + Duration::minutes(self.jwt.access_ttl_minutes)).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt.access_secret.expose_secret().as_bytes()),
        )
        .map_err(|e| AuthError::Credential(e.to_string()))
    }

    fn issue_refresh_token(&self, user_id: UserId) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            exp: (now + Duration::days(self.jwt.refresh_ttl_days)).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt.refresh_secret.expose_secret().as_bytes()),
        )
        .map_err(|e| AuthError::Credential(e.to_string()))
    }
}

/// Verify and decode an access token.
///
/// # Errors
///
/// Returns `AuthError::InvalidToken` when the token fails verification.
pub fn decode_access_token(jwt: &JwtConfig, token: &str) -> Result<AccessClaims, AuthError> {
    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(jwt.access_secret.expose_secret().as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::InvalidToken)
}

/// SHA-256 digest of a token, hex-encoded. What the sessions table stores
/// instead of the raw refresh token.
#[must_use]
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail(email))
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Credential(e.to_string()))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            access_secret: SecretString::from("test-access-signing-key-0123456789ab"),
            refresh_secret: SecretString::from("test-refresh-signing-key-0123456789a"),
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse battery staple").expect("hash");
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn token_digest_is_deterministic_and_distinct() {
        let a = token_digest("token-a");
        assert_eq!(a, token_digest("token-a"));
        assert_ne!(a, token_digest("token-b"));
        // Digests are 32 bytes hex-encoded, never the raw token.
        assert_eq!(a.len(), 64);
        assert!(!a.contains("token"));
    }

    #[test]
    fn email_normalization() {
        assert_eq!(
            normalize_email("  Ana@Example.COM ").expect("valid"),
            "ana@example.com"
        );
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ana@nodot").is_err());
    }

    #[tokio::test]
    async fn access_token_round_trips() {
        let jwt = jwt_config();
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/unused").expect("lazy pool");
        let service = AuthService::new(pool, jwt.clone());

        let token = service
            .issue_access_token(UserId::new(42), Role::Operator, "op@almacen.example")
            .expect("issue");
        let claims = decode_access_token(&jwt, &token).expect("decode");

        assert_eq!(claims.user_id().expect("user id"), UserId::new(42));
        assert_eq!(claims.role, Role::Operator);
        assert_eq!(claims.email, "op@almacen.example");
    }

    #[tokio::test]
    async fn tampered_token_is_rejected() {
        let jwt = jwt_config();
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/unused").expect("lazy pool");
        let service = AuthService::new(pool, jwt.clone());

        let token = service
            .issue_access_token(UserId::new(1), Role::Customer, "c@almacen.example")
            .expect("issue");

        let mut tampered = token.clone();
        tampered.push('x');
        assert!(decode_access_token(&jwt, &tampered).is_err());

        // A token signed with the refresh secret must not pass as an access
        // token.
        let refresh = service.issue_refresh_token(UserId::new(1)).expect("issue");
        assert!(decode_access_token(&jwt, &refresh).is_err());
    }
}
