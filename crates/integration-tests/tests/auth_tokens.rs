//! Integration tests for token issuance and role gating.

use almacen_core::{Role, UserId};
use almacen_server::config::JwtConfig;
use almacen_server::middleware::AuthUser;
use almacen_server::services::auth::{AuthService, decode_access_token, token_digest};
use secrecy::SecretString;

fn jwt_config() -> JwtConfig {
    JwtConfig {
        access_secret: SecretString::from("integration-access-key-0123456789abcdef"),
        refresh_secret: SecretString::from("integration-refresh-key-0123456789abcde"),
        access_ttl_minutes: 15,
        refresh_ttl_days: 7,
    }
}

fn lazy_pool() -> sqlx::PgPool {
    sqlx::PgPool::connect_lazy("postgres://localhost/unused").expect("lazy pool")
}

#[tokio::test]
async fn issued_tokens_carry_the_principal() {
    let jwt = jwt_config();
    let service = AuthService::new(lazy_pool(), jwt.clone());

    let token = service
        .issue_access_token(UserId::new(7), Role::Admin, "admin@almacen.example")
        .expect("issue");

    let claims = decode_access_token(&jwt, &token).expect("decode");
    assert_eq!(claims.user_id().expect("id"), UserId::new(7));
    assert_eq!(claims.role, Role::Admin);
    assert_eq!(claims.email, "admin@almacen.example");
}

#[tokio::test]
async fn tokens_from_another_secret_are_rejected() {
    let service = AuthService::new(lazy_pool(), jwt_config());
    let token = service
        .issue_access_token(UserId::new(7), Role::Admin, "admin@almacen.example")
        .expect("issue");

    let other = JwtConfig {
        access_secret: SecretString::from("a-completely-different-secret-0123456"),
        ..jwt_config()
    };
    assert!(decode_access_token(&other, &token).is_err());
}

#[test]
fn refresh_digests_never_contain_the_token() {
    let digest = token_digest("eyJhbGciOiJIUzI1NiJ9.payload.signature");
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(!digest.contains("eyJ"));
}

// =============================================================================
// Role Matrix
// =============================================================================

fn principal(role: Role) -> AuthUser {
    AuthUser {
        id: UserId::new(1),
        role,
        email: "user@almacen.example".to_string(),
    }
}

#[test]
fn order_creation_is_customer_or_admin() {
    let allowed = [Role::Customer, Role::Admin];
    assert!(principal(Role::Customer).require_role(&allowed).is_ok());
    assert!(principal(Role::Admin).require_role(&allowed).is_ok());
    assert!(principal(Role::Operator).require_role(&allowed).is_err());
}

#[test]
fn catalog_mutation_is_staff_only() {
    assert!(principal(Role::Operator).require_staff().is_ok());
    assert!(principal(Role::Admin).require_staff().is_ok());
    assert!(principal(Role::Customer).require_staff().is_err());
}
