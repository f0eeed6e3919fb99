//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `JWT_ACCESS_SECRET` - access token signing secret (min 32 chars, high entropy)
//! - `JWT_REFRESH_SECRET` - refresh token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `ALMACEN_HOST` - bind address (default: 127.0.0.1)
//! - `ALMACEN_PORT` - listen port (default: 3000)
//! - `ACCESS_TOKEN_TTL_MINUTES` - access token lifetime (default: 15)
//! - `REFRESH_TOKEN_TTL_DAYS` - refresh token lifetime (default: 7)
//! - `CORS_ALLOWED_ORIGINS` - comma-separated origin allowlist (default: none)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//!
//! ## Optional (Web Push - absent means push delivery is disabled)
//! - `VAPID_SUBJECT` - contact URI for the push gateway (mailto: or https:)
//! - `VAPID_PUBLIC_KEY` - base64url-encoded VAPID public key
//! - `VAPID_PRIVATE_KEY` - base64url-encoded VAPID private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// JWT signing configuration
    pub jwt: JwtConfig,
    /// Web Push VAPID identity (optional - absent disables push delivery)
    pub vapid: Option<VapidConfig>,
    /// Origins allowed by CORS (empty means no browser origins are allowed)
    pub cors_origins: Vec<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
}

/// JWT signing configuration.
///
/// Implements `Debug` manually to redact both secrets.
#[derive(Clone)]
pub struct JwtConfig {
    /// Access token signing secret
    pub access_secret: SecretString,
    /// Refresh token signing secret
    pub refresh_secret: SecretString,
    /// Access token lifetime in minutes
    pub access_ttl_minutes: i64,
    /// Refresh token lifetime in days
    pub refresh_ttl_days: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .field("refresh_ttl_days", &self.refresh_ttl_days)
            .finish()
    }
}

/// VAPID identity for the Web Push gateway.
///
/// Implements `Debug` manually to redact the private key.
#[derive(Clone)]
pub struct VapidConfig {
    /// Contact URI presented to push gateways (mailto: or https:)
    pub subject: String,
    /// Base64url-encoded public key, served to browsers
    pub public_key: String,
    /// Base64url-encoded private key used to sign deliveries
    pub private_key: SecretString,
}

impl std::fmt::Debug for VapidConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidConfig")
            .field("subject", &self.subject)
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

impl VapidConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let subject = get_optional_env("VAPID_SUBJECT");
        let public_key = get_optional_env("VAPID_PUBLIC_KEY");
        let private_key = get_optional_env("VAPID_PRIVATE_KEY");

        match (subject, public_key, private_key) {
            (Some(subject), Some(public_key), Some(private_key)) => Ok(Some(Self {
                subject,
                public_key,
                private_key: SecretString::from(private_key),
            })),
            (None, None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "VAPID_*".to_string(),
                "VAPID_SUBJECT, VAPID_PUBLIC_KEY and VAPID_PRIVATE_KEY must be set together"
                    .to_string(),
            )),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = SecretString::from(get_required_env("DATABASE_URL")?);
        let host = get_env_or_default("ALMACEN_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ALMACEN_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("ALMACEN_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("ALMACEN_PORT".to_string(), e.to_string()))?;

        let jwt = JwtConfig::from_env()?;
        let vapid = VapidConfig::from_env()?;

        let cors_origins = get_optional_env("CORS_ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            database_url,
            host,
            port,
            jwt,
            vapid,
            cors_origins,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns the VAPID identity, if push delivery is configured.
    #[must_use]
    pub const fn vapid(&self) -> Option<&VapidConfig> {
        self.vapid.as_ref()
    }
}

impl JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let access_secret = get_validated_secret("JWT_ACCESS_SECRET")?;
        validate_secret_length(&access_secret, "JWT_ACCESS_SECRET")?;
        let refresh_secret = get_validated_secret("JWT_REFRESH_SECRET")?;
        validate_secret_length(&refresh_secret, "JWT_REFRESH_SECRET")?;

        let access_ttl_minutes = get_env_or_default("ACCESS_TOKEN_TTL_MINUTES", "15")
            .parse::<i64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("ACCESS_TOKEN_TTL_MINUTES".to_string(), e.to_string())
            })?;
        let refresh_ttl_days = get_env_or_default("REFRESH_TOKEN_TTL_DAYS", "7")
            .parse::<i64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("REFRESH_TOKEN_TTL_DAYS".to_string(), e.to_string())
            })?;

        Ok(Self {
            access_secret,
            refresh_secret,
            access_ttl_minutes,
            refresh_ttl_days,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_SECRET_LENGTH} characters (got {})",
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real signing secrets are randomly generated and have high entropy.
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn entropy_of_repeated_char_is_zero() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn entropy_of_random_string_is_high() {
        assert!(shannon_entropy("kT7#pW2$mQ9@xR4!vB6^") > 3.3);
    }

    #[test]
    fn placeholder_secrets_are_rejected() {
        assert!(validate_secret_strength("changeme-please-1234567890", "T").is_err());
        assert!(validate_secret_strength("your-jwt-key-here-1234567890", "T").is_err());
    }

    #[test]
    fn low_entropy_secrets_are_rejected() {
        let result = validate_secret_strength("abababababababababababababababab", "T");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn strong_secrets_are_accepted() {
        assert!(validate_secret_strength("kT7#pW2$mQ9@xR4!vB6^nZ1&cJ5*hL8(", "T").is_ok());
    }

    #[test]
    fn short_secrets_are_rejected() {
        let secret = SecretString::from("short");
        assert!(validate_secret_length(&secret, "T").is_err());
        let secret = SecretString::from("k".repeat(32));
        assert!(validate_secret_length(&secret, "T").is_ok());
    }

    #[test]
    fn jwt_config_debug_redacts_secrets() {
        let config = JwtConfig {
            access_secret: SecretString::from("access-signing-key-value"),
            refresh_secret: SecretString::from("refresh-signing-key-value"),
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("access-signing-key-value"));
        assert!(!debug_output.contains("refresh-signing-key-value"));
    }

    #[test]
    fn vapid_config_debug_redacts_private_key() {
        let config = VapidConfig {
            subject: "mailto:ops@almacen.example".to_string(),
            public_key: "BPged...".to_string(),
            private_key: SecretString::from("vapid-private-key-value"),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("mailto:ops@almacen.example"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("vapid-private-key-value"));
    }
}
