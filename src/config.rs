//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `JWT_SECRET` - bearer token signing key (min 16 chars)
//!
//! ## Optional
//! - `HOST` / `PORT` - bind address (default: 0.0.0.0:5000)
//! - `APP_ENV` - `development` or `production` (default: development)
//! - `DATABASE_URL` - `PostgreSQL` URL; without it an in-memory store is used
//! - `DATABASE_MAX_CONNECTIONS` - pool size (default: 10)
//! - `JWT_TTL_DAYS` - token lifetime (default: 7)
//! - `FRONTEND_URL` - allowed CORS origin (default: <http://localhost:3000>)
//! - `RAZORPAY_KEY_ID` / `RAZORPAY_KEY_SECRET` - payment gateway credentials
//! - `RAZORPAY_BASE_URL` - gateway API root (default: <https://api.razorpay.com/v1>)
//! - `NATS_URL` - event bus; events are only logged when unset
//! - `ADMIN_EMAIL` / `ADMIN_PASSWORD` / `ADMIN_NAME` - bootstrap admin account

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Development => "development", Self::Production => "production" }
    }
    pub fn is_development(&self) -> bool { *self == Self::Development }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    pub environment: Environment,
    pub database_url: Option<SecretString>,
    pub database_max_connections: u32,
    pub jwt_secret: SecretString,
    pub jwt_ttl_days: i64,
    pub frontend_url: String,
    pub gateway: GatewayConfig,
    pub nats_url: Option<String>,
    pub admin: Option<AdminBootstrap>,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: SecretString,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub name: String,
    pub email: String,
    pub password: SecretString,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let host = parse_env("HOST", "0.0.0.0")?;
        let port = parse_env("PORT", "5000")?;
        let environment = match get_env_or_default("APP_ENV", "development").as_str() {
            "development" | "dev" => Environment::Development,
            "production" | "prod" => Environment::Production,
            other => return Err(ConfigError::InvalidEnvVar("APP_ENV".into(), format!("unknown environment '{other}'"))),
        };

        let jwt_secret = get_required_env("JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::InvalidEnvVar(
                "JWT_SECRET".into(),
                format!("must be at least {MIN_JWT_SECRET_LENGTH} characters"),
            ));
        }

        let admin = match (get_optional_env("ADMIN_EMAIL"), get_optional_env("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                name: get_env_or_default("ADMIN_NAME", "Administrator"),
                email,
                password: SecretString::from(password),
            }),
            _ => None,
        };

        Ok(Self {
            host,
            port,
            environment,
            database_url: get_optional_env("DATABASE_URL").map(SecretString::from),
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10")?,
            jwt_secret: SecretString::from(jwt_secret),
            jwt_ttl_days: parse_env("JWT_TTL_DAYS", "7")?,
            frontend_url: get_env_or_default("FRONTEND_URL", "http://localhost:3000"),
            gateway: GatewayConfig {
                key_id: get_env_or_default("RAZORPAY_KEY_ID", ""),
                key_secret: SecretString::from(get_env_or_default("RAZORPAY_KEY_SECRET", "")),
                base_url: get_env_or_default("RAZORPAY_BASE_URL", "https://api.razorpay.com/v1"),
            },
            nats_url: get_optional_env("NATS_URL"),
            admin,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    get_optional_env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
