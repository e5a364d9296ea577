//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `PROMOSTOCK_BIND_ADDR` - listen address (default: `0.0.0.0:8080`)
//! - `JWT_SECRET` - HS256 signing secret of bearer tokens
//! - `USE_PERSISTENT_STORES` - `true` selects the Postgres event store (default: `false`)
//! - `DATABASE_URL` - Postgres connection string, required when persistent
//! - `PROMOSTOCK_COMMAND_RETRIES` - stale-append retries per command (default: 3)
//! - `PROMOSTOCK_MAX_PAGE_SIZE` - upper bound of history page sizes (default: 100)
//!
//! Without persistent stores a missing `JWT_SECRET` falls back to a fixed
//! development secret.

use std::net::SocketAddr;

use secrecy::SecretString;
use thiserror::Error;
use tracing::warn;

use crate::command_dispatcher::DEFAULT_COMMAND_RETRIES;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;
const DEV_JWT_SECRET: &str = "promostock-dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: SecretString,
    pub use_persistent_stores: bool,
    pub database_url: Option<SecretString>,
    pub command_retries: u32,
    pub max_page_size: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"[REDACTED]")
            .field("use_persistent_stores", &self.use_persistent_stores)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("command_retries", &self.command_retries)
            .field("max_page_size", &self.max_page_size)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr: SocketAddr = parse_or(&var, "PROMOSTOCK_BIND_ADDR", || {
            DEFAULT_BIND_ADDR.parse().map_err(|e: std::net::AddrParseError| e.to_string())
        })?;
        let use_persistent_stores = match var("USE_PERSISTENT_STORES") {
            Some(v) => parse_bool(&v).ok_or_else(|| {
                ConfigError::InvalidEnvVar("USE_PERSISTENT_STORES".to_string(), v.clone())
            })?,
            None => false,
        };

        let database_url = var("DATABASE_URL").map(SecretString::from);
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
        }

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => SecretString::from(secret),
            None if use_persistent_stores => {
                return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
            }
            None => {
                warn!("JWT_SECRET not set, using the development secret");
                SecretString::from(DEV_JWT_SECRET)
            }
        };

        let command_retries = parse_or(&var, "PROMOSTOCK_COMMAND_RETRIES", || {
            Ok(DEFAULT_COMMAND_RETRIES)
        })?;
        let max_page_size: usize =
            parse_or(&var, "PROMOSTOCK_MAX_PAGE_SIZE", || Ok(DEFAULT_MAX_PAGE_SIZE))?;
        if max_page_size == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PROMOSTOCK_MAX_PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            jwt_secret,
            use_persistent_stores,
            database_url,
            command_retries,
            max_page_size,
        })
    }
}

fn parse_or<T>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: impl FnOnce() -> Result<T, String>,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => default().map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e)),
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
