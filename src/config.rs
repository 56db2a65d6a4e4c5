//! Runtime configuration for the restroom API.
//!
//! Values come from the environment (the binary loads `.env` first through
//! `dotenvy`). Everything is read once at startup into an immutable [`Config`].
use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional numeric environment variable with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. `None` runs on the in-memory store.
    pub db_url: Option<String>,

    /// Maximum number of pooled database connections.
    pub db_pool_max: u32,

    /// HTTP listen port.
    pub port: u16,

    /// Credentials for the administrator created when none exists.
    pub admin_username: String,
    pub admin_password: String,
}

/// Load configuration from environment variables.
///
/// - `DATABASE_URL` – PostgreSQL connection string (optional)
/// - `DB_POOL_MAX` – max DB connections (default: 10)
/// - `PORT` – listen port (default: 8080)
/// - `ADMIN_USERNAME` / `ADMIN_PASSWORD` – bootstrap admin (default: admin / admin123)
pub fn load_from_env() -> Result<Config> {
    let db_url = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());
    let db_pool_max = parse_env!("DB_POOL_MAX", u32, 10);
    let port = parse_env!("PORT", u16, 8080);
    let admin_username = env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".into());
    let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".into());

    Ok(Config {
        db_url,
        db_pool_max,
        port,
        admin_username,
        admin_password,
    })
}

/// Replace the password component of a connection URL with `****`.
pub fn mask_db_url(url: &str) -> String {
    let start = url.find("://").map_or(0, |i| i + 3);
    let Some(at) = url[start..].rfind('@').map(|i| start + i) else {
        return url.to_string();
    };
    match url[start..at].find(':') {
        Some(colon) => format!("{}:****{}", &url[..start + colon], &url[at..]),
        None => url.to_string(),
    }
}

impl Config {
    pub fn log_config(&self) {
        let db = self
            .db_url
            .as_deref()
            .map(mask_db_url)
            .unwrap_or_else(|| "<unset: in-memory store>".to_string());

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL   : {}", db);
        tracing::info!("  DB_POOL_MAX    : {}", self.db_pool_max);
        tracing::info!("  PORT           : {}", self.port);
        tracing::info!("  ADMIN_USERNAME : {}", self.admin_username);
    }
}
