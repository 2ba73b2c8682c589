// src/config.rs

use dotenvy::dotenv;
use std::{env, str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL; the in-memory driver is used when absent.
    pub database_url: Option<String>,
    /// Redis URL; the in-process cache is used when absent.
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    /// 32-byte key (hex or base64) for pagination cursors.
    pub cursor_key: String,
    pub rust_log: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub db_connect_attempts: u32,
    pub db_connect_timeout: Duration,
    pub cache_ttl: Duration,
}

/// Unset means `default`; a value that is set but does not parse is an error.
fn parse_or<T: FromStr>(key: &str, raw: Option<&str>, default: T) -> Result<T, String> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| format!("{key} has an invalid value: '{value}'")),
    }
}

fn var_or<T: FromStr>(key: &str, default: T) -> T {
    let raw = env::var(key).ok();
    parse_or(key, raw.as_deref(), default).unwrap_or_else(|e| panic!("{e}"))
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok();
        let redis_url = env::var("REDIS_URL").ok();

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let cursor_key = env::var("CURSOR_KEY").expect("CURSOR_KEY must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            database_url,
            redis_url,
            jwt_secret,
            jwt_expiration: var_or("JWT_EXPIRATION", 86_400),
            cursor_key,
            rust_log,
            port: var_or("PORT", 3000),
            db_max_connections: var_or("DB_MAX_CONNECTIONS", 5),
            db_connect_attempts: var_or("DB_CONNECT_ATTEMPTS", 5),
            db_connect_timeout: Duration::from_secs(var_or("DB_CONNECT_TIMEOUT", 3)),
            cache_ttl: Duration::from_secs(var_or("CACHE_TTL", 3600)),
        }
    }
}
