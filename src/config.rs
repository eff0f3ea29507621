// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

const DEFAULT_SESSION_TTL_DAYS: i64 = 30;
const MAX_SESSION_TTL_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub rust_log: String,
    pub bind_addr: String,

    /// Shared registration secret. `None` keeps registration closed.
    pub invite_code: Option<String>,

    pub session_ttl_days: i64,
    /// Adds the `Secure` attribute to the session cookie.
    pub cookie_secure: bool,

    pub upload_dir: String,
    pub max_upload_bytes: usize,

    /// Seconds to replenish one request slot / burst size, for login and register.
    pub auth_rate_period_secs: u64,
    pub auth_rate_burst: u32,
    /// Same for the bulk read endpoints.
    pub api_rate_period_secs: u64,
    pub api_rate_burst: u32,

    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://market.db".to_string());

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        // An empty value counts as unset.
        let invite_code = env::var("INVITE_CODE").ok().filter(|c| !c.trim().is_empty());

        let mut session_ttl_days = parse_or("SESSION_TTL_DAYS", DEFAULT_SESSION_TTL_DAYS);
        if !ttl_days_in_range(session_ttl_days) {
            tracing::warn!(
                "Ignoring SESSION_TTL_DAYS={} outside 1..={}, using {}",
                session_ttl_days,
                MAX_SESSION_TTL_DAYS,
                DEFAULT_SESSION_TTL_DAYS
            );
            session_ttl_days = DEFAULT_SESSION_TTL_DAYS;
        }

        Self {
            database_url,
            rust_log,
            bind_addr,
            invite_code,
            session_ttl_days,
            cookie_secure: parse_or("COOKIE_SECURE", false),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 5 * 1024 * 1024),
            // 10 attempts per 15 minutes
            auth_rate_period_secs: parse_or("AUTH_RATE_PERIOD_SECS", 90),
            auth_rate_burst: parse_or("AUTH_RATE_BURST", 10),
            // 50 requests per 15 minutes
            api_rate_period_secs: parse_or("API_RATE_PERIOD_SECS", 18),
            api_rate_burst: parse_or("API_RATE_BURST", 50),
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        }
    }

    /// Session lifetime. Out-of-range day counts mean the default 30 days.
    pub fn session_ttl(&self) -> chrono::Duration {
        let days = if ttl_days_in_range(self.session_ttl_days) {
            self.session_ttl_days
        } else {
            DEFAULT_SESSION_TTL_DAYS
        };
        chrono::Duration::days(days)
    }
}

/// Upper bound keeps `now + ttl` far away from chrono's date limits.
fn ttl_days_in_range(days: i64) -> bool {
    (1..=MAX_SESSION_TTL_DAYS).contains(&days)
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
