use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Desktop browser user agent; some vendor storefronts reject obvious bot agents.
pub const DEFAULT_SCRAPER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does not read `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Parse and validate configuration through an arbitrary env-var lookup, so
/// tests can feed a plain map instead of touching the process environment.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("NUTRIPRICE_ENV", "development"));

    let bind_addr: SocketAddr = parse_as(
        "NUTRIPRICE_BIND_ADDR",
        &or_default("NUTRIPRICE_BIND_ADDR", "0.0.0.0:3040"),
    )?;
    let log_level = or_default("NUTRIPRICE_LOG_LEVEL", "info");
    let api_keys = parse_api_keys(&or_default("NUTRIPRICE_API_KEYS", ""));

    let db_max_connections = parse_as(
        "NUTRIPRICE_DB_MAX_CONNECTIONS",
        &or_default("NUTRIPRICE_DB_MAX_CONNECTIONS", "10"),
    )?;
    let db_min_connections = parse_as(
        "NUTRIPRICE_DB_MIN_CONNECTIONS",
        &or_default("NUTRIPRICE_DB_MIN_CONNECTIONS", "1"),
    )?;
    let db_acquire_timeout_secs = parse_as(
        "NUTRIPRICE_DB_ACQUIRE_TIMEOUT_SECS",
        &or_default("NUTRIPRICE_DB_ACQUIRE_TIMEOUT_SECS", "10"),
    )?;

    let scraper_request_timeout_secs = parse_as(
        "NUTRIPRICE_SCRAPER_REQUEST_TIMEOUT_SECS",
        &or_default("NUTRIPRICE_SCRAPER_REQUEST_TIMEOUT_SECS", "15"),
    )?;
    let scraper_user_agent = or_default("NUTRIPRICE_SCRAPER_USER_AGENT", DEFAULT_SCRAPER_USER_AGENT);
    let scraper_max_concurrent_requests: usize = parse_as(
        "NUTRIPRICE_SCRAPER_MAX_CONCURRENT_REQUESTS",
        &or_default("NUTRIPRICE_SCRAPER_MAX_CONCURRENT_REQUESTS", "8"),
    )?;
    if scraper_max_concurrent_requests == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "NUTRIPRICE_SCRAPER_MAX_CONCURRENT_REQUESTS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let scraper_max_retries = parse_as(
        "NUTRIPRICE_SCRAPER_MAX_RETRIES",
        &or_default("NUTRIPRICE_SCRAPER_MAX_RETRIES", "2"),
    )?;
    let scraper_retry_backoff_ms = parse_as(
        "NUTRIPRICE_SCRAPER_RETRY_BACKOFF_MS",
        &or_default("NUTRIPRICE_SCRAPER_RETRY_BACKOFF_MS", "500"),
    )?;

    let vendor_domain = or_default("NUTRIPRICE_VENDOR_DOMAIN", "trendyol.com")
        .trim()
        .to_lowercase();
    let price_selector = or_default("NUTRIPRICE_PRICE_SELECTOR", ".prc-dsc");
    let cache_ttl_secs = parse_as(
        "NUTRIPRICE_CACHE_TTL_SECS",
        &or_default("NUTRIPRICE_CACHE_TTL_SECS", "300"),
    )?;
    let refresh_cron = lookup("NUTRIPRICE_REFRESH_CRON")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        api_keys,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        scraper_request_timeout_secs,
        scraper_user_agent,
        scraper_max_concurrent_requests,
        scraper_max_retries,
        scraper_retry_backoff_ms,
        vendor_domain,
        price_selector,
        cache_ttl_secs,
        refresh_cron,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s.trim() {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_as<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

fn parse_api_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
