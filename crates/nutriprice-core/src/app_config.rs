use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Bearer tokens accepted on write routes. Empty disables auth in development.
    pub api_keys: Vec<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scraper_request_timeout_secs: u64,
    pub scraper_user_agent: String,
    pub scraper_max_concurrent_requests: usize,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_ms: u64,
    /// Host (or parent domain) whose product pages the extractor understands.
    pub vendor_domain: String,
    /// CSS selector of the element holding the displayed price.
    pub price_selector: String,
    pub cache_ttl_secs: u64,
    /// Cron expression for the background full refresh; `None` disables it.
    pub refresh_cron: Option<String>,
}

impl AppConfig {
    #[must_use]
    pub fn is_development(&self) -> bool {
        self.env == Environment::Development
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("api_keys", &format!("[{} redacted]", self.api_keys.len()))
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field(
                "scraper_max_concurrent_requests",
                &self.scraper_max_concurrent_requests,
            )
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field("scraper_retry_backoff_ms", &self.scraper_retry_backoff_ms)
            .field("vendor_domain", &self.vendor_domain)
            .field("price_selector", &self.price_selector)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("refresh_cron", &self.refresh_cron)
            .finish()
    }
}
