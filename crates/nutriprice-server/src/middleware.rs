use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Bearer-token settings for the write routes.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<Vec<String>>,
    pub enabled: bool,
}

impl AuthState {
    /// Builds auth from the configured `NUTRIPRICE_API_KEYS`.
    ///
    /// In development, an empty key list disables auth for local iteration.
    /// Anywhere else it fails startup.
    ///
    /// # Errors
    ///
    /// Returns an error when no keys are configured outside development.
    pub fn from_config(config: &nutriprice_core::AppConfig) -> anyhow::Result<Self> {
        if config.api_keys.is_empty() {
            if config.is_development() {
                tracing::warn!(
                    "NUTRIPRICE_API_KEYS not set; bearer auth disabled in development environment"
                );
                return Ok(Self::disabled());
            }

            anyhow::bail!(
                "NUTRIPRICE_API_KEYS is required outside development; provide comma-separated bearer tokens"
            );
        }

        Ok(Self::with_keys(config.api_keys.clone()))
    }

    #[must_use]
    pub fn with_keys(keys: Vec<String>) -> Self {
        Self {
            api_keys: Arc::new(keys),
            enabled: true,
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            api_keys: Arc::new(Vec::new()),
            enabled: false,
        }
    }

    fn allows(&self, token: &str) -> bool {
        // Check every key so timing does not reveal which one matched.
        self.api_keys.iter().fold(false, |found, key| {
            found | bool::from(key.as_bytes().ct_eq(token.as_bytes()))
        })
    }
}

/// Tracked windows are pruned once this many clients are being tracked.
const PRUNE_THRESHOLD: usize = 4096;

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter keyed by client IP.
///
/// Requests without connection info (in-process callers) share one window.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    clients: Arc<Mutex<HashMap<Option<IpAddr>, RateLimitWindow>>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Counts one request from `client`; `false` once its window is spent.
    async fn admit(&self, client: Option<IpAddr>) -> bool {
        let mut clients = self.clients.lock().await;
        let now = Instant::now();

        if clients.len() >= PRUNE_THRESHOLD {
            clients.retain(|_, w| now.duration_since(w.started_at) < self.window);
        }

        let window = clients.entry(client).or_insert(RateLimitWindow {
            started_at: now,
            count: 0,
        });
        if now.duration_since(window.started_at) >= self.window {
            window.started_at = now;
            window.count = 0;
        }
        if window.count >= self.max_requests {
            return false;
        }
        window.count += 1;
        true
    }
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware enforcing Bearer token auth when enabled.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    match extract_bearer_token(req.headers().get(AUTHORIZATION)) {
        Some(token) if auth.allows(token) => next.run(req).await,
        _ => ApiError::new(
            request_id_of(&req),
            "unauthorized",
            "missing or invalid bearer token",
        )
        .into_response(),
    }
}

/// Middleware enforcing a fixed request-per-window limit per client IP.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if !rate_limit.admit(client).await {
        tracing::warn!(path = %req.uri().path(), client = ?client, "rate limit exceeded");
        return ApiError::new(request_id_of(&req), "rate_limited", "rate limit exceeded")
            .into_response();
    }

    next.run(req).await
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    use nutriprice_core::{AppConfig, Environment};

    use super::*;

    fn config(env: Environment, api_keys: &[&str]) -> AppConfig {
        AppConfig {
            database_url: "postgres://example".to_owned(),
            env,
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3040),
            log_level: "info".to_owned(),
            api_keys: api_keys.iter().map(|k| (*k).to_owned()).collect(),
            db_max_connections: 10,
            db_min_connections: 1,
            db_acquire_timeout_secs: 10,
            scraper_request_timeout_secs: 15,
            scraper_user_agent: "ua".to_owned(),
            scraper_max_concurrent_requests: 8,
            scraper_max_retries: 2,
            scraper_retry_backoff_ms: 500,
            vendor_domain: "trendyol.com".to_owned(),
            price_selector: ".prc-dsc".to_owned(),
            cache_ttl_secs: 300,
            refresh_cron: None,
        }
    }

    #[tokio::test]
    async fn rate_limit_windows_are_per_client() {
        let limiter = RateLimitState::new(2, Duration::from_secs(60));
        let alice = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        let bob = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));

        assert!(limiter.admit(alice).await);
        assert!(limiter.admit(alice).await);
        assert!(!limiter.admit(alice).await);

        assert!(limiter.admit(bob).await, "another client has its own budget");
        assert!(limiter.admit(None).await);
    }

    #[tokio::test]
    async fn rate_limit_window_resets_after_it_elapses() {
        let limiter = RateLimitState::new(1, Duration::from_millis(20));
        let client = Some(IpAddr::V4(Ipv4Addr::LOCALHOST));

        assert!(limiter.admit(client).await);
        assert!(!limiter.admit(client).await);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.admit(client).await);
    }

    #[test]
    fn extract_bearer_token_accepts_valid_header() {
        let header = HeaderValue::from_static("Bearer test-token");
        assert_eq!(extract_bearer_token(Some(&header)), Some("test-token"));
    }

    #[test]
    fn extract_bearer_token_rejects_non_bearer_header() {
        let header = HeaderValue::from_static("Basic abc123");
        assert_eq!(extract_bearer_token(Some(&header)), None);
        assert_eq!(extract_bearer_token(None), None);
    }

    #[test]
    fn auth_state_disables_when_no_keys_in_dev() {
        let state = AuthState::from_config(&config(Environment::Development, &[]))
            .expect("dev should allow missing keys");
        assert!(!state.enabled);
    }

    #[test]
    fn auth_state_requires_keys_outside_dev() {
        assert!(AuthState::from_config(&config(Environment::Production, &[])).is_err());
    }

    #[test]
    fn auth_state_allows_only_configured_keys() {
        let state = AuthState::from_config(&config(Environment::Production, &["k1", "k2"]))
            .expect("keys configured");
        assert!(state.enabled);
        assert!(state.allows("k2"));
        assert!(!state.allows("k3"));
        assert!(!state.allows("k"));
    }
}
