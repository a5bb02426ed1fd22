//! HTTP-backed [`PriceExtractor`] for a single vendor storefront.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::Selector;
use tokio::sync::Semaphore;

use crate::error::ScraperError;
use crate::extractor::PriceExtractor;
use crate::price::{compile_selector, extract_price_from_html};
use crate::retry::retry_with_backoff;

/// Settings for [`HttpPriceExtractor`], usually taken from the app config.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_concurrent_requests: usize,
    pub vendor_domain: String,
    pub price_selector: String,
}

impl ExtractorConfig {
    #[must_use]
    pub fn from_app_config(config: &nutriprice_core::AppConfig) -> Self {
        Self {
            timeout_secs: config.scraper_request_timeout_secs,
            user_agent: config.scraper_user_agent.clone(),
            max_retries: config.scraper_max_retries,
            retry_backoff_ms: config.scraper_retry_backoff_ms,
            max_concurrent_requests: config.scraper_max_concurrent_requests,
            vendor_domain: config.vendor_domain.clone(),
            price_selector: config.price_selector.clone(),
        }
    }
}

/// Fetches vendor product pages and reads the displayed price.
///
/// A process-wide semaphore caps in-flight requests so a large catalog
/// refresh cannot open hundreds of connections to the vendor at once.
pub struct HttpPriceExtractor {
    client: Client,
    selector: Selector,
    selector_text: String,
    vendor_domain: String,
    permits: Semaphore,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl HttpPriceExtractor {
    /// # Errors
    ///
    /// - [`ScraperError::InvalidSelector`] if the price selector is not valid CSS.
    /// - [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(config: ExtractorConfig) -> Result<Self, ScraperError> {
        let selector = compile_selector(&config.price_selector)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self {
            client,
            selector,
            selector_text: config.price_selector,
            vendor_domain: config.vendor_domain.trim().to_lowercase(),
            permits: Semaphore::new(config.max_concurrent_requests.max(1)),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    /// Fetches `url` and parses the price element.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::InvalidUrl`] if `url` does not parse.
    /// - [`ScraperError::RateLimited`] / [`ScraperError::UnexpectedStatus`] /
    ///   [`ScraperError::Http`] once retries are exhausted.
    /// - [`ScraperError::NotFound`] on HTTP 404.
    /// - [`ScraperError::PriceNotFound`] / [`ScraperError::InvalidPrice`] when
    ///   the page does not carry a readable price.
    pub async fn fetch_price(&self, url: &str) -> Result<f64, ScraperError> {
        let body = self.fetch_page(url).await?;
        extract_price_from_html(&body, &self.selector, &self.selector_text, url)
    }

    async fn fetch_page(&self, url: &str) -> Result<String, ScraperError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| ScraperError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;

        retry_with_backoff(self.max_retries, self.retry_backoff_ms, || {
            let parsed = parsed.clone();
            async move {
                let _permit = self.permits.acquire().await;
                let response = self
                    .client
                    .get(parsed.clone())
                    .header(
                        reqwest::header::ACCEPT,
                        "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
                    )
                    .header(reqwest::header::ACCEPT_LANGUAGE, "tr-TR,tr;q=0.9,en;q=0.8")
                    .header(reqwest::header::CACHE_CONTROL, "no-cache")
                    .send()
                    .await?;

                let status = response.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(ScraperError::RateLimited {
                        domain: parsed.host_str().unwrap_or_default().to_owned(),
                    });
                }
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(ScraperError::NotFound {
                        url: parsed.to_string(),
                    });
                }
                if !status.is_success() {
                    return Err(ScraperError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: parsed.to_string(),
                    });
                }

                Ok(response.text().await?)
            }
        })
        .await
    }
}

/// `true` when `url`'s host is `domain` or one of its subdomains.
pub(crate) fn host_matches(url: &str, domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    parsed.host_str().is_some_and(|host| {
        let host = host.to_lowercase();
        host == domain
            || host
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

#[async_trait]
impl PriceExtractor for HttpPriceExtractor {
    fn supports(&self, url: &str) -> bool {
        host_matches(url, &self.vendor_domain)
    }

    async fn extract(&self, url: &str) -> Option<f64> {
        match self.fetch_price(url).await {
            Ok(price) => {
                tracing::debug!(url, price, "extracted vendor price");
                Some(price)
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "price extraction failed");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
