use async_trait::async_trait;

/// Source of current vendor prices.
///
/// Implementations own every vendor-specific detail (which hosts they
/// understand, how the price is located in the page), so callers only deal
/// with "price or nothing".
#[async_trait]
pub trait PriceExtractor: Send + Sync {
    /// Whether `url` points at a product page this extractor can read.
    fn supports(&self, url: &str) -> bool;

    /// Current price at `url` in currency units, or `None` when it could not
    /// be obtained. Never returns a NaN or infinite value.
    async fn extract(&self, url: &str) -> Option<f64>;
}
