pub mod client;
pub mod error;
pub mod extractor;
pub mod price;
pub mod refresh;
mod retry;

pub use client::{ExtractorConfig, HttpPriceExtractor};
pub use error::ScraperError;
pub use extractor::PriceExtractor;
pub use price::parse_price_text;
pub use refresh::{refresh_brands, refresh_supplement, BrandRefresh};
