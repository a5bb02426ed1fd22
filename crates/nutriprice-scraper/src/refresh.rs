//! Brand price refresh: re-reads every supported vendor link of a supplement
//! and recomputes its average price.

use futures::future::join_all;
use nutriprice_core::{Brand, Supplement};

use crate::extractor::PriceExtractor;

/// Outcome of [`refresh_brands`].
#[derive(Debug, Clone, PartialEq)]
pub struct BrandRefresh {
    /// Brands in their original order, with refreshed prices applied.
    pub brands: Vec<Brand>,
    /// At least one brand received a freshly extracted price.
    pub any_updated: bool,
    /// At least one stored price now differs from before the refresh.
    pub prices_changed: bool,
}

/// Re-extracts the price of every brand whose link the extractor supports.
///
/// Brands are fetched concurrently. A successful extraction stores
/// `price / scale`; a failed one leaves the previous price untouched.
pub async fn refresh_brands(extractor: &dyn PriceExtractor, brands: Vec<Brand>) -> BrandRefresh {
    let outcomes = join_all(brands.into_iter().map(|mut brand| async move {
        if !extractor.supports(&brand.product_link) {
            return (brand, false, false);
        }
        let before = brand.price;
        let extracted = extractor.extract(&brand.product_link).await;
        let updated = extracted.is_some_and(|price| brand.apply_extracted_price(price));
        let changed = updated && before.map(f64::to_bits) != brand.price.map(f64::to_bits);
        (brand, updated, changed)
    }))
    .await;

    let mut any_updated = false;
    let mut prices_changed = false;
    let brands = outcomes
        .into_iter()
        .map(|(brand, updated, changed)| {
            any_updated |= updated;
            prices_changed |= changed;
            brand
        })
        .collect();

    BrandRefresh {
        brands,
        any_updated,
        prices_changed,
    }
}

/// Refreshes a supplement's brands in place and recomputes its average.
///
/// Returns `true` when anything that should be persisted changed.
pub async fn refresh_supplement(extractor: &dyn PriceExtractor, supplement: &mut Supplement) -> bool {
    let refresh = refresh_brands(extractor, std::mem::take(&mut supplement.brands)).await;
    supplement.brands = refresh.brands;
    let average_changed = supplement.recompute_average();
    if refresh.any_updated {
        tracing::debug!(
            supplement_id = %supplement.id,
            average_price = supplement.average_price,
            "refreshed brand prices"
        );
    }
    refresh.prices_changed || average_changed
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    /// Serves fixed prices per URL; URLs on `vendor.test` are supported.
    struct StubExtractor {
        prices: HashMap<String, Option<f64>>,
        calls: AtomicUsize,
    }

    impl StubExtractor {
        fn new(entries: &[(&str, Option<f64>)]) -> Self {
            Self {
                prices: entries
                    .iter()
                    .map(|(url, price)| ((*url).to_owned(), *price))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PriceExtractor for StubExtractor {
        fn supports(&self, url: &str) -> bool {
            url.starts_with("https://vendor.test/")
        }

        async fn extract(&self, url: &str) -> Option<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prices.get(url).copied().flatten()
        }
    }

    fn brand(link: &str, price: Option<f64>, scale: Option<f64>) -> Brand {
        Brand {
            brand_name: link.rsplit('/').next().unwrap_or("brand").to_owned(),
            product_link: link.to_owned(),
            price,
            scale,
        }
    }

    fn supplement(brands: Vec<Brand>, average_price: f64) -> Supplement {
        let now = Utc::now();
        Supplement {
            id: Uuid::new_v4(),
            name: "Whey".to_owned(),
            amount: Some("2 kg".to_owned()),
            category: None,
            kind: "protein".to_owned(),
            average_price,
            brands,
            created_at: now,
            updated_at: now,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[tokio::test]
    async fn successful_extraction_is_divided_by_scale() {
        let stub = StubExtractor::new(&[("https://vendor.test/a", Some(199.90))]);
        let refresh = refresh_brands(
            &stub,
            vec![brand("https://vendor.test/a", None, Some(2.0))],
        )
        .await;

        assert!(refresh.any_updated);
        assert!(refresh.prices_changed);
        assert!(approx(refresh.brands[0].price.unwrap(), 99.95));
    }

    #[tokio::test]
    async fn failed_extraction_keeps_previous_price() {
        let stub = StubExtractor::new(&[("https://vendor.test/a", None)]);
        let refresh = refresh_brands(
            &stub,
            vec![brand("https://vendor.test/a", Some(50.0), None)],
        )
        .await;

        assert!(!refresh.any_updated);
        assert!(!refresh.prices_changed);
        assert_eq!(refresh.brands[0].price, Some(50.0));
    }

    #[tokio::test]
    async fn unsupported_links_are_not_fetched() {
        let stub = StubExtractor::new(&[]);
        let refresh = refresh_brands(
            &stub,
            vec![brand("https://elsewhere.test/a", Some(10.0), None)],
        )
        .await;

        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
        assert!(!refresh.any_updated);
        assert_eq!(refresh.brands[0].price, Some(10.0));
    }

    #[tokio::test]
    async fn same_price_counts_as_updated_but_not_changed() {
        let stub = StubExtractor::new(&[("https://vendor.test/a", Some(10.0))]);
        let refresh = refresh_brands(
            &stub,
            vec![brand("https://vendor.test/a", Some(10.0), None)],
        )
        .await;

        assert!(refresh.any_updated);
        assert!(!refresh.prices_changed);
    }

    #[tokio::test]
    async fn order_is_preserved() {
        let stub = StubExtractor::new(&[
            ("https://vendor.test/a", Some(1.0)),
            ("https://vendor.test/b", Some(2.0)),
            ("https://vendor.test/c", Some(3.0)),
        ]);
        let refresh = refresh_brands(
            &stub,
            vec![
                brand("https://vendor.test/a", None, None),
                brand("https://vendor.test/b", None, None),
                brand("https://vendor.test/c", None, None),
            ],
        )
        .await;

        let names: Vec<_> = refresh.brands.iter().map(|b| b.brand_name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn average_uses_only_valid_prices() {
        let stub = StubExtractor::new(&[
            ("https://vendor.test/a", Some(100.0)),
            ("https://vendor.test/b", None),
        ]);
        let mut s = supplement(
            vec![
                brand("https://vendor.test/a", None, None),
                brand("https://vendor.test/b", None, None),
                brand("https://elsewhere.test/c", Some(300.0), None),
            ],
            0.0,
        );

        assert!(refresh_supplement(&stub, &mut s).await);
        assert!(approx(s.average_price, 200.0), "got {}", s.average_price);
        assert_eq!(s.brands[1].price, None);
    }

    #[tokio::test]
    async fn average_is_unchanged_when_no_brand_has_a_price() {
        let stub = StubExtractor::new(&[("https://vendor.test/a", None)]);
        let mut s = supplement(vec![brand("https://vendor.test/a", None, None)], 77.0);

        assert!(!refresh_supplement(&stub, &mut s).await);
        assert!(approx(s.average_price, 77.0));
        assert!(!s.average_price.is_nan());
    }
}
