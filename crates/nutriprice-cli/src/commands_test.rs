use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use nutriprice_core::{Brand, Supplement};
use nutriprice_db::MemorySupplementStore;
use uuid::Uuid;

use super::*;

/// Every `vendor.test` page shows 42,00 TL.
#[derive(Default)]
struct FlatPrice {
    calls: AtomicUsize,
}

#[async_trait]
impl PriceExtractor for FlatPrice {
    fn supports(&self, url: &str) -> bool {
        url.starts_with("https://vendor.test/")
    }

    async fn extract(&self, _url: &str) -> Option<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(42.0)
    }
}

fn supplement(link: &str, price: Option<f64>, average_price: f64) -> Supplement {
    let now = Utc::now();
    Supplement {
        id: Uuid::new_v4(),
        name: "Whey".to_owned(),
        amount: None,
        category: None,
        kind: "protein".to_owned(),
        average_price,
        brands: vec![Brand {
            brand_name: "Hardline".to_owned(),
            product_link: link.to_owned(),
            price,
            scale: None,
        }],
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn refresh_persists_only_changed_records() {
    let moved = supplement("https://vendor.test/a", Some(40.0), 40.0);
    let steady = supplement("https://vendor.test/b", Some(42.0), 42.0);
    let elsewhere = supplement("https://shop.example/c", Some(10.0), 10.0);
    let store = MemorySupplementStore::with_records(vec![
        moved.clone(),
        steady.clone(),
        elsewhere.clone(),
    ]);
    let extractor = FlatPrice::default();

    let summary = run_refresh(&store, &extractor).await.expect("refresh");

    assert_eq!(
        summary,
        RefreshSummary {
            total: 3,
            changed: 1,
            skipped: 0,
            persist_failures: 0,
        }
    );
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);

    let stored = store.find_by_id(moved.id).await.unwrap().unwrap();
    assert_eq!(stored.brands[0].price, Some(42.0));
    assert!((stored.average_price - 42.0).abs() < f64::EPSILON);

    let untouched = store.find_by_id(steady.id).await.unwrap().unwrap();
    assert_eq!(untouched.updated_at, steady.updated_at);
}

#[tokio::test]
async fn refresh_of_empty_catalog_is_a_no_op() {
    let store = MemorySupplementStore::new();
    let summary = run_refresh(&store, &FlatPrice::default()).await.expect("refresh");
    assert_eq!(summary, RefreshSummary::default());
}

/// Renames the supplement behind the link it is asked about, standing in
/// for an edit that lands while the page is being fetched.
struct EditingExtractor {
    store: Arc<MemorySupplementStore>,
    target: Uuid,
}

#[async_trait]
impl PriceExtractor for EditingExtractor {
    fn supports(&self, _url: &str) -> bool {
        true
    }

    async fn extract(&self, _url: &str) -> Option<f64> {
        let rename = SupplementChanges {
            name: Some("Whey Isolate".to_owned()),
            ..SupplementChanges::default()
        };
        self.store.update_by_id(self.target, &rename).await.ok()?;
        Some(42.0)
    }
}

#[tokio::test]
async fn refresh_skips_records_edited_while_scraping() {
    let record = supplement("https://vendor.test/a", Some(40.0), 40.0);
    let store = Arc::new(MemorySupplementStore::with_records(vec![record.clone()]));
    let extractor = EditingExtractor {
        store: Arc::clone(&store),
        target: record.id,
    };

    let summary = run_refresh(store.as_ref(), &extractor).await.expect("refresh");

    assert_eq!(
        summary,
        RefreshSummary {
            total: 1,
            changed: 1,
            skipped: 1,
            persist_failures: 0,
        }
    );
    let stored = store.find_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Whey Isolate");
    assert_eq!(stored.brands[0].price, Some(40.0));
}

#[test]
fn summary_reads_naturally() {
    let summary = RefreshSummary {
        total: 5,
        changed: 3,
        skipped: 1,
        persist_failures: 1,
    };
    assert_eq!(
        summary.to_string(),
        "refreshed 5 supplement(s): 3 changed, 1 skipped after concurrent edits, 1 failed to persist"
    );
}
