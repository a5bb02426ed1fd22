//! Command handlers for the CLI.
//!
//! Called from `main` after config is loaded. Handlers take the store and
//! extractor as trait objects so they can run against in-memory fakes.

use std::fmt;

use futures::future::join_all;
use nutriprice_core::SupplementChanges;
use nutriprice_db::{SupplementFilter, SupplementStore};
use nutriprice_scraper::{refresh_supplement, HttpPriceExtractor, PriceExtractor};

/// Outcome of a `refresh` run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct RefreshSummary {
    pub total: usize,
    pub changed: usize,
    /// Changed records left alone because they were written during the run.
    pub skipped: usize,
    pub persist_failures: usize,
}

impl fmt::Display for RefreshSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "refreshed {} supplement(s): {} changed, {} skipped after concurrent edits, {} failed to persist",
            self.total, self.changed, self.skipped, self.persist_failures
        )
    }
}

enum WriteBack {
    Persisted,
    Skipped,
    Failed,
}

/// Fetch one product page and print the extracted price or why it failed.
pub(crate) async fn run_probe(extractor: &HttpPriceExtractor, url: &str) {
    if !extractor.supports(url) {
        println!("note: {url} is not on the configured vendor domain; refreshes skip it");
    }

    match extractor.fetch_price(url).await {
        Ok(price) => println!("{price:.2}"),
        Err(e) => println!("no price: {e}"),
    }
}

/// Re-scrape every stored supplement and write back the ones whose prices
/// moved. Records edited while their pages were fetched are skipped, and
/// per-record persistence failures are logged. Both are counted.
///
/// # Errors
///
/// Returns an error if the supplements cannot be loaded.
pub(crate) async fn run_refresh(
    store: &dyn SupplementStore,
    extractor: &dyn PriceExtractor,
) -> anyhow::Result<RefreshSummary> {
    let records = store.find_all(&SupplementFilter::default()).await?;
    let total = records.len();
    tracing::info!(count = total, "refreshing supplement prices");

    let outcomes = join_all(records.into_iter().map(|mut record| async move {
        let seen_at = record.updated_at;
        if !refresh_supplement(extractor, &mut record).await {
            return None;
        }
        let changes = SupplementChanges::prices(record.brands, record.average_price);
        Some(match store.update_if_unchanged(record.id, seen_at, &changes).await {
            Ok(Some(_)) => WriteBack::Persisted,
            Ok(None) => {
                tracing::info!(supplement_id = %record.id, "record edited during refresh; skipped");
                WriteBack::Skipped
            }
            Err(e) => {
                tracing::warn!(supplement_id = %record.id, error = %e, "failed to persist prices");
                WriteBack::Failed
            }
        })
    }))
    .await;

    let mut summary = RefreshSummary {
        total,
        ..RefreshSummary::default()
    };
    for outcome in outcomes.into_iter().flatten() {
        summary.changed += 1;
        match outcome {
            WriteBack::Persisted => {}
            WriteBack::Skipped => summary.skipped += 1,
            WriteBack::Failed => summary.persist_failures += 1,
        }
    }
    Ok(summary)
}

/// Print stored supplements, optionally of one type, as pretty JSON.
///
/// # Errors
///
/// Returns an error if the supplements cannot be loaded or serialized.
pub(crate) async fn run_list(store: &dyn SupplementStore, kind: Option<String>) -> anyhow::Result<()> {
    let filter = SupplementFilter { kind };
    let records = store.find_all(&filter).await?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

#[cfg(test)]
#[path = "commands_test.rs"]
mod tests;
