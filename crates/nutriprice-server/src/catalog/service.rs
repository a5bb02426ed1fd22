use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use nutriprice_core::{
    average_price, CoreError, NewSupplement, Supplement, SupplementChanges, SupplementPatch,
};
use nutriprice_db::{DbError, SupplementFilter, SupplementStore};
use nutriprice_scraper::{refresh_brands, refresh_supplement, PriceExtractor};
use thiserror::Error;
use uuid::Uuid;

use super::cache::SupplementCache;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] CoreError),
    #[error("supplement {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Storage(#[from] DbError),
}

/// Create/read/update/delete over supplement records, keeping brand prices
/// fresh and the listing cache consistent with writes.
pub struct CatalogService {
    store: Arc<dyn SupplementStore>,
    extractor: Arc<dyn PriceExtractor>,
    cache: SupplementCache,
}

impl CatalogService {
    #[must_use]
    pub fn new(
        store: Arc<dyn SupplementStore>,
        extractor: Arc<dyn PriceExtractor>,
        cache: SupplementCache,
    ) -> Self {
        Self {
            store,
            extractor,
            cache,
        }
    }

    /// Validates the input, scrapes every supported brand link, and persists
    /// the new record.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Validation`] for missing or malformed fields,
    /// [`CatalogError::Storage`] if the insert fails.
    pub async fn create(&self, input: NewSupplement) -> Result<Supplement, CatalogError> {
        let mut supplement = input.into_supplement(Utc::now())?;
        refresh_supplement(self.extractor.as_ref(), &mut supplement).await;

        let created = self.store.insert(&supplement).await?;
        self.cache.invalidate().await;

        tracing::info!(
            supplement_id = %created.id,
            brands = created.brands.len(),
            average_price = created.average_price,
            "supplement created"
        );
        Ok(created)
    }

    /// Full listing with refreshed prices, served from the cache while fresh.
    ///
    /// On a miss every record is re-scraped concurrently and records whose
    /// prices moved are written back, unless a write landed on them during
    /// the scrape. A storage read failure falls back to the last listing the
    /// cache held.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Storage`] when storage cannot be read and no earlier
    /// listing is available.
    pub async fn list_all(&self) -> Result<Vec<Supplement>, CatalogError> {
        if let Some(cached) = self.cache.get().await {
            tracing::debug!(count = cached.len(), "supplement listing served from cache");
            return Ok(cached);
        }

        let generation = self.cache.generation().await;
        let records = match self.store.find_all(&SupplementFilter::default()).await {
            Ok(records) => records,
            Err(error) => return self.fall_back_to_stale(error).await,
        };

        let refreshed: Vec<Supplement> =
            join_all(records.into_iter().map(|record| self.refresh_and_persist(record)))
                .await
                .into_iter()
                .flatten()
                .collect();

        if !self.cache.put_for(generation, refreshed.clone()).await {
            tracing::debug!("catalog changed during refresh; listing not cached");
        }
        tracing::info!(count = refreshed.len(), "supplement listing refreshed");
        Ok(refreshed)
    }

    /// Drops the cached listing and rebuilds it.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list_all`].
    pub async fn refresh_all(&self) -> Result<Vec<Supplement>, CatalogError> {
        self.cache.invalidate().await;
        self.list_all().await
    }

    /// Records of one `type` with their last persisted prices. Never scrapes.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Storage`] if storage cannot be read.
    pub async fn list_by_type(&self, kind: &str) -> Result<Vec<Supplement>, CatalogError> {
        Ok(self.store.find_all(&SupplementFilter::by_kind(kind)).await?)
    }

    /// Applies a partial update. A supplied brand list is re-scraped and
    /// the average recomputed from it.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Validation`] for malformed fields,
    /// [`CatalogError::NotFound`] if `id` does not resolve (nothing is
    /// scraped in that case), [`CatalogError::Storage`] if persistence fails.
    pub async fn update(&self, id: Uuid, patch: SupplementPatch) -> Result<Supplement, CatalogError> {
        let mut changes = patch.validate()?;

        if self.store.find_by_id(id).await?.is_none() {
            return Err(CatalogError::NotFound(id));
        }

        if let Some(brands) = changes.brands.take() {
            let refresh = refresh_brands(self.extractor.as_ref(), brands).await;
            changes.average_price = average_price(&refresh.brands);
            changes.brands = Some(refresh.brands);
        }

        let updated = self
            .store
            .update_by_id(id, &changes)
            .await?
            .ok_or(CatalogError::NotFound(id))?;
        self.cache.invalidate().await;

        tracing::info!(supplement_id = %id, "supplement updated");
        Ok(updated)
    }

    /// # Errors
    ///
    /// [`CatalogError::NotFound`] if `id` does not resolve,
    /// [`CatalogError::Storage`] if the delete fails.
    pub async fn delete(&self, id: Uuid) -> Result<(), CatalogError> {
        if !self.store.delete_by_id(id).await? {
            return Err(CatalogError::NotFound(id));
        }
        self.cache.invalidate().await;

        tracing::info!(supplement_id = %id, "supplement deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// [`CatalogError::Storage`] if the store is unreachable.
    pub async fn ping(&self) -> Result<(), CatalogError> {
        Ok(self.store.ping().await?)
    }

    /// Re-scrapes one record and writes changed prices back, but only onto
    /// the version that was read. A record written meanwhile is served as
    /// stored, and a record deleted meanwhile is dropped from the listing.
    async fn refresh_and_persist(&self, mut record: Supplement) -> Option<Supplement> {
        let seen_at = record.updated_at;
        if !refresh_supplement(self.extractor.as_ref(), &mut record).await {
            return Some(record);
        }

        let changes = SupplementChanges::prices(record.brands.clone(), record.average_price);
        match self
            .store
            .update_if_unchanged(record.id, seen_at, &changes)
            .await
        {
            Ok(Some(persisted)) => Some(persisted),
            Ok(None) => {
                tracing::info!(
                    supplement_id = %record.id,
                    "record written during price refresh; keeping the newer version"
                );
                self.current_version(record).await
            }
            Err(error) => {
                tracing::warn!(
                    supplement_id = %record.id,
                    error = %error,
                    "failed to persist refreshed prices"
                );
                Some(record)
            }
        }
    }

    async fn current_version(&self, refreshed: Supplement) -> Option<Supplement> {
        match self.store.find_by_id(refreshed.id).await {
            Ok(current) => current,
            Err(error) => {
                tracing::warn!(
                    supplement_id = %refreshed.id,
                    error = %error,
                    "failed to re-read record after a conflicting write"
                );
                Some(refreshed)
            }
        }
    }

    async fn fall_back_to_stale(&self, error: DbError) -> Result<Vec<Supplement>, CatalogError> {
        if let Some(stale) = self.cache.stale().await {
            tracing::warn!(
                error = %error,
                count = stale.len(),
                "storage read failed; serving last known listing"
            );
            return Ok(stale);
        }
        tracing::error!(error = %error, "storage read failed and no cached listing exists");
        Err(CatalogError::Storage(error))
    }
}

#[cfg(test)]
#[path = "service_test.rs"]
mod tests;
