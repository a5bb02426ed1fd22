//! In-process [`SupplementStore`], used by tests and local tooling that
//! should not need Postgres.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use nutriprice_core::{Supplement, SupplementChanges};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{SupplementFilter, SupplementStore};
use crate::DbError;

/// Keeps records in insertion order behind an async lock.
#[derive(Debug, Default)]
pub struct MemorySupplementStore {
    records: RwLock<Vec<Supplement>>,
}

impl MemorySupplementStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_records(records: Vec<Supplement>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn apply(
        &self,
        id: Uuid,
        seen_at: Option<DateTime<Utc>>,
        changes: &SupplementChanges,
    ) -> Option<Supplement> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|s| s.id == id && seen_at.is_none_or(|t| s.updated_at == t))?;
        let now = Utc::now().max(record.updated_at + TimeDelta::microseconds(1));
        changes.apply_to(record, now);
        Some(record.clone())
    }
}

#[async_trait]
impl SupplementStore for MemorySupplementStore {
    async fn find_all(&self, filter: &SupplementFilter) -> Result<Vec<Supplement>, DbError> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|s| filter.matches(s)).cloned().collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Supplement>, DbError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|s| s.id == id).cloned())
    }

    async fn insert(&self, supplement: &Supplement) -> Result<Supplement, DbError> {
        self.records.write().await.push(supplement.clone());
        Ok(supplement.clone())
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        changes: &SupplementChanges,
    ) -> Result<Option<Supplement>, DbError> {
        Ok(self.apply(id, None, changes).await)
    }

    async fn update_if_unchanged(
        &self,
        id: Uuid,
        seen_at: DateTime<Utc>,
        changes: &SupplementChanges,
    ) -> Result<Option<Supplement>, DbError> {
        Ok(self.apply(id, Some(seen_at), changes).await)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DbError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|s| s.id != id);
        Ok(records.len() < before)
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }
}
