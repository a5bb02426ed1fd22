//! Persistence seam for supplement records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nutriprice_core::{Supplement, SupplementChanges};
use uuid::Uuid;

use crate::DbError;

/// Optional narrowing for [`SupplementStore::find_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplementFilter {
    /// Exact match on the supplement `type`.
    pub kind: Option<String>,
}

impl SupplementFilter {
    #[must_use]
    pub fn by_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
        }
    }

    #[must_use]
    pub fn matches(&self, supplement: &Supplement) -> bool {
        self.kind.as_deref().is_none_or(|k| supplement.kind == k)
    }
}

/// Storage for supplement records.
///
/// Records come back oldest first. Implementations must be safe to share
/// across request handlers and background jobs.
#[async_trait]
pub trait SupplementStore: Send + Sync {
    /// # Errors
    ///
    /// Returns [`DbError`] if the backing store cannot be read.
    async fn find_all(&self, filter: &SupplementFilter) -> Result<Vec<Supplement>, DbError>;

    /// # Errors
    ///
    /// Returns [`DbError`] if the backing store cannot be read.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Supplement>, DbError>;

    /// Persists a new record and returns it as stored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    async fn insert(&self, supplement: &Supplement) -> Result<Supplement, DbError>;

    /// Applies `changes` to the record with `id` and bumps `updated_at`.
    /// Every write moves `updated_at` strictly forward.
    ///
    /// Returns `None` when no such record exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    async fn update_by_id(
        &self,
        id: Uuid,
        changes: &SupplementChanges,
    ) -> Result<Option<Supplement>, DbError>;

    /// Applies `changes` only if the record is still the version read at
    /// `seen_at`, i.e. its `updated_at` has not moved since.
    ///
    /// Returns `None`, writing nothing, when the record is gone or has been
    /// written after `seen_at`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    async fn update_if_unchanged(
        &self,
        id: Uuid,
        seen_at: DateTime<Utc>,
        changes: &SupplementChanges,
    ) -> Result<Option<Supplement>, DbError>;

    /// Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the delete fails.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DbError>;

    /// Cheap liveness probe used by the health endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store is unreachable.
    async fn ping(&self) -> Result<(), DbError>;
}
