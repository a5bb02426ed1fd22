//! Postgres-backed [`SupplementStore`].
//!
//! Brands are stored as a JSONB array on the supplement row so a record is
//! always read and written as a unit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nutriprice_core::{Brand, Supplement, SupplementChanges};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::{SupplementFilter, SupplementStore};
use crate::DbError;

const SUPPLEMENT_COLUMNS: &str =
    "id, name, amount, category, kind, average_price, brands, created_at, updated_at";

/// A row from the `supplements` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SupplementRow {
    pub id: Uuid,
    pub name: String,
    pub amount: Option<String>,
    pub category: Option<String>,
    pub kind: String,
    pub average_price: f64,
    pub brands: Json<Vec<Brand>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SupplementRow> for Supplement {
    fn from(row: SupplementRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            amount: row.amount,
            category: row.category,
            kind: row.kind,
            average_price: row.average_price,
            brands: row.brands.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgSupplementStore {
    pool: PgPool,
}

impl PgSupplementStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn update_row(
        &self,
        id: Uuid,
        seen_at: Option<DateTime<Utc>>,
        changes: &SupplementChanges,
    ) -> Result<Option<Supplement>, DbError> {
        // NULL binds leave the column untouched. `updated_at` doubles as the
        // row version, so it must advance even when NOW() has not.
        let row = sqlx::query_as::<_, SupplementRow>(&format!(
            "UPDATE supplements SET \
                 name          = COALESCE($2, name), \
                 amount        = COALESCE($3, amount), \
                 category      = COALESCE($4, category), \
                 kind          = COALESCE($5, kind), \
                 average_price = COALESCE($6, average_price), \
                 brands        = COALESCE($7, brands), \
                 updated_at    = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond') \
             WHERE id = $1 \
               AND ($8::timestamptz IS NULL OR updated_at = $8) \
             RETURNING {SUPPLEMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.amount.as_deref())
        .bind(changes.category.as_deref())
        .bind(changes.kind.as_deref())
        .bind(changes.average_price)
        .bind(changes.brands.as_ref().map(Json))
        .bind(seen_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Supplement::from))
    }
}

#[async_trait]
impl SupplementStore for PgSupplementStore {
    async fn find_all(&self, filter: &SupplementFilter) -> Result<Vec<Supplement>, DbError> {
        let rows = sqlx::query_as::<_, SupplementRow>(&format!(
            "SELECT {SUPPLEMENT_COLUMNS} FROM supplements \
             WHERE ($1::text IS NULL OR kind = $1) \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(filter.kind.as_deref())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Supplement::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Supplement>, DbError> {
        let row = sqlx::query_as::<_, SupplementRow>(&format!(
            "SELECT {SUPPLEMENT_COLUMNS} FROM supplements WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Supplement::from))
    }

    async fn insert(&self, supplement: &Supplement) -> Result<Supplement, DbError> {
        let row = sqlx::query_as::<_, SupplementRow>(&format!(
            "INSERT INTO supplements \
                 (id, name, amount, category, kind, average_price, brands, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {SUPPLEMENT_COLUMNS}"
        ))
        .bind(supplement.id)
        .bind(&supplement.name)
        .bind(&supplement.amount)
        .bind(&supplement.category)
        .bind(&supplement.kind)
        .bind(supplement.average_price)
        .bind(Json(&supplement.brands))
        .bind(supplement.created_at)
        .bind(supplement.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        changes: &SupplementChanges,
    ) -> Result<Option<Supplement>, DbError> {
        self.update_row(id, None, changes).await
    }

    async fn update_if_unchanged(
        &self,
        id: Uuid,
        seen_at: DateTime<Utc>,
        changes: &SupplementChanges,
    ) -> Result<Option<Supplement>, DbError> {
        self.update_row(id, Some(seen_at), changes).await
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM supplements WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), DbError> {
        crate::health_check(&self.pool).await
    }
}
