//! SQLite-backed repository implementation.
//!
//! [`SqliteStore`] implements the three pricebook-core repository traits
//! used by the ingestion pipeline, plus the read-side queries behind the
//! `history`, `get`, `review-queue`, and `stats` commands.
//!
//! Timestamps are stored as unix seconds; quality attributes as JSON text.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use pricebook_core::models::{
    CatalogItem, ModerationState, NewCatalogItem, NewProvenanceRecord, ProvenanceRecord,
    QualityAttributes,
};
use pricebook_core::normalize::normalize_name;
use pricebook_core::store::{ItemRepository, ModerationRepository, ProvenanceRepository};
use pricebook_core::units::{best_prices, BestPrice};

const ITEM_COLUMNS: &str = "id, item_name, normalized_name, category, store_name, \
    normalized_store, price, quantity, unit_type, unit_price, purchased_at, notes, \
    target_price, quality_json, user_id, added_by, flagged_for_review, verified, \
    flagged_reason, reviewed_by, reviewed_at, created_at";

const PROVENANCE_COLUMNS: &str = "id, item_id, source, confidence, raw_text, receipt_url, \
    processing_time_ms, error_message, user_id, created_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

/// Catalog-wide counts for `pricebook stats`.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogStats {
    pub total_items: i64,
    pub distinct_items: i64,
    pub flagged: i64,
    pub verified: i64,
    pub provenance_records: i64,
    pub by_store: Vec<StoreStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub store_name: String,
    pub item_count: i64,
    pub last_purchase: Option<DateTime<Utc>>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn get_item(&self, id: &str) -> Result<Option<CatalogItem>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM catalog_items WHERE id = ?",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(item_from_row).transpose()
    }

    /// Every observation of `name` (compared in normalized form), newest
    /// purchase first.
    pub async fn price_history(&self, name: &str) -> Result<Vec<CatalogItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM catalog_items WHERE normalized_name = ? \
             ORDER BY purchased_at DESC, created_at DESC",
            ITEM_COLUMNS
        ))
        .bind(normalize_name(name))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    /// The cheapest observation of `name` per price basis: weights compared
    /// per lb, volumes per gal, anything else only within its own unit.
    pub async fn best_unit_prices(&self, name: &str) -> Result<Vec<BestPrice>> {
        let history = self.price_history(name).await?;
        Ok(best_prices(&history))
    }

    /// Flagged items nobody has verified yet, newest first.
    pub async fn review_queue(&self, limit: i64) -> Result<Vec<CatalogItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM catalog_items \
             WHERE flagged_for_review = 1 AND verified = 0 \
             ORDER BY created_at DESC LIMIT ?",
            ITEM_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    pub async fn provenance_for_item(&self, item_id: &str) -> Result<Vec<ProvenanceRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM provenance_records WHERE item_id = ? ORDER BY created_at ASC",
            PROVENANCE_COLUMNS
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(provenance_from_row).collect()
    }

    pub async fn catalog_stats(&self) -> Result<CatalogStats> {
        let totals = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_items,
                COUNT(DISTINCT normalized_name) AS distinct_items,
                COALESCE(SUM(flagged_for_review), 0) AS flagged,
                COALESCE(SUM(verified), 0) AS verified
            FROM catalog_items
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let provenance_records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM provenance_records")
            .fetch_one(&self.pool)
            .await?;

        let store_rows = sqlx::query(
            r#"
            SELECT
                MAX(store_name) AS store_name,
                COUNT(*) AS item_count,
                MAX(purchased_at) AS last_purchase
            FROM catalog_items
            GROUP BY normalized_store
            ORDER BY item_count DESC, store_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let by_store = store_rows
            .iter()
            .map(|row| {
                let last: Option<i64> = row.try_get("last_purchase")?;
                Ok(StoreStats {
                    store_name: row.try_get("store_name")?,
                    item_count: row.try_get("item_count")?,
                    last_purchase: last.and_then(|ts| DateTime::from_timestamp(ts, 0)),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CatalogStats {
            total_items: totals.try_get("total_items")?,
            distinct_items: totals.try_get("distinct_items")?,
            flagged: totals.try_get("flagged")?,
            verified: totals.try_get("verified")?,
            provenance_records,
            by_store,
        })
    }
}

#[async_trait]
impl ItemRepository for SqliteStore {
    async fn fetch_all_items(&self) -> Result<Vec<CatalogItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM catalog_items ORDER BY purchased_at DESC, created_at DESC",
            ITEM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    async fn create_item(&self, mut item: NewCatalogItem) -> Result<CatalogItem> {
        item.purchased_at = whole_seconds(item.purchased_at);
        let created = item.into_item(Uuid::new_v4().to_string(), whole_seconds(Utc::now()));
        let quality_json = serde_json::to_string(&created.quality)?;

        sqlx::query(
            r#"
            INSERT INTO catalog_items (id, item_name, normalized_name, category, store_name,
                                       normalized_store, price, quantity, unit_type, unit_price,
                                       purchased_at, purchase_day, notes, target_price,
                                       quality_json, user_id, added_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&created.id)
        .bind(&created.item_name)
        .bind(&created.normalized_name)
        .bind(&created.category)
        .bind(&created.store_name)
        .bind(&created.normalized_store)
        .bind(created.price)
        .bind(created.quantity)
        .bind(&created.unit_type)
        .bind(created.unit_price)
        .bind(created.purchased_at.timestamp())
        .bind(created.purchase_day().to_string())
        .bind(&created.notes)
        .bind(created.target_price)
        .bind(&quality_json)
        .bind(&created.user_id)
        .bind(&created.added_by)
        .bind(created.created_at.timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to insert catalog item")?;

        Ok(created)
    }
}

#[async_trait]
impl ProvenanceRepository for SqliteStore {
    async fn create_provenance_record(
        &self,
        record: NewProvenanceRecord,
    ) -> Result<ProvenanceRecord> {
        let created = record.into_record(Uuid::new_v4().to_string(), whole_seconds(Utc::now()));

        sqlx::query(
            r#"
            INSERT INTO provenance_records (id, item_id, source, confidence, raw_text,
                                            receipt_url, processing_time_ms, error_message,
                                            user_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&created.id)
        .bind(&created.item_id)
        .bind(created.source.as_str())
        .bind(created.confidence)
        .bind(&created.raw_text)
        .bind(&created.receipt_url)
        .bind(created.processing_time_ms.map(|ms| ms as i64))
        .bind(&created.error_message)
        .bind(&created.user_id)
        .bind(created.created_at.timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to insert provenance record")?;

        Ok(created)
    }
}

#[async_trait]
impl ModerationRepository for SqliteStore {
    async fn flag_for_review(&self, item_id: &str, reason: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE catalog_items SET flagged_for_review = 1, flagged_reason = ? WHERE id = ?",
        )
        .bind(reason)
        .bind(item_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("catalog item not found: {}", item_id);
        }
        Ok(())
    }
}

fn whole_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

fn timestamp(ts: i64, column: &str) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| anyhow!("invalid {} timestamp: {}", column, ts))
}

fn item_from_row(row: &SqliteRow) -> Result<CatalogItem> {
    let quality_json: String = row.try_get("quality_json")?;
    let quality: QualityAttributes =
        serde_json::from_str(&quality_json).context("Invalid quality_json column")?;
    let reviewed_at: Option<i64> = row.try_get("reviewed_at")?;

    Ok(CatalogItem {
        id: row.try_get("id")?,
        item_name: row.try_get("item_name")?,
        normalized_name: row.try_get("normalized_name")?,
        category: row.try_get("category")?,
        store_name: row.try_get("store_name")?,
        normalized_store: row.try_get("normalized_store")?,
        price: row.try_get("price")?,
        quantity: row.try_get("quantity")?,
        unit_type: row.try_get("unit_type")?,
        unit_price: row.try_get("unit_price")?,
        purchased_at: timestamp(row.try_get("purchased_at")?, "purchased_at")?,
        notes: row.try_get("notes")?,
        target_price: row.try_get("target_price")?,
        quality,
        user_id: row.try_get("user_id")?,
        added_by: row.try_get("added_by")?,
        moderation: ModerationState {
            flagged_for_review: row.try_get("flagged_for_review")?,
            verified: row.try_get("verified")?,
            flagged_reason: row.try_get("flagged_reason")?,
            reviewed_by: row.try_get("reviewed_by")?,
            reviewed_at: reviewed_at
                .map(|ts| timestamp(ts, "reviewed_at"))
                .transpose()?,
        },
        created_at: timestamp(row.try_get("created_at")?, "created_at")?,
    })
}

fn provenance_from_row(row: &SqliteRow) -> Result<ProvenanceRecord> {
    let source: String = row.try_get("source")?;
    let processing_time_ms: Option<i64> = row.try_get("processing_time_ms")?;

    Ok(ProvenanceRecord {
        id: row.try_get("id")?,
        item_id: row.try_get("item_id")?,
        source: source.parse()?,
        confidence: row.try_get("confidence")?,
        raw_text: row.try_get("raw_text")?,
        receipt_url: row.try_get("receipt_url")?,
        processing_time_ms: processing_time_ms.map(|ms| ms as u64),
        error_message: row.try_get("error_message")?,
        user_id: row.try_get("user_id")?,
        created_at: timestamp(row.try_get("created_at")?, "created_at")?,
    })
}
