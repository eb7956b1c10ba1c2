//! Database schema migrations.
//!
//! Every statement is `IF NOT EXISTS`, so `pricebook init` is idempotent.
//!
//! | Table | Contents |
//! |-------|----------|
//! | `catalog_items` | One row per price observation, with moderation columns |
//! | `provenance_records` | How a row was captured (scanner, confidence, raw text) |
//!
//! There is no uniqueness constraint over `(normalized_name,
//! normalized_store, purchase_day, unit_price)`: duplicate detection is
//! tolerance-based and lives in the ingestion pipeline.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::debug;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema to an open pool.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_items (
            id TEXT PRIMARY KEY,
            item_name TEXT NOT NULL,
            normalized_name TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'Other',
            store_name TEXT NOT NULL,
            normalized_store TEXT NOT NULL,
            price REAL NOT NULL,
            quantity REAL NOT NULL,
            unit_type TEXT NOT NULL DEFAULT 'each',
            unit_price REAL NOT NULL,
            purchased_at INTEGER NOT NULL,
            purchase_day TEXT NOT NULL,
            notes TEXT,
            target_price REAL,
            quality_json TEXT NOT NULL DEFAULT '{}',
            user_id TEXT,
            added_by TEXT,
            flagged_for_review INTEGER NOT NULL DEFAULT 0,
            verified INTEGER NOT NULL DEFAULT 0,
            flagged_reason TEXT,
            reviewed_by TEXT,
            reviewed_at INTEGER,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS provenance_records (
            id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL,
            source TEXT NOT NULL,
            confidence REAL,
            raw_text TEXT,
            receipt_url TEXT,
            processing_time_ms INTEGER,
            error_message TEXT,
            user_id TEXT,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (item_id) REFERENCES catalog_items(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_catalog_items_normalized_name ON catalog_items(normalized_name)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_catalog_items_purchase_day ON catalog_items(purchase_day)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_catalog_items_flagged ON catalog_items(flagged_for_review, verified)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_provenance_records_item_id ON provenance_records(item_id)",
    )
    .execute(pool)
    .await?;

    debug!("catalog schema up to date");
    Ok(())
}
