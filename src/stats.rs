//! Catalog statistics overview.
//!
//! Summarizes what has been recorded: item counts, moderation counts,
//! provenance coverage, and a per-store breakdown. Used by `pricebook stats`.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let stats = SqliteStore::new(pool.clone()).catalog_stats().await?;
    pool.close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Pricebook — Catalog Stats");
    println!("=========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Observations: {}", stats.total_items);
    println!("  Items:        {}", stats.distinct_items);
    println!("  Flagged:      {}", stats.flagged);
    println!("  Verified:     {}", stats.verified);
    println!(
        "  Provenance:   {} ({}%)",
        stats.provenance_records,
        if stats.total_items > 0 {
            (stats.provenance_records * 100) / stats.total_items
        } else {
            0
        }
    );

    if !stats.by_store.is_empty() {
        println!();
        println!("  By store:");
        println!("  {:<28} {:>8}   {}", "STORE", "ITEMS", "LAST PURCHASE");
        println!("  {}", "-".repeat(56));
        for s in &stats.by_store {
            let last = s
                .last_purchase
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "never".to_string());
            println!("  {:<28} {:>8}   {}", s.store_name, s.item_count, last);
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
