//! Price history and moderation queue listings.
//!
//! `pricebook history <name>` prints every observation of an item (matched
//! on the normalized name) and the best unit price seen per price basis,
//! with weights compared per lb and volumes per gal.
//! `pricebook review-queue` prints flagged items awaiting review.

use anyhow::Result;

use pricebook_core::models::CatalogItem;
use pricebook_core::normalize::{format_unit_price, normalize_name};
use pricebook_core::units::BestPrice;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

pub async fn run_history(config: &Config, name: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let history = store.price_history(name).await?;
    let best = store.best_unit_prices(name).await?;
    pool.close().await;

    if history.is_empty() {
        println!("No price history for '{}'.", normalize_name(name));
        return Ok(());
    }

    println!("history {} ({} observations)", history[0].item_name, history.len());
    println!(
        "  {:<12} {:<20} {:>10} {:>8} {:>14}",
        "DATE", "STORE", "PRICE", "QTY", "UNIT PRICE"
    );
    println!("  {}", "-".repeat(68));
    for item in &history {
        println!("  {}", history_row(item));
    }

    if !best.is_empty() {
        println!();
    }
    for b in &best {
        println!("  {}", best_line(b));
    }

    Ok(())
}

fn best_line(best: &BestPrice) -> String {
    let item = &best.item;
    let paid = if best.is_converted() {
        format!(" (paid {})", format_unit_price(item.unit_price, &item.unit_type))
    } else {
        String::new()
    };
    format!(
        "best: {} at {} on {}{}",
        format_unit_price(best.price, best.basis.unit()),
        item.store_name,
        item.purchase_day(),
        paid
    )
}

fn history_row(item: &CatalogItem) -> String {
    format!(
        "{:<12} {:<20} {:>10} {:>8} {:>14}{}",
        item.purchase_day().to_string(),
        truncate(&item.store_name, 20),
        format!("${:.2}", item.price),
        item.quantity,
        format_unit_price(item.unit_price, &item.unit_type),
        if item.moderation.flagged_for_review {
            "  (flagged)"
        } else {
            ""
        }
    )
}

pub async fn run_review_queue(config: &Config, limit: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let queue = store.review_queue(limit).await?;
    pool.close().await;

    if queue.is_empty() {
        println!("Review queue is empty.");
        return Ok(());
    }

    println!("review queue ({} items)", queue.len());
    for (i, item) in queue.iter().enumerate() {
        println!(
            "{}. {} @ {}  {}",
            i + 1,
            item.item_name,
            item.store_name,
            format_unit_price(item.unit_price, &item.unit_type)
        );
        println!(
            "    reason: {}",
            item.moderation.flagged_reason.as_deref().unwrap_or("(none)")
        );
        println!("    added by: {}", item.added_by.as_deref().unwrap_or("(unknown)"));
        println!("    id: {}", item.id);
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
