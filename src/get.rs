//! Catalog item retrieval by ID.
//!
//! Fetches one item with its moderation fields and every provenance record
//! attached to it. Used by `pricebook get <id>`.

use anyhow::{bail, Result};
use serde::Serialize;

use pricebook_core::models::{CatalogItem, ProvenanceRecord};
use pricebook_core::normalize::{format_price, format_unit_price};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: CatalogItem,
    pub provenance: Vec<ProvenanceRecord>,
}

pub async fn get_item(config: &Config, id: &str) -> Result<ItemDetail> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let item = store.get_item(id).await?;
    let provenance = match item {
        Some(_) => store.provenance_for_item(id).await?,
        None => Vec::new(),
    };
    pool.close().await;

    match item {
        Some(item) => Ok(ItemDetail { item, provenance }),
        None => bail!("catalog item not found: {}", id),
    }
}

/// CLI entry point for `pricebook get <id>`.
pub async fn run_get(config: &Config, id: &str, json: bool) -> Result<()> {
    let detail = get_item(config, id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let item = &detail.item;
    println!("--- Item ---");
    println!("id:           {}", item.id);
    println!("name:         {}", item.item_name);
    println!("category:     {}", item.category);
    println!("store:        {}", item.store_name);
    println!("price:        {}", format_price(item.price));
    println!("quantity:     {} {}", item.quantity, item.unit_type);
    println!("unit price:   {}", format_unit_price(item.unit_price, &item.unit_type));
    if let Some(target) = item.target_price {
        println!("target price: {}", format_unit_price(target, &item.unit_type));
    }
    println!("purchased:    {}", item.purchased_at.format("%Y-%m-%d %H:%M"));
    if let Some(ref by) = item.added_by {
        println!("added by:     {}", by);
    }
    if let Some(ref notes) = item.notes {
        println!("notes:        {}", notes);
    }
    if !item.quality.is_empty() {
        println!("quality:      {}", serde_json::to_string(&item.quality)?);
    }
    println!();

    let m = &item.moderation;
    println!("--- Moderation ---");
    println!("flagged:      {}", m.flagged_for_review);
    if let Some(ref reason) = m.flagged_reason {
        println!("reason:       {}", reason);
    }
    println!("verified:     {}", m.verified);
    if let Some(ref reviewer) = m.reviewed_by {
        println!("reviewed by:  {}", reviewer);
    }
    println!();

    println!("--- Provenance ({}) ---", detail.provenance.len());
    for record in &detail.provenance {
        let confidence = record
            .confidence
            .map(|c| format!("{:.0}%", c * 100.0))
            .unwrap_or_else(|| "n/a".to_string());
        println!("[{}] confidence {}", record.source, confidence);
        if let Some(ref url) = record.receipt_url {
            println!("  receipt: {}", url);
        }
        if let Some(ref text) = record.raw_text {
            println!("  raw text: {}", text);
        }
    }

    Ok(())
}
