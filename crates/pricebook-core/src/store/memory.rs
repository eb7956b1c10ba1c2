//! In-memory store for testing and embedding.
//!
//! Uses `Vec`s behind `std::sync::RwLock`. Implements every repository
//! trait so a single instance can back an [`Ingestor`](crate::ingest::Ingestor).

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{CatalogItem, NewCatalogItem, NewProvenanceRecord, ProvenanceRecord};

use super::{ItemRepository, ModerationRepository, ProvenanceRepository};

pub struct InMemoryStore {
    items: RwLock<Vec<CatalogItem>>,
    provenance: RwLock<Vec<ProvenanceRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            provenance: RwLock::new(Vec::new()),
        }
    }

    /// Seed the catalog with existing rows.
    pub fn with_items(items: Vec<CatalogItem>) -> Self {
        Self {
            items: RwLock::new(items),
            provenance: RwLock::new(Vec::new()),
        }
    }

    /// Rows in insertion order.
    pub fn items(&self) -> Result<Vec<CatalogItem>> {
        Ok(self
            .items
            .read()
            .map_err(|_| anyhow!("item store lock poisoned"))?
            .clone())
    }

    pub fn get_item(&self, id: &str) -> Result<Option<CatalogItem>> {
        Ok(self
            .items
            .read()
            .map_err(|_| anyhow!("item store lock poisoned"))?
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }

    pub fn provenance_records(&self) -> Result<Vec<ProvenanceRecord>> {
        Ok(self
            .provenance
            .read()
            .map_err(|_| anyhow!("provenance store lock poisoned"))?
            .clone())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemRepository for InMemoryStore {
    async fn fetch_all_items(&self) -> Result<Vec<CatalogItem>> {
        let mut items = self.items()?;
        // Stable: equal purchase times keep insertion order.
        items.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at));
        Ok(items)
    }

    async fn create_item(&self, item: NewCatalogItem) -> Result<CatalogItem> {
        let created = item.into_item(Uuid::new_v4().to_string(), Utc::now());
        self.items
            .write()
            .map_err(|_| anyhow!("item store lock poisoned"))?
            .push(created.clone());
        Ok(created)
    }
}

#[async_trait]
impl ProvenanceRepository for InMemoryStore {
    async fn create_provenance_record(
        &self,
        record: NewProvenanceRecord,
    ) -> Result<ProvenanceRecord> {
        let mut records = self
            .provenance
            .write()
            .map_err(|_| anyhow!("provenance store lock poisoned"))?;
        let exists = self
            .items
            .read()
            .map_err(|_| anyhow!("item store lock poisoned"))?
            .iter()
            .any(|i| i.id == record.item_id);
        if !exists {
            anyhow::bail!("catalog item not found: {}", record.item_id);
        }
        let created = record.into_record(Uuid::new_v4().to_string(), Utc::now());
        records.push(created.clone());
        Ok(created)
    }
}

#[async_trait]
impl ModerationRepository for InMemoryStore {
    async fn flag_for_review(&self, item_id: &str, reason: &str) -> Result<()> {
        let mut items = self
            .items
            .write()
            .map_err(|_| anyhow!("item store lock poisoned"))?;
        let item = items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| anyhow!("catalog item not found: {}", item_id))?;
        item.moderation.flagged_for_review = true;
        item.moderation.flagged_reason = Some(reason.to_string());
        Ok(())
    }
}
