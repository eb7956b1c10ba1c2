//! Storage abstraction for Pricebook.
//!
//! The ingestion pipeline only ever talks to these traits, so the SQLite
//! backend, the in-memory backend, and test doubles are interchangeable.
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CatalogItem, NewCatalogItem, NewProvenanceRecord, ProvenanceRecord};

/// Catalog rows.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`fetch_all_items`](ItemRepository::fetch_all_items) | Snapshot used for duplicate classification |
/// | [`create_item`](ItemRepository::create_item) | Persist a new row, assigning id and timestamps |
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Every catalog row, most recent purchase first.
    async fn fetch_all_items(&self) -> Result<Vec<CatalogItem>>;

    /// Insert a row. Implementations derive `unit_price` through
    /// [`NewCatalogItem::into_item`].
    async fn create_item(&self, item: NewCatalogItem) -> Result<CatalogItem>;
}

#[async_trait]
pub trait ProvenanceRepository: Send + Sync {
    async fn create_provenance_record(&self, record: NewProvenanceRecord)
        -> Result<ProvenanceRecord>;
}

#[async_trait]
pub trait ModerationRepository: Send + Sync {
    /// Mark an item for human review with the given reason.
    async fn flag_for_review(&self, item_id: &str, reason: &str) -> Result<()>;
}

/// Who is submitting observations. Consulted once per created row.
pub trait IdentityProvider: Send + Sync {
    fn current_user_display_name(&self) -> Option<String>;

    fn current_user_id(&self) -> Option<String> {
        None
    }
}

/// No attribution.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl IdentityProvider for Anonymous {
    fn current_user_display_name(&self) -> Option<String> {
        None
    }
}

/// A fixed identity, e.g. from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    pub display_name: Option<String>,
    pub user_id: Option<String>,
}

impl IdentityProvider for StaticIdentity {
    fn current_user_display_name(&self) -> Option<String> {
        self.display_name.clone()
    }

    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}
