//! Integration tests for the SQLite repository implementation.
//!
//! Each test runs the real ingestion pipeline against a fresh database in a
//! temporary directory.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use pricebook::config::Config;
use pricebook::db;
use pricebook::migrate;
use pricebook::sqlite_store::SqliteStore;
use pricebook_core::ingest::{IngestOptions, IngestionResult, Ingestor, ObservationKind};
use pricebook_core::models::{
    Freshness, IngestionInput, NewProvenanceRecord, ProvenanceMetadata, ProvenanceSource,
};
use pricebook_core::store::{ItemRepository, ModerationRepository, ProvenanceRepository, StaticIdentity};
use tempfile::TempDir;

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, 9, 15, 0).unwrap()
}

async fn setup() -> (TempDir, Arc<SqliteStore>, Ingestor) {
    let tmp = TempDir::new().unwrap();
    let config = Config::with_db_path(tmp.path().join("data").join("pricebook.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();

    let store = Arc::new(SqliteStore::new(pool));
    let ingestor = Ingestor::from_store(store.clone()).with_identity(Arc::new(StaticIdentity {
        display_name: Some("Sam".to_string()),
        user_id: None,
    }));
    (tmp, store, ingestor)
}

fn created_id(result: &IngestionResult) -> String {
    match result {
        IngestionResult::Created(c) => c.item.id.clone(),
        other => panic!("expected Created, got {:?}", other),
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let config = Config::with_db_path(tmp.path().join("pricebook.sqlite"));

    migrate::run_migrations(&config).await.unwrap();
    migrate::run_migrations(&config).await.unwrap();

    assert!(config.db.path.exists());
}

#[tokio::test]
async fn test_created_item_round_trips() {
    let (_tmp, store, ingestor) = setup().await;

    let mut input = IngestionInput::new("Ribeye Steak", "$24.50", "1.75", "Butcher Bros")
        .unit_type("lbs")
        .category("beef")
        .notes("on sale")
        .purchased_at(day(2));
    input.quality.freshness = Some(Freshness::Fresh);
    input.quality.grass_fed = Some(true);

    let result = ingestor.ingest_item(&input, &IngestOptions::default()).await;
    let created = result.item().unwrap().clone();

    let loaded = store.get_item(&created.id).await.unwrap().unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.unit_type, "lb");
    assert_eq!(loaded.category, "Meat");
    assert_eq!(loaded.unit_price, 24.50 / 1.75);
    assert_eq!(loaded.added_by.as_deref(), Some("Sam"));
    assert_eq!(loaded.notes.as_deref(), Some("on sale"));
    assert_eq!(loaded.quality.freshness, Some(Freshness::Fresh));
    assert_eq!(loaded.purchased_at, day(2));
}

#[tokio::test]
async fn test_duplicate_detection_against_sqlite() {
    let (_tmp, store, ingestor) = setup().await;
    let opts = IngestOptions::default();
    let milk = IngestionInput::new("Milk", 4.99, 1, "Acme").purchased_at(day(1));

    let first = ingestor.ingest_item(&milk, &opts).await;
    assert!(first.is_success());

    let second = ingestor.ingest_item(&milk, &opts).await;
    let found = second.match_found().expect("duplicate");
    assert_eq!(found.similarity, 1.0);
    assert_eq!(found.existing_item.id, created_id(&first));

    assert_eq!(store.fetch_all_items().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_price_history_and_best_price() {
    let (_tmp, store, ingestor) = setup().await;
    let opts = IngestOptions::default();

    for (d, price) in [(1, 4.99), (8, 5.49), (15, 4.49)] {
        let input = IngestionInput::new("Milk", price, 1, "Acme").purchased_at(day(d));
        let result = ingestor.ingest_item(&input, &opts).await;
        assert!(result.is_success(), "{:?}", result);
    }
    ingestor
        .ingest_item(&IngestionInput::new("Bread", 2.99, 1, "Acme"), &opts)
        .await;

    let history = store.price_history("  MILK ").await.unwrap();
    let prices: Vec<f64> = history.iter().map(|i| i.price).collect();
    assert_eq!(prices, vec![4.49, 5.49, 4.99]);

    let best = store.best_unit_prices("milk").await.unwrap();
    assert_eq!(best.len(), 1);
    assert_eq!(best[0].item.unit_price, 4.49);

    assert!(store.price_history("eggs").await.unwrap().is_empty());
    assert!(store.best_unit_prices("eggs").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_best_price_converts_units_before_comparing() {
    let (_tmp, store, ingestor) = setup().await;
    let opts = IngestOptions::default();

    let observations = [
        (4.99, 1.0, "gallon", 1),
        (6.40, 128.0, "fluid ounces", 8),
        (3.00, 2.0, "each", 15),
    ];
    for (price, quantity, unit, d) in observations {
        let input = IngestionInput::new("Milk", price, quantity, "Acme")
            .unit_type(unit)
            .purchased_at(day(d));
        let result = ingestor.ingest_item(&input, &opts).await;
        assert!(result.is_success(), "{:?}", result);
    }

    let best = store.best_unit_prices("milk").await.unwrap();
    let summary: Vec<(&str, &str)> = best
        .iter()
        .map(|b| (b.basis.unit(), b.item.unit_type.as_str()))
        .collect();
    // Newest basis first; the fl oz row is $6.40/gal and loses to $4.99/gal.
    assert_eq!(summary, vec![("each", "each"), ("gal", "gal")]);
    assert!((best[1].price - 4.99).abs() < 1e-9);
    assert_eq!(best[0].price, 1.5);
}

#[tokio::test]
async fn test_second_observation_is_price_history() {
    let (_tmp, _store, ingestor) = setup().await;
    let opts = IngestOptions::default();

    ingestor
        .ingest_item(
            &IngestionInput::new("Milk", 4.99, 1, "Acme").purchased_at(day(1)),
            &opts,
        )
        .await;
    let result = ingestor
        .ingest_item(
            &IngestionInput::new("Milk", 5.49, 1, "Acme").purchased_at(day(8)),
            &opts,
        )
        .await;

    match result {
        IngestionResult::Created(c) => assert_eq!(c.kind, ObservationKind::PriceHistory),
        other => panic!("expected Created, got {:?}", other),
    }
}

#[tokio::test]
async fn test_flagged_item_reaches_review_queue_with_provenance() {
    let (_tmp, store, ingestor) = setup().await;

    let mut meta = ProvenanceMetadata::new(ProvenanceSource::GoogleVision).with_confidence(0.3);
    meta.raw_text = Some("MLK 2% GAL 4.99".to_string());
    let input = IngestionInput::new("Milk", 4.99, 1, "Acme")
        .provenance(meta)
        .auto_flag();

    let result = ingestor.ingest_item(&input, &IngestOptions::default()).await;
    let id = created_id(&result);

    let queue = store.review_queue(10).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, id);
    assert_eq!(
        queue[0].moderation.flagged_reason.as_deref(),
        Some("Low recognition confidence")
    );

    let records = store.provenance_for_item(&id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source, ProvenanceSource::GoogleVision);
    assert_eq!(records[0].raw_text.as_deref(), Some("MLK 2% GAL 4.99"));
}

#[tokio::test]
async fn test_moderation_and_provenance_require_existing_item() {
    let (_tmp, store, _ingestor) = setup().await;

    assert!(store.flag_for_review("missing", "reason").await.is_err());

    let meta = ProvenanceMetadata::new(ProvenanceSource::Tesseract);
    let record = NewProvenanceRecord::from_metadata("missing", &meta, None);
    assert!(store.create_provenance_record(record).await.is_err());
}

#[tokio::test]
async fn test_catalog_stats() {
    let (_tmp, store, ingestor) = setup().await;
    let opts = IngestOptions::default();

    let inputs = [
        IngestionInput::new("Milk", 4.99, 1, "Acme").purchased_at(day(1)),
        IngestionInput::new("Milk", 5.49, 1, "Acme").purchased_at(day(8)),
        IngestionInput::new("Eggs", 3.49, 12, "Fresh Mart").purchased_at(day(2)),
        IngestionInput::new("Gum", 0.01, 1, "acme").auto_flag(),
    ];
    for input in &inputs {
        assert!(ingestor.ingest_item(input, &opts).await.is_success());
    }

    let stats = store.catalog_stats().await.unwrap();
    assert_eq!(stats.total_items, 4);
    assert_eq!(stats.distinct_items, 3);
    assert_eq!(stats.flagged, 1);
    assert_eq!(stats.verified, 0);
    assert_eq!(stats.provenance_records, 0);
    assert_eq!(stats.by_store.len(), 2);
    assert_eq!(stats.by_store[0].item_count, 3);
    assert_eq!(stats.by_store[1].store_name, "Fresh Mart");
}
