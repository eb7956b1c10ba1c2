//! CLI ingestion commands: `add`, `import`, and `check`.
//!
//! Wires the pricebook-core [`Ingestor`] to a [`SqliteStore`] and the
//! configured identity and flag policy, then reports each
//! [`IngestionResult`] on stdout.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use sqlx::SqlitePool;
use tracing::info;

use pricebook_core::ingest::{
    decode_input, validate_for_ingestion, IngestionResult, Ingestor, ObservationKind,
    SuggestedAction,
};
use pricebook_core::models::{parse_purchase_date, IngestionInput, NumericInput};
use pricebook_core::normalize::{format_price, format_unit_price};
use pricebook_core::similarity::MatchConfidence;
use pricebook_core::validate::ValidationError;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Arguments for `pricebook add`. Price and quantity are kept as text so
/// that inputs like `$4.99` go through the normalizer.
#[derive(Debug, Clone, Default)]
pub struct AddArgs {
    pub name: String,
    pub price: String,
    pub quantity: String,
    pub store: String,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub notes: Option<String>,
    pub target_price: Option<String>,
    pub auto_merge: bool,
    pub force: bool,
    pub threshold: Option<f64>,
    pub flag: bool,
    pub json: bool,
}

/// Build an [`Ingestor`] over the configured database.
pub async fn open_ingestor(config: &Config) -> Result<(SqlitePool, Ingestor)> {
    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteStore::new(pool.clone()));
    let ingestor = Ingestor::from_store(store)
        .with_identity(Arc::new(config.user.identity()))
        .with_flag_policy(config.flagging);
    Ok((pool, ingestor))
}

impl AddArgs {
    fn to_input(&self) -> Result<IngestionInput> {
        let mut input = IngestionInput::new(
            self.name.as_str(),
            self.price.as_str(),
            self.quantity.as_str(),
            self.store.as_str(),
        );
        input.unit_type = self.unit.clone();
        input.category = self.category.clone();
        input.notes = self.notes.clone();
        input.target_price = self.target_price.clone().map(NumericInput::Text);
        input.auto_flag_if_suspicious = self.flag;
        if let Some(ref date) = self.date {
            match parse_purchase_date(date) {
                Some(at) => input.purchased_at = Some(at),
                None => bail!("Invalid --date '{}': expected YYYY-MM-DD", date),
            }
        }
        Ok(input)
    }
}

/// CLI entry point for `pricebook add`. Returns whether the item was stored.
pub async fn run_add(config: &Config, args: &AddArgs) -> Result<bool> {
    let input = args.to_input()?;

    let mut options = config.ingestion.ingest_options();
    options.auto_merge |= args.auto_merge;
    options.skip_duplicate_check = args.force;
    if let Some(threshold) = args.threshold {
        if !(threshold > 0.0 && threshold <= 1.0) {
            bail!("--threshold must be in (0.0, 1.0]");
        }
        options.fuzzy_threshold = threshold;
    }

    let (pool, ingestor) = open_ingestor(config).await?;
    let result = ingestor.ingest_item(&input, &options).await;
    pool.close().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_add_result(&result);
    }

    Ok(result.is_success())
}

fn print_add_result(result: &IngestionResult) {
    match result {
        IngestionResult::Created(created) => {
            let item = &created.item;
            println!("added {}", item.item_name);
            println!("  id:         {}", item.id);
            println!("  store:      {}", item.store_name);
            println!(
                "  price:      {} for {} {}",
                format_price(item.price),
                item.quantity,
                item.unit_type
            );
            println!("  unit price: {}", format_unit_price(item.unit_price, &item.unit_type));
            println!("  purchased:  {}", item.purchase_day());
            println!("  recorded:   {}", kind_label(created.kind));
            if let Some(ref by) = item.added_by {
                println!("  added by:   {}", by);
            }
            if let Some(ref reason) = created.flag_reason {
                println!("  flagged:    {}", reason);
            }
            println!("ok");
        }
        IngestionResult::Rejected { duplicate, message } => {
            println!("not added: {}", message);
            println!("  existing id: {}", duplicate.existing_item.id);
            println!(
                "  similarity:  {:.3} ({})",
                duplicate.similarity,
                MatchConfidence::from_score(duplicate.similarity)
            );
            println!("  suggested:   {}", action_label(duplicate.suggested_action));
        }
        IngestionResult::Invalid(e) => println!("invalid: {}", e),
        IngestionResult::Failed(message) => println!("failed: {}", message),
    }
}

fn kind_label(kind: ObservationKind) -> &'static str {
    match kind {
        ObservationKind::New => "new item",
        ObservationKind::PriceHistory => "price history",
        ObservationKind::SimilarName => "new item, similar name exists",
        ObservationKind::AutoMerged => "auto-merged",
        ObservationKind::Unchecked => "unchecked",
    }
}

fn action_label(action: SuggestedAction) -> &'static str {
    match action {
        SuggestedAction::Update => "update the existing entry",
        SuggestedAction::CreateNew => "create a new entry",
        SuggestedAction::Confirm => "confirm with the user",
    }
}

/// The records of an import file, decoded one by one. The file must be a
/// JSON array; a record inside it that does not decode is kept as a
/// [`ValidationError::Malformed`] in its slot.
struct ImportFile {
    labels: Vec<String>,
    records: Vec<Result<IngestionInput, ValidationError>>,
}

impl ImportFile {
    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read import file: {}", path.display()))?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse import file: {}", path.display()))?;

        let mut file = ImportFile {
            labels: Vec::with_capacity(values.len()),
            records: Vec::with_capacity(values.len()),
        };
        for value in values {
            file.labels.push(record_label(&value));
            file.records.push(decode_input(value));
        }
        Ok(file)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

fn record_label(value: &serde_json::Value) -> String {
    value
        .get("item_name")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("(unnamed)")
        .to_string()
}

/// Per-outcome counts for an import run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub failed: usize,
    pub flagged: usize,
    pub skipped: usize,
}

impl ImportSummary {
    pub fn tally(results: &[IngestionResult], submitted: usize) -> Self {
        let mut summary = ImportSummary {
            skipped: submitted.saturating_sub(results.len()),
            ..Default::default()
        };
        for result in results {
            match result {
                IngestionResult::Created(c) => {
                    summary.created += 1;
                    if c.flag_reason.is_some() {
                        summary.flagged += 1;
                    }
                }
                IngestionResult::Rejected { .. } => summary.duplicates += 1,
                IngestionResult::Invalid(_) => summary.invalid += 1,
                IngestionResult::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    /// True when records were submitted but none of them was stored.
    pub fn stored_nothing(&self) -> bool {
        let submitted =
            self.created + self.duplicates + self.invalid + self.failed + self.skipped;
        submitted > 0 && self.created == 0
    }
}

/// CLI entry point for `pricebook import <file>`. The caller exits non-zero
/// when [`ImportSummary::stored_nothing`] holds.
pub async fn run_import(
    config: &Config,
    path: &Path,
    stop_on_error: bool,
    no_flag: bool,
    json: bool,
) -> Result<ImportSummary> {
    let mut file = ImportFile::read(path)?;
    if config.ingestion.flag_imports && !no_flag {
        for input in file.records.iter_mut().flatten() {
            input.auto_flag_if_suspicious = true;
        }
    }

    let mut options = config.ingestion.batch_options();
    options.stop_on_error |= stop_on_error;

    let (pool, ingestor) = open_ingestor(config).await?;
    let results = ingestor.ingest_records(&file.records, &options).await;
    pool.close().await;

    let summary = ImportSummary::tally(&results, file.len());
    info!(
        file = %path.display(),
        created = summary.created,
        duplicates = summary.duplicates,
        invalid = summary.invalid,
        failed = summary.failed,
        skipped = summary.skipped,
        "import finished"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!("import {}", path.display());
        for (i, (label, result)) in file.labels.iter().zip(&results).enumerate() {
            println!("  {}", import_line(i + 1, label, result));
        }
        println!("  created: {}", summary.created);
        println!("  duplicates: {}", summary.duplicates);
        println!("  invalid: {}", summary.invalid);
        println!("  failed: {}", summary.failed);
        println!("  flagged: {}", summary.flagged);
        if summary.skipped > 0 {
            println!("  skipped: {}", summary.skipped);
        }
        if summary.stored_nothing() {
            println!("nothing stored");
        } else {
            println!("ok");
        }
    }

    Ok(summary)
}

fn import_line(n: usize, label: &str, result: &IngestionResult) -> String {
    match result {
        IngestionResult::Created(c) => {
            let flag = match c.flag_reason {
                Some(ref reason) => format!(" [flagged: {}]", reason),
                None => String::new(),
            };
            format!(
                "#{} added {} @ {} {} ({}){}",
                n,
                c.item.item_name,
                c.item.store_name,
                format_unit_price(c.item.unit_price, &c.item.unit_type),
                kind_label(c.kind),
                flag
            )
        }
        other => format!(
            "#{} skipped {}: {}",
            n,
            label,
            other.error().unwrap_or_default()
        ),
    }
}

/// CLI entry point for `pricebook check <file>`: validation only, no
/// database access. Returns whether every record is valid.
pub fn run_check(path: &Path) -> Result<bool> {
    let file = ImportFile::read(path)?;
    let mut valid = 0usize;

    println!("check {}", path.display());
    for (i, (label, record)) in file.labels.iter().zip(&file.records).enumerate() {
        let reason = match record {
            Ok(input) => validate_for_ingestion(input).error(),
            Err(e) => Some(e.to_string()),
        };
        match reason {
            None => valid += 1,
            Some(reason) => println!("  #{} {}: {}", i + 1, label, reason),
        }
    }
    println!("  valid: {} / {}", valid, file.len());

    Ok(valid == file.len())
}
