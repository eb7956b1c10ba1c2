//! Ingestion pipeline orchestration.
//!
//! Coordinates the single-item flow: normalize + validate → duplicate
//! classification → persistence → provenance record → auto-flag. Each step
//! either hands its output to the next or ends the pipeline with a terminal
//! [`IngestionResult`]. Everything after a successful insert is best-effort:
//! failures there are logged and never change the result.
//!
//! Batches run the same pipeline sequentially, optionally stopping at the
//! first unsuccessful result.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::classify::{
    classify, Candidate, Classification, ClassifierPolicy, DEFAULT_FUZZY_THRESHOLD,
};
use crate::flag::{self, FlagPolicy};
use crate::models::{CatalogItem, IngestionInput, NewCatalogItem, NewProvenanceRecord};
use crate::normalize::{
    format_price, normalize_whitespace, DEFAULT_CATEGORY, DEFAULT_UNIT,
};
use crate::store::{
    Anonymous, IdentityProvider, ItemRepository, ModerationRepository, ProvenanceRepository,
};
use crate::validate::{normalize_and_validate, NormalizedInput, ValidationError, ValidationOutcome};

/// Per-call knobs for [`Ingestor::ingest_item`].
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Store same-day, same-price near-duplicates as price history instead
    /// of rejecting them.
    pub auto_merge: bool,
    pub fuzzy_threshold: f64,
    pub skip_duplicate_check: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            auto_merge: false,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            skip_duplicate_check: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    pub ingest: IngestOptions,
    pub stop_on_error: bool,
}

/// What the caller should offer the user after a duplicate rejection.
///
/// The pipeline itself only ever suggests `Update`; `CreateNew` and
/// `Confirm` are for interactive callers that re-present a rejection after
/// the user has seen the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Update,
    CreateNew,
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKind {
    Exact,
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMatch {
    pub existing_item: CatalogItem,
    pub similarity: f64,
    pub suggested_action: SuggestedAction,
    pub kind: DuplicateKind,
}

/// How a stored observation relates to what was already in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    New,
    PriceHistory,
    SimilarName,
    AutoMerged,
    /// The duplicate check was skipped.
    Unchecked,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestedItem {
    pub item: CatalogItem,
    pub kind: ObservationKind,
    /// Set when a provenance record was written.
    pub provenance_id: Option<String>,
    /// Set when the item was submitted for review.
    pub flag_reason: Option<String>,
}

/// Outcome of one ingestion.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestionResult {
    Created(IngestedItem),
    /// Duplicate of an existing row; nothing was written.
    Rejected {
        duplicate: DuplicateMatch,
        message: String,
    },
    Invalid(ValidationError),
    /// A repository call failed before the item existed.
    Failed(String),
}

impl IngestionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, IngestionResult::Created(_))
    }

    pub fn item(&self) -> Option<&CatalogItem> {
        match self {
            IngestionResult::Created(created) => Some(&created.item),
            _ => None,
        }
    }

    pub fn match_found(&self) -> Option<&DuplicateMatch> {
        match self {
            IngestionResult::Rejected { duplicate, .. } => Some(duplicate),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<String> {
        match self {
            IngestionResult::Created(_) => None,
            IngestionResult::Rejected { message, .. } => Some(message.clone()),
            IngestionResult::Invalid(e) => Some(e.to_string()),
            IngestionResult::Failed(message) => Some(message.clone()),
        }
    }
}

#[derive(Serialize)]
struct ResultView<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    item: Option<&'a CatalogItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ObservationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    flag_reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    match_found: Option<&'a DuplicateMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Serialize for IngestionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let created = match self {
            IngestionResult::Created(c) => Some(c),
            _ => None,
        };
        ResultView {
            success: self.is_success(),
            item: self.item(),
            kind: created.map(|c| c.kind),
            flag_reason: created.and_then(|c| c.flag_reason.as_deref()),
            match_found: self.match_found(),
            error: self.error(),
        }
        .serialize(serializer)
    }
}

/// Normalize and validate without touching storage.
pub fn validate_for_ingestion(input: &IngestionInput) -> ValidationOutcome {
    normalize_and_validate(input).into()
}

/// Decode one JSON record into an [`IngestionInput`]. A record that does
/// not decode is a [`ValidationError::Malformed`], not a hard error, so one
/// bad row in an import file does not take the others down with it.
pub fn decode_input(value: serde_json::Value) -> Result<IngestionInput, ValidationError> {
    serde_json::from_value(value).map_err(|e| ValidationError::Malformed(e.to_string()))
}

type Step<T> = std::result::Result<T, IngestionResult>;

struct Prepared {
    normalized: NormalizedInput,
    unit_price: f64,
    purchased_at: DateTime<Utc>,
}

/// One async mutex per normalized item name, so that concurrent
/// ingestions of the same name see each other's writes. Entries nobody
/// holds are pruned on the next acquisition.
#[derive(Default)]
struct NameLocks {
    inner: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NameLocks {
    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Runs observations through the ingestion pipeline against a set of
/// repositories.
pub struct Ingestor {
    items: Arc<dyn ItemRepository>,
    provenance: Arc<dyn ProvenanceRepository>,
    moderation: Arc<dyn ModerationRepository>,
    identity: Arc<dyn IdentityProvider>,
    flag_policy: FlagPolicy,
    name_locks: NameLocks,
}

impl Ingestor {
    pub fn new(
        items: Arc<dyn ItemRepository>,
        provenance: Arc<dyn ProvenanceRepository>,
        moderation: Arc<dyn ModerationRepository>,
    ) -> Self {
        Self {
            items,
            provenance,
            moderation,
            identity: Arc::new(Anonymous),
            flag_policy: FlagPolicy::default(),
            name_locks: NameLocks::default(),
        }
    }

    /// Use one store for items, provenance, and moderation.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ItemRepository + ProvenanceRepository + ModerationRepository + 'static,
    {
        Self::new(store.clone(), store.clone(), store)
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_flag_policy(mut self, policy: FlagPolicy) -> Self {
        self.flag_policy = policy;
        self
    }

    /// Ingest one observation. Never returns an error: every failure is an
    /// [`IngestionResult`] variant.
    pub async fn ingest_item(
        &self,
        input: &IngestionInput,
        options: &IngestOptions,
    ) -> IngestionResult {
        match self.run_pipeline(input, options).await {
            Ok(result) | Err(result) => result,
        }
    }

    /// Ingest observations one after another, one result per input. With
    /// `stop_on_error`, the first unsuccessful result ends the batch.
    pub async fn ingest_batch(
        &self,
        inputs: &[IngestionInput],
        options: &BatchOptions,
    ) -> Vec<IngestionResult> {
        self.run_batch(inputs.iter().map(Ok), inputs.len(), options)
            .await
    }

    /// Like [`ingest_batch`](Self::ingest_batch) for records that may have
    /// failed to decode (see [`decode_input`]). A decode failure takes its
    /// record's slot as an [`IngestionResult::Invalid`] and counts as
    /// unsuccessful for `stop_on_error`.
    pub async fn ingest_records(
        &self,
        records: &[Result<IngestionInput, ValidationError>],
        options: &BatchOptions,
    ) -> Vec<IngestionResult> {
        self.run_batch(records.iter().map(Result::as_ref), records.len(), options)
            .await
    }

    async fn run_batch<'a, I>(
        &self,
        records: I,
        total: usize,
        options: &BatchOptions,
    ) -> Vec<IngestionResult>
    where
        I: Iterator<Item = Result<&'a IngestionInput, &'a ValidationError>>,
    {
        let mut results = Vec::with_capacity(total);

        for (index, record) in records.enumerate() {
            let result = match record {
                Ok(input) => self.ingest_item(input, &options.ingest).await,
                Err(e) => IngestionResult::Invalid(e.clone()),
            };
            let failed = !result.is_success();
            results.push(result);

            if failed && options.stop_on_error {
                info!(
                    index,
                    skipped = total - index - 1,
                    "batch stopped at first unsuccessful item"
                );
                break;
            }
        }

        results
    }

    async fn run_pipeline(
        &self,
        input: &IngestionInput,
        options: &IngestOptions,
    ) -> Step<IngestionResult> {
        let prepared = prepare(input)?;

        let lock = self.name_locks.lock_for(&prepared.normalized.normalized_name);
        let guard = lock.lock().await;
        let kind = self.check_duplicates(&prepared, options).await?;
        let item = self.persist(input, &prepared).await?;
        drop(guard);

        info!(
            item_id = %item.id,
            item_name = %item.item_name,
            unit_price = item.unit_price,
            kind = ?kind,
            "catalog item created"
        );

        let provenance_id = self.record_provenance(input, &item).await;
        let (item, flag_reason) = self.auto_flag(input, item).await;

        Ok(IngestionResult::Created(IngestedItem {
            item,
            kind,
            provenance_id,
            flag_reason,
        }))
    }

    async fn check_duplicates(
        &self,
        prepared: &Prepared,
        options: &IngestOptions,
    ) -> Step<ObservationKind> {
        if options.skip_duplicate_check {
            return Ok(ObservationKind::Unchecked);
        }

        let existing = self.items.fetch_all_items().await.map_err(|e| {
            warn!(error = %e, "failed to load catalog for duplicate check");
            IngestionResult::Failed(format!("Failed to load existing items: {}", e))
        })?;

        let candidate = Candidate {
            normalized_name: &prepared.normalized.normalized_name,
            normalized_store: &prepared.normalized.normalized_store,
            unit_price: prepared.unit_price,
            purchase_day: prepared.purchased_at.date_naive(),
        };
        let policy = ClassifierPolicy {
            fuzzy_threshold: options.fuzzy_threshold,
            auto_merge: options.auto_merge,
        };

        match classify(&candidate, &existing, &policy) {
            Classification::NewItem => Ok(ObservationKind::New),
            Classification::PriceHistory {
                reference,
                similarity,
            } => {
                debug!(reference_id = %reference.id, similarity, "recording price history");
                Ok(ObservationKind::PriceHistory)
            }
            Classification::SimilarName {
                reference,
                similarity,
            } => {
                debug!(
                    reference_id = %reference.id,
                    similarity,
                    "similar name treated as a distinct item"
                );
                Ok(ObservationKind::SimilarName)
            }
            Classification::AutoMerged {
                existing,
                similarity,
            } => {
                info!(
                    existing_id = %existing.id,
                    item_name = %existing.item_name,
                    similarity,
                    "auto-merging with existing item"
                );
                Ok(ObservationKind::AutoMerged)
            }
            Classification::ExactDuplicate { existing } => {
                let message = format!(
                    "Duplicate entry: \"{}\" at {} on {} for {} is already recorded. Update the existing entry instead.",
                    existing.item_name,
                    existing.store_name,
                    existing.purchase_day(),
                    format_price(existing.unit_price),
                );
                Err(rejection(existing, 1.0, DuplicateKind::Exact, message))
            }
            Classification::AmbiguousDuplicate {
                existing,
                similarity,
            } => {
                let message = format!(
                    "Similar item found: \"{}\" ({}% match). Consider updating instead of creating new.",
                    existing.item_name,
                    (similarity * 100.0).round(),
                );
                Err(rejection(existing, similarity, DuplicateKind::Ambiguous, message))
            }
        }
    }

    async fn persist(&self, input: &IngestionInput, prepared: &Prepared) -> Step<CatalogItem> {
        let n = &prepared.normalized;
        let new_item = NewCatalogItem {
            item_name: normalize_whitespace(&input.item_name),
            normalized_name: n.normalized_name.clone(),
            category: n
                .category
                .clone()
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            store_name: normalize_whitespace(&input.store_name),
            normalized_store: n.normalized_store.clone(),
            price: n.price,
            quantity: n.quantity,
            unit_type: n
                .unit_type
                .clone()
                .unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            purchased_at: prepared.purchased_at,
            notes: input
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            target_price: n.target_price,
            quality: input.quality.clone(),
            user_id: self.identity.current_user_id(),
            added_by: self.identity.current_user_display_name(),
        };

        self.items.create_item(new_item).await.map_err(|e| {
            warn!(item_name = %input.item_name, error = %e, "failed to create catalog item");
            IngestionResult::Failed(format!("Failed to create item: {}", e))
        })
    }

    async fn record_provenance(&self, input: &IngestionInput, item: &CatalogItem) -> Option<String> {
        let meta = input.provenance.as_ref()?;
        if !meta.source.is_recognized() {
            return None;
        }

        let record =
            NewProvenanceRecord::from_metadata(&item.id, meta, self.identity.current_user_id());
        match self.provenance.create_provenance_record(record).await {
            Ok(created) => {
                debug!(item_id = %item.id, provenance_id = %created.id, source = %meta.source, "provenance recorded");
                Some(created.id)
            }
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "failed to record provenance; item kept");
                None
            }
        }
    }

    async fn auto_flag(
        &self,
        input: &IngestionInput,
        mut item: CatalogItem,
    ) -> (CatalogItem, Option<String>) {
        if !input.auto_flag_if_suspicious {
            return (item, None);
        }
        let Some(reason) = flag::evaluate(&item, input.provenance.as_ref(), &self.flag_policy)
        else {
            return (item, None);
        };

        match self.moderation.flag_for_review(&item.id, &reason).await {
            Ok(()) => {
                info!(item_id = %item.id, reason = %reason, "item flagged for review");
                item.moderation.flagged_for_review = true;
                item.moderation.flagged_reason = Some(reason.clone());
                (item, Some(reason))
            }
            Err(e) => {
                warn!(item_id = %item.id, reason = %reason, error = %e, "failed to flag item; item kept");
                (item, None)
            }
        }
    }
}

fn prepare(input: &IngestionInput) -> Step<Prepared> {
    let normalized = normalize_and_validate(input).map_err(|e| {
        debug!(item_name = %input.item_name, reason = %e, "input rejected by validation");
        IngestionResult::Invalid(e)
    })?;
    let unit_price = normalized.unit_price();
    Ok(Prepared {
        normalized,
        unit_price,
        purchased_at: input.purchased_at.unwrap_or_else(Utc::now),
    })
}

fn rejection(
    existing: CatalogItem,
    similarity: f64,
    kind: DuplicateKind,
    message: String,
) -> IngestionResult {
    info!(
        existing_id = %existing.id,
        similarity,
        kind = ?kind,
        "duplicate rejected"
    );
    IngestionResult::Rejected {
        duplicate: DuplicateMatch {
            existing_item: existing,
            similarity,
            suggested_action: SuggestedAction::Update,
            kind,
        },
        message,
    }
}
