//! Core data models used throughout Pricebook.
//!
//! These types represent the candidate observations, catalog rows, and
//! provenance records that flow through the ingestion pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A price or quantity as supplied by the caller: either already numeric or
/// free text such as `"$4.99"` typed into a form or lifted off a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

impl From<f64> for NumericInput {
    fn from(v: f64) -> Self {
        NumericInput::Number(v)
    }
}

impl From<i32> for NumericInput {
    fn from(v: i32) -> Self {
        NumericInput::Number(f64::from(v))
    }
}

impl From<&str> for NumericInput {
    fn from(v: &str) -> Self {
        NumericInput::Text(v.to_string())
    }
}

impl From<String> for NumericInput {
    fn from(v: String) -> Self {
        NumericInput::Text(v)
    }
}

/// How an observation was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceSource {
    ManualEntry,
    GoogleVision,
    Tesseract,
    AwsTextract,
    AzureOcr,
    Other,
}

impl ProvenanceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvenanceSource::ManualEntry => "manual_entry",
            ProvenanceSource::GoogleVision => "google_vision",
            ProvenanceSource::Tesseract => "tesseract",
            ProvenanceSource::AwsTextract => "aws_textract",
            ProvenanceSource::AzureOcr => "azure_ocr",
            ProvenanceSource::Other => "other",
        }
    }

    /// Anything other than a hand-typed entry came through recognition.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, ProvenanceSource::ManualEntry)
    }
}

impl fmt::Display for ProvenanceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvenanceSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual_entry" => Ok(ProvenanceSource::ManualEntry),
            "google_vision" => Ok(ProvenanceSource::GoogleVision),
            "tesseract" => Ok(ProvenanceSource::Tesseract),
            "aws_textract" => Ok(ProvenanceSource::AwsTextract),
            "azure_ocr" => Ok(ProvenanceSource::AzureOcr),
            "other" => Ok(ProvenanceSource::Other),
            other => anyhow::bail!("unknown provenance source: '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Freshness {
    Fresh,
    #[serde(rename = "Previously Frozen")]
    PreviouslyFrozen,
    Frozen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeatGrade {
    Choice,
    Prime,
    Wagyu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeafoodSource {
    Wild,
    #[serde(rename = "Farm Raised")]
    FarmRaised,
}

/// Optional quality modifiers recorded alongside a price.
///
/// Carried through ingestion untouched; never part of duplicate detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityAttributes {
    /// Legacy free-text grade, kept for older records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meat_quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grass_fed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness: Option<Freshness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meat_grade: Option<MeatGrade>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seafood_source: Option<SeafoodSource>,
}

impl QualityAttributes {
    pub fn is_empty(&self) -> bool {
        *self == QualityAttributes::default()
    }
}

/// Recognition metadata attached to an observation by a scanning pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceMetadata {
    pub source: ProvenanceSource,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub receipt_url: Option<String>,
    #[serde(default)]
    pub processing_time_ms: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ProvenanceMetadata {
    pub fn new(source: ProvenanceSource) -> Self {
        Self {
            source,
            confidence: None,
            raw_text: None,
            receipt_url: None,
            processing_time_ms: None,
            error_message: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Untyped candidate record, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionInput {
    pub item_name: String,
    pub price: NumericInput,
    pub quantity: NumericInput,
    pub store_name: String,
    #[serde(default)]
    pub unit_type: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub target_price: Option<NumericInput>,
    #[serde(default)]
    pub quality: QualityAttributes,
    #[serde(default)]
    pub notes: Option<String>,
    /// Defaults to "now" at ingestion time when absent.
    #[serde(default, deserialize_with = "deserialize_purchase_date")]
    pub purchased_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub provenance: Option<ProvenanceMetadata>,
    #[serde(default)]
    pub auto_flag_if_suspicious: bool,
}

impl IngestionInput {
    pub fn new(
        item_name: impl Into<String>,
        price: impl Into<NumericInput>,
        quantity: impl Into<NumericInput>,
        store_name: impl Into<String>,
    ) -> Self {
        Self {
            item_name: item_name.into(),
            price: price.into(),
            quantity: quantity.into(),
            store_name: store_name.into(),
            unit_type: None,
            category: None,
            target_price: None,
            quality: QualityAttributes::default(),
            notes: None,
            purchased_at: None,
            provenance: None,
            auto_flag_if_suspicious: false,
        }
    }

    pub fn purchased_at(mut self, at: DateTime<Utc>) -> Self {
        self.purchased_at = Some(at);
        self
    }

    pub fn unit_type(mut self, unit: impl Into<String>) -> Self {
        self.unit_type = Some(unit.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn provenance(mut self, provenance: ProvenanceMetadata) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn auto_flag(mut self) -> Self {
        self.auto_flag_if_suspicious = true;
        self
    }
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates.
pub fn parse_purchase_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

fn deserialize_purchase_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) => parse_purchase_date(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid purchase date: '{}'", s))),
    }
}

/// Moderation fields. Mutated only by the review workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModerationState {
    pub flagged_for_review: bool,
    pub verified: bool,
    pub flagged_reason: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Fields for a catalog row about to be persisted.
///
/// There is deliberately no `unit_price` field: it is derived when the row
/// becomes a [`CatalogItem`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewCatalogItem {
    pub item_name: String,
    pub normalized_name: String,
    pub category: String,
    pub store_name: String,
    pub normalized_store: String,
    pub price: f64,
    pub quantity: f64,
    pub unit_type: String,
    pub purchased_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub target_price: Option<f64>,
    pub quality: QualityAttributes,
    pub user_id: Option<String>,
    pub added_by: Option<String>,
}

impl NewCatalogItem {
    pub fn unit_price(&self) -> f64 {
        self.price / self.quantity
    }

    /// Materialize the row with a fresh identity and clean moderation state.
    pub fn into_item(self, id: String, created_at: DateTime<Utc>) -> CatalogItem {
        let unit_price = self.unit_price();
        CatalogItem {
            id,
            item_name: self.item_name,
            normalized_name: self.normalized_name,
            category: self.category,
            store_name: self.store_name,
            normalized_store: self.normalized_store,
            price: self.price,
            quantity: self.quantity,
            unit_type: self.unit_type,
            unit_price,
            purchased_at: self.purchased_at,
            notes: self.notes,
            target_price: self.target_price,
            quality: self.quality,
            user_id: self.user_id,
            added_by: self.added_by,
            moderation: ModerationState::default(),
            created_at,
        }
    }
}

/// A persisted price observation.
///
/// Rows are never overwritten; a later observation of the same product is a
/// new row (price history).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    /// Display form, original casing.
    pub item_name: String,
    /// Comparison form.
    pub normalized_name: String,
    pub category: String,
    pub store_name: String,
    pub normalized_store: String,
    pub price: f64,
    pub quantity: f64,
    pub unit_type: String,
    pub unit_price: f64,
    pub purchased_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub target_price: Option<f64>,
    #[serde(default, skip_serializing_if = "QualityAttributes::is_empty")]
    pub quality: QualityAttributes,
    pub user_id: Option<String>,
    pub added_by: Option<String>,
    #[serde(flatten)]
    pub moderation: ModerationState,
    pub created_at: DateTime<Utc>,
}

impl CatalogItem {
    /// Calendar day of purchase (UTC).
    pub fn purchase_day(&self) -> NaiveDate {
        self.purchased_at.date_naive()
    }
}

/// Fields for a provenance record about to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProvenanceRecord {
    pub item_id: String,
    pub source: ProvenanceSource,
    pub confidence: Option<f64>,
    pub raw_text: Option<String>,
    pub receipt_url: Option<String>,
    pub processing_time_ms: Option<u64>,
    pub error_message: Option<String>,
    pub user_id: Option<String>,
}

impl NewProvenanceRecord {
    pub fn from_metadata(item_id: &str, meta: &ProvenanceMetadata, user_id: Option<String>) -> Self {
        Self {
            item_id: item_id.to_string(),
            source: meta.source,
            confidence: meta.confidence,
            raw_text: meta.raw_text.clone(),
            receipt_url: meta.receipt_url.clone(),
            processing_time_ms: meta.processing_time_ms,
            error_message: meta.error_message.clone(),
            user_id,
        }
    }

    pub fn into_record(self, id: String, created_at: DateTime<Utc>) -> ProvenanceRecord {
        ProvenanceRecord {
            id,
            item_id: self.item_id,
            source: self.source,
            confidence: self.confidence,
            raw_text: self.raw_text,
            receipt_url: self.receipt_url,
            processing_time_ms: self.processing_time_ms,
            error_message: self.error_message,
            user_id: self.user_id,
            created_at,
        }
    }
}

/// Links a [`CatalogItem`] to the observation that produced it. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub id: String,
    pub item_id: String,
    pub source: ProvenanceSource,
    pub confidence: Option<f64>,
    pub raw_text: Option<String>,
    pub receipt_url: Option<String>,
    pub processing_time_ms: Option<u64>,
    pub error_message: Option<String>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
