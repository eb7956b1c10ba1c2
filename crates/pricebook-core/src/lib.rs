//! # Pricebook Core
//!
//! Storage-agnostic logic for Pricebook: catalog models, normalization and
//! validation, fuzzy name similarity, duplicate classification, the
//! suspicious-data flagger, unit-aware price comparison, repository
//! traits, and the ingestion pipeline that ties them together.
//!
//! This crate has no database or filesystem dependencies. The SQLite
//! backend lives in the `pricebook` application crate; an in-memory store
//! is provided here for tests and embedding.

pub mod classify;
pub mod flag;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod similarity;
pub mod store;
pub mod units;
pub mod validate;
