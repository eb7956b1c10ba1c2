//! # Pricebook
//!
//! A local-first grocery price catalog. Observations come in by hand or from
//! a receipt / price-tag scanning pipeline, are normalized and validated,
//! checked against the catalog for duplicates, and stored as price history
//! in SQLite.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────┐   ┌──────────┐
//! │ add/import  │──▶│ pricebook-core        │──▶│  SQLite   │
//! │ (CLI, JSON) │   │ validate+match+flag   │   │ items+prov│
//! └─────────────┘   └──────────────────────┘   └────┬─────┘
//!                                                   │
//!                         ┌─────────────────────────┤
//!                         ▼                         ▼
//!                   ┌──────────┐             ┌─────────────┐
//!                   │ history  │             │ review-queue│
//!                   │ get/stats│             │             │
//!                   └──────────┘             └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pricebook init
//! pricebook add "Milk" --price 4.99 --quantity 1 --store Acme
//! pricebook import receipt.json
//! pricebook history milk
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//! | [`sqlite_store`] | Repository implementation and read-side queries |
//! | [`ingest`] | `add`, `import`, `check` commands |
//! | [`get`] | Item retrieval with provenance |
//! | [`history`] | Price history and review queue listings |
//! | [`stats`] | Catalog statistics |

pub mod config;
pub mod db;
pub mod get;
pub mod history;
pub mod ingest;
pub mod migrate;
pub mod sqlite_store;
pub mod stats;

pub use pricebook_core::{classify, flag, models, normalize, similarity, store, validate};
