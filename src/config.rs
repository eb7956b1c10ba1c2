//! Configuration parsing and validation.
//!
//! Pricebook is configured via a TOML file (default `./config/pricebook.toml`).
//! Only `[db]` is required.
//!
//! ```toml
//! [db]
//! path = "./data/pricebook.sqlite"
//!
//! [ingestion]
//! fuzzy_threshold = 0.85
//! auto_merge = false
//! stop_on_error = false
//! flag_imports = true
//!
//! [flagging]
//! min_price = 0.01
//! max_price = 10000.0
//! min_confidence = 0.5
//! max_quantity = 1000.0
//!
//! [user]
//! display_name = "Sam"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use pricebook_core::classify::DEFAULT_FUZZY_THRESHOLD;
use pricebook_core::flag::FlagPolicy;
use pricebook_core::ingest::{BatchOptions, IngestOptions};
use pricebook_core::store::StaticIdentity;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub flagging: FlagPolicy,
    #[serde(default)]
    pub user: UserConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestionConfig {
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default)]
    pub auto_merge: bool,
    #[serde(default)]
    pub stop_on_error: bool,
    /// Whether `import` asks for suspicious rows to be flagged.
    #[serde(default = "default_flag_imports")]
    pub flag_imports: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            auto_merge: false,
            stop_on_error: false,
            flag_imports: true,
        }
    }
}

fn default_fuzzy_threshold() -> f64 {
    DEFAULT_FUZZY_THRESHOLD
}
fn default_flag_imports() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl IngestionConfig {
    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            auto_merge: self.auto_merge,
            fuzzy_threshold: self.fuzzy_threshold,
            skip_duplicate_check: false,
        }
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            ingest: self.ingest_options(),
            stop_on_error: self.stop_on_error,
        }
    }
}

impl UserConfig {
    pub fn identity(&self) -> StaticIdentity {
        StaticIdentity {
            display_name: self
                .display_name
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            user_id: self.id.clone(),
        }
    }
}

impl Config {
    /// A config pointing at `db_path` with every other section defaulted.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            ingestion: IngestionConfig::default(),
            flagging: FlagPolicy::default(),
            user: UserConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<()> {
    let threshold = config.ingestion.fuzzy_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        bail!("ingestion.fuzzy_threshold must be in (0.0, 1.0]");
    }

    let flagging = &config.flagging;
    if flagging.min_price < 0.0 {
        bail!("flagging.min_price must be >= 0");
    }
    if flagging.min_price >= flagging.max_price {
        bail!("flagging.min_price must be less than flagging.max_price");
    }
    if !(0.0..=1.0).contains(&flagging.min_confidence) {
        bail!("flagging.min_confidence must be in [0.0, 1.0]");
    }
    if flagging.max_quantity <= 0.0 {
        bail!("flagging.max_quantity must be > 0");
    }

    Ok(())
}
