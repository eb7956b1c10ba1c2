//! # Pricebook CLI (`pricebook`)
//!
//! The `pricebook` binary is the primary interface for Pricebook. It provides
//! commands for database initialization, single and batch ingestion, price
//! history, item retrieval, the moderation queue, and catalog statistics.
//!
//! ## Usage
//!
//! ```bash
//! pricebook --config ./config/pricebook.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pricebook init` | Create the SQLite database and run schema migrations |
//! | `pricebook add <name> ...` | Record one price observation |
//! | `pricebook import <file>` | Record a JSON array of observations |
//! | `pricebook check <file>` | Validate a JSON array without storing it |
//! | `pricebook history <name>` | Show price history and best unit price |
//! | `pricebook get <id>` | Show one item with provenance |
//! | `pricebook review-queue` | List items flagged for review |
//! | `pricebook stats` | Catalog statistics |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pricebook::ingest::AddArgs;
use pricebook::{config, get, history, ingest, migrate, stats};

/// Pricebook CLI: a local-first grocery price catalog with duplicate
/// detection and price history.
#[derive(Parser)]
#[command(
    name = "pricebook",
    about = "Pricebook — a local-first grocery price catalog",
    version,
    long_about = "Pricebook records grocery price observations, entered by hand or produced by a \
    receipt scanning pipeline, rejects duplicates using fuzzy name matching, keeps price history \
    per item, and flags suspicious entries for review."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pricebook.toml")]
    config: PathBuf,

    /// Enable debug logging (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the catalog_items and
    /// provenance_records tables. Safe to run repeatedly.
    Init,

    /// Record a single price observation.
    ///
    /// Rejected duplicates, invalid input, and storage failures exit with
    /// status 1.
    Add {
        /// Item name as it should be displayed.
        name: String,

        /// Total price paid (e.g. `4.99` or `$4.99`).
        #[arg(long, allow_negative_numbers = true)]
        price: String,

        /// Quantity purchased.
        #[arg(long, default_value = "1")]
        quantity: String,

        /// Store name.
        #[arg(long)]
        store: String,

        /// Unit type (`lb`, `oz`, `each`, ...). Defaults to `each`.
        #[arg(long)]
        unit: Option<String>,

        /// Category (Meat, Seafood, Dairy, Produce, Snacks, Drinks, Household, Other).
        #[arg(long)]
        category: Option<String>,

        /// Purchase date (YYYY-MM-DD). Defaults to now.
        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Target unit price to watch for.
        #[arg(long)]
        target_price: Option<String>,

        /// Store same-day near-duplicates instead of rejecting them.
        #[arg(long)]
        auto_merge: bool,

        /// Skip the duplicate check entirely.
        #[arg(long)]
        force: bool,

        /// Fuzzy-match threshold in (0, 1]. Overrides `[ingestion].fuzzy_threshold`.
        #[arg(long)]
        threshold: Option<f64>,

        /// Flag the item for review if it looks suspicious.
        #[arg(long)]
        flag: bool,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Record a JSON array of observations (e.g. scanned receipt output).
    ///
    /// Exits with status 1 when no record was stored.
    Import {
        /// Path to a JSON file containing an array of observations.
        file: PathBuf,

        /// Stop at the first record that is not stored.
        #[arg(long)]
        stop_on_error: bool,

        /// Do not flag suspicious records, regardless of `[ingestion].flag_imports`.
        #[arg(long)]
        no_flag: bool,

        /// Print the results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Validate a JSON array of observations without storing anything.
    Check {
        file: PathBuf,
    },

    /// Show price history for an item.
    History {
        /// Item name (matched after normalization).
        name: String,
    },

    /// Show one catalog item with its provenance records.
    Get {
        /// Item UUID.
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// List items flagged for review and not yet verified.
    ReviewQueue {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Show catalog statistics.
    Stats,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,pricebook=debug,pricebook_core=debug"
    } else {
        "warn,pricebook=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    if let Commands::Check { file } = &cli.command {
        if !ingest::run_check(file)? {
            std::process::exit(1);
        }
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add {
            name,
            price,
            quantity,
            store,
            unit,
            category,
            date,
            notes,
            target_price,
            auto_merge,
            force,
            threshold,
            flag,
            json,
        } => {
            let args = AddArgs {
                name,
                price,
                quantity,
                store,
                unit,
                category,
                date,
                notes,
                target_price,
                auto_merge,
                force,
                threshold,
                flag,
                json,
            };
            if !ingest::run_add(&cfg, &args).await? {
                std::process::exit(1);
            }
        }
        Commands::Import {
            file,
            stop_on_error,
            no_flag,
            json,
        } => {
            let summary = ingest::run_import(&cfg, &file, stop_on_error, no_flag, json).await?;
            if summary.stored_nothing() {
                std::process::exit(1);
            }
        }
        Commands::History { name } => {
            history::run_history(&cfg, &name).await?;
        }
        Commands::Get { id, json } => {
            get::run_get(&cfg, &id, json).await?;
        }
        Commands::ReviewQueue { limit } => {
            history::run_review_queue(&cfg, limit).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Check { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
