//! # deckcounts-core
//!
//! Core library for deckcounts - a deck browser that splits study counts into
//! what is due now and what comes due later today.
//!
//! This library provides:
//! - Domain types for decks and their learning statistics
//! - Bottom-up aggregation of per-deck counts into subtree totals
//! - Formatting of the New / Due / Later / Buried columns
//! - A periodic refresh scheduler with reload hooks
//! - SQLite storage for the collection
//! - Configuration management and logging
//!
//! ## Example
//!
//! ```rust,no_run
//! use deckcounts_core::{Config, Database, DeckSummary};
//!
//! let config = Config::load().expect("failed to load config");
//! let db = Database::open(&config.collection_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let summary = DeckSummary::build(&db, &config.scheduler, chrono::Utc::now())
//!     .expect("failed to build deck table");
//! for row in &summary.rows {
//!     println!("{} {}", row.name, row.counts.due.text);
//! }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use format::{CellHint, CountCell, FormattedCounts};
pub use refresh::{RefreshScheduler, RefreshTarget, ReloadHooks, TickOutcome};
pub use stats::{build_tree, deck_rows, DeckRow, RowContext, StatsProvider};
pub use summary::DeckSummary;
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod refresh;
pub mod stats;
pub mod summary;
pub mod types;
