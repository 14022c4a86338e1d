//! Error types for deckcounts-core

use thiserror::Error;

/// Main error type for the deckcounts-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A stats provider could not produce counts for a deck.
    ///
    /// Aborts the whole build; no partial tree is ever returned.
    #[error("stats provider failed for deck {deck_id}: {message}")]
    Provider { deck_id: i64, message: String },

    /// Deck not found
    #[error("deck not found: {0}")]
    DeckNotFound(i64),
}

/// Result type alias for deckcounts-core
pub type Result<T> = std::result::Result<T, Error>;
