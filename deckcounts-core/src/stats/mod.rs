//! Deck statistics aggregation
//!
//! Turns the deck catalog plus per-deck learning counts into a fully
//! aggregated statistics tree, then flattens that tree into display rows.
//!
//! ## Flow
//!
//! ```text
//! CatalogNode forest ──┐
//!                      ├─▶ build_tree ─▶ DeckStatsNode forest ─▶ deck_rows ─▶ Vec<DeckRow>
//! StatsProvider ───────┘
//! ```
//!
//! A build takes a single `cutoff` and `today` for every deck so that all
//! nodes of one tree agree on what "due now" means.

pub mod rows;
pub mod tree;

pub use rows::{deck_rows, DeckRow, RowContext};
pub use tree::build_tree;

use crate::error::Result;
use crate::types::{DayIndex, DeckId, RawLearningStats, Timestamp};

/// Source of per-deck learning and buried counts.
///
/// Implementations report a deck's own cards only, never its descendants.
pub trait StatsProvider {
    /// Counts for the cards directly in `deck_id`.
    ///
    /// - `cutoff`: learning cards due at or before this timestamp are due now
    /// - `today`: day-learning cards due on or before this day are due now
    fn stats_for(
        &self,
        deck_id: DeckId,
        cutoff: Timestamp,
        today: DayIndex,
    ) -> Result<RawLearningStats>;
}

impl<P: StatsProvider + ?Sized> StatsProvider for &P {
    fn stats_for(
        &self,
        deck_id: DeckId,
        cutoff: Timestamp,
        today: DayIndex,
    ) -> Result<RawLearningStats> {
        (**self).stats_for(deck_id, cutoff, today)
    }
}

/// A fixed, in-memory stats provider.
///
/// Useful for tests and for replaying a captured snapshot; decks without an
/// entry report no cards at all.
#[derive(Debug, Clone, Default)]
pub struct SnapshotProvider {
    stats: std::collections::HashMap<DeckId, RawLearningStats>,
}

impl SnapshotProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the counts reported for a deck.
    pub fn insert(&mut self, deck_id: DeckId, stats: RawLearningStats) -> &mut Self {
        self.stats.insert(deck_id, stats);
        self
    }
}

impl StatsProvider for SnapshotProvider {
    fn stats_for(
        &self,
        deck_id: DeckId,
        _cutoff: Timestamp,
        _today: DayIndex,
    ) -> Result<RawLearningStats> {
        Ok(self.stats.get(&deck_id).copied().unwrap_or_default())
    }
}
