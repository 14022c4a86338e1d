//! Core domain types for deckcounts
//!
//! These types describe the deck hierarchy as it arrives from the collection
//! store and the aggregated statistics tree that is rebuilt on every refresh.

use serde::{Deserialize, Serialize};

/// Stable deck identifier.
pub type DeckId = i64;

/// Seconds since the Unix epoch.
pub type Timestamp = i64;

/// Day index as defined by the collection's scheduler (days since creation).
pub type DayIndex = i64;

// ============================================
// Card queues
// ============================================

/// Scheduling queue a card currently sits in.
///
/// The integer codes are the values stored in `cards.queue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Queue {
    /// Never studied
    New,
    /// Short-term learning; `due` is an epoch timestamp
    Learning,
    /// Review; `due` is a day index
    Review,
    /// Learning with a day-level interval; `due` is a day index
    DayLearning,
    /// Suspended by the user
    Suspended,
    /// Buried until the next session
    Buried,
}

impl Queue {
    /// Integer code stored in the database
    pub fn code(&self) -> i64 {
        match self {
            Queue::New => 0,
            Queue::Learning => 1,
            Queue::Review => 2,
            Queue::DayLearning => 3,
            Queue::Suspended => -1,
            Queue::Buried => -2,
        }
    }
}

// ============================================
// Deck catalog
// ============================================

/// A deck as exposed by the catalog, with its children.
///
/// `new_cards`, `due_rev_cards` and `due_lrn_reps` are already summed over the
/// deck's subtree by the catalog; the tree builder must not add them again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogNode {
    pub deck_id: DeckId,
    /// Display name (last component of the full deck path)
    pub name: String,
    /// Nesting depth, 1 for top-level decks
    pub level: u32,
    pub collapsed: bool,
    /// Filtered (dynamic) deck
    pub filtered: bool,
    pub new_cards: i64,
    pub due_rev_cards: i64,
    pub due_lrn_reps: i64,
    pub children: Vec<CatalogNode>,
}

impl CatalogNode {
    /// Number of decks in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(CatalogNode::subtree_len).sum::<usize>()
    }
}

// ============================================
// Learning statistics
// ============================================

/// Per-deck learning and buried counts as returned by a stats provider.
///
/// Count fields may be absent when the underlying aggregate had no rows;
/// the tree builder treats absence as zero. An absent `lrn_soonest` means the
/// deck has no cards in short-term learning and is kept as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawLearningStats {
    pub lrn_reps: Option<i64>,
    pub lrn_cards: Option<i64>,
    pub due_lrn_cards: Option<i64>,
    pub lrn_day_cards: Option<i64>,
    pub buried_cards: Option<i64>,
    pub lrn_soonest: Option<Timestamp>,
}

/// Learning and buried counters that fold over a deck subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LearningCounts {
    /// Learning repetitions left today
    pub lrn_reps: i64,
    /// Cards in short-term learning
    pub lrn_cards: i64,
    /// Learning cards due at or before the cutoff
    pub due_lrn_cards: i64,
    /// Day-learning cards due today
    pub lrn_day_cards: i64,
    pub buried_cards: i64,
    /// Earliest due time among learning cards
    pub lrn_soonest: Option<Timestamp>,
}

impl From<RawLearningStats> for LearningCounts {
    fn from(raw: RawLearningStats) -> Self {
        Self {
            lrn_reps: raw.lrn_reps.unwrap_or(0),
            lrn_cards: raw.lrn_cards.unwrap_or(0),
            due_lrn_cards: raw.due_lrn_cards.unwrap_or(0),
            lrn_day_cards: raw.lrn_day_cards.unwrap_or(0),
            buried_cards: raw.buried_cards.unwrap_or(0),
            lrn_soonest: raw.lrn_soonest,
        }
    }
}

impl LearningCounts {
    /// Fold another subtree's totals into this one.
    pub fn absorb(&mut self, other: &LearningCounts) {
        self.lrn_reps += other.lrn_reps;
        self.lrn_cards += other.lrn_cards;
        self.due_lrn_cards += other.due_lrn_cards;
        self.lrn_day_cards += other.lrn_day_cards;
        self.buried_cards += other.buried_cards;
        self.lrn_soonest = earliest(self.lrn_soonest, other.lrn_soonest);
    }

    /// Learning cards that become due after the cutoff.
    pub fn later_cards(&self) -> i64 {
        self.lrn_cards - self.due_lrn_cards
    }

    /// Learning repetitions that become due after the cutoff.
    pub fn later_reps(&self) -> i64 {
        self.lrn_reps - self.due_lrn_cards
    }
}

/// Minimum of two optional timestamps where absence is the identity.
pub fn earliest(a: Option<Timestamp>, b: Option<Timestamp>) -> Option<Timestamp> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// A deck with its own and subtree-aggregated statistics.
///
/// Built fresh for each refresh and never mutated after the build returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckStatsNode {
    pub deck_id: DeckId,
    pub name: String,
    pub level: u32,
    pub collapsed: bool,
    pub filtered: bool,
    /// New cards in the subtree (from the catalog)
    pub new_cards: i64,
    /// Review cards due today in the subtree (from the catalog)
    pub due_rev_cards: i64,
    /// Learning repetitions due (from the catalog, passed through unchanged)
    pub due_lrn_reps: i64,
    /// Counts for this deck's own cards only
    pub own: LearningCounts,
    /// Counts for this deck and all of its descendants
    pub total: LearningCounts,
    pub children: Vec<DeckStatsNode>,
}

impl DeckStatsNode {
    /// Cards actionable right now: reviews, day-learning and due learning cards.
    pub fn due_now(&self) -> i64 {
        self.due_rev_cards + self.total.lrn_day_cards + self.total.due_lrn_cards
    }
}
