//! One complete deck table: catalog, aggregation and formatting in a single pass.

use chrono::{DateTime, Utc};

use crate::config::SchedulerConfig;
use crate::db::Database;
use crate::error::Result;
use crate::stats::{build_tree, deck_rows, DeckRow, RowContext};
use crate::types::{DayIndex, DeckId, DeckStatsNode, Timestamp};

/// Result of one refresh of the deck table.
#[derive(Debug, Clone)]
pub struct DeckSummary {
    /// Wall-clock time the build started
    pub generated_at: DateTime<Utc>,
    pub cutoff: Timestamp,
    pub today: DayIndex,
    pub tree: Vec<DeckStatsNode>,
    pub rows: Vec<DeckRow>,
}

impl DeckSummary {
    /// Build the table from the collection as of `now`.
    ///
    /// `cutoff` and `today` are computed here once and shared by every deck.
    pub fn build(db: &Database, config: &SchedulerConfig, now: DateTime<Utc>) -> Result<Self> {
        let cutoff = now.timestamp() + config.collapse_time_secs;
        let today = db.today(now.timestamp())?;
        Self::build_at(db, cutoff, today, now)
    }

    /// Build the table with explicit cutoffs.
    pub fn build_at(
        db: &Database,
        cutoff: Timestamp,
        today: DayIndex,
        generated_at: DateTime<Utc>,
    ) -> Result<Self> {
        let catalog = db.deck_catalog(cutoff, today)?;
        let tree = build_tree(&catalog, db, cutoff, today)?;
        let ctx = RowContext {
            cutoff,
            current_deck_id: db.current_deck()?,
        };
        let rows = deck_rows(&tree, &ctx);

        tracing::debug!(rows = rows.len(), cutoff, today, "Deck summary built");

        Ok(Self {
            generated_at,
            cutoff,
            today,
            tree,
            rows,
        })
    }

    /// Find a deck anywhere in the tree.
    pub fn node(&self, deck_id: DeckId) -> Option<&DeckStatsNode> {
        find_node(&self.tree, deck_id)
    }
}

fn find_node(nodes: &[DeckStatsNode], deck_id: DeckId) -> Option<&DeckStatsNode> {
    nodes.iter().find_map(|node| {
        if node.deck_id == deck_id {
            Some(node)
        } else {
            find_node(&node.children, deck_id)
        }
    })
}
