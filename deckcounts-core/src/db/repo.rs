//! Database repository layer
//!
//! Provides the deck catalog, per-deck learning statistics and the few writes
//! the deck browser needs.

use crate::error::{Error, Result};
use crate::stats::StatsProvider;
use crate::types::*;
use rusqlite::{named_params, params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const SECS_PER_DAY: i64 = 86_400;

/// Settings key holding the current deck id
const CURRENT_DECK_KEY: &str = "current_deck";

/// A deck row as stored, before it is arranged into a tree.
#[derive(Debug, Clone)]
struct DeckRecord {
    id: DeckId,
    name: String,
    parent_id: Option<DeckId>,
    collapsed: bool,
    filtered: bool,
}

/// Catalog counters for a deck's own cards.
#[derive(Debug, Clone, Copy, Default)]
struct QueueCounts {
    new_cards: i64,
    due_rev_cards: i64,
    due_lrn_reps: i64,
}

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        super::schema::run_migrations(&self.conn())
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // The connection holds no invariants a panicking reader could break.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================
    // Collection operations
    // ============================================

    /// Collection creation time, the start of day 0.
    pub fn created_at(&self) -> Result<Timestamp> {
        let crt = self
            .conn()
            .query_row("SELECT crt FROM col WHERE id = 1", [], |r| r.get(0))?;
        Ok(crt)
    }

    /// Override the collection creation time.
    pub fn set_created_at(&self, crt: Timestamp) -> Result<()> {
        self.conn().execute(
            "INSERT INTO col (id, crt) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET crt = excluded.crt",
            [crt],
        )?;
        Ok(())
    }

    /// Scheduler day index for `now`.
    pub fn today(&self, now: Timestamp) -> Result<DayIndex> {
        Ok((now - self.created_at()?).div_euclid(SECS_PER_DAY))
    }

    /// The collection's current deck, if one is set and still exists.
    pub fn current_deck(&self) -> Result<Option<DeckId>> {
        let conn = self.conn();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                [CURRENT_DECK_KEY],
                |r| r.get(0),
            )
            .optional()?;

        let Some(deck_id) = value.and_then(|v| v.parse::<DeckId>().ok()) else {
            return Ok(None);
        };
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM decks WHERE id = ?)",
            [deck_id],
            |r| r.get(0),
        )?;
        Ok(exists.then_some(deck_id))
    }

    /// Make a deck the collection's current deck.
    pub fn set_current_deck(&self, deck_id: DeckId) -> Result<()> {
        let conn = self.conn();
        Self::ensure_deck(&conn, deck_id)?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![CURRENT_DECK_KEY, deck_id.to_string()],
        )?;
        Ok(())
    }

    // ============================================
    // Deck operations
    // ============================================

    /// Create a deck as the last child of `parent_id` (or as a top-level deck).
    pub fn add_deck(&self, name: &str, parent_id: Option<DeckId>) -> Result<DeckId> {
        let conn = self.conn();
        if let Some(parent_id) = parent_id {
            Self::ensure_deck(&conn, parent_id)?;
        }
        conn.execute(
            r#"
            INSERT INTO decks (name, parent_id, position)
            VALUES (
                ?1, ?2,
                (SELECT COUNT(*) FROM decks WHERE parent_id IS ?2)
            )
            "#,
            params![name, parent_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Mark a deck as filtered (dynamic).
    pub fn set_deck_filtered(&self, deck_id: DeckId, filtered: bool) -> Result<()> {
        self.update_deck_flag(deck_id, "filtered", filtered)
    }

    /// Collapse or expand a deck in the browser.
    pub fn set_deck_collapsed(&self, deck_id: DeckId, collapsed: bool) -> Result<()> {
        self.update_deck_flag(deck_id, "collapsed", collapsed)
    }

    /// Flip a deck's collapsed flag, returning the new value.
    pub fn toggle_deck_collapsed(&self, deck_id: DeckId) -> Result<bool> {
        let collapsed: bool = self
            .conn()
            .query_row(
                "UPDATE decks SET collapsed = NOT collapsed WHERE id = ? RETURNING collapsed",
                [deck_id],
                |r| r.get(0),
            )
            .optional()?
            .ok_or(Error::DeckNotFound(deck_id))?;
        tracing::debug!(deck_id, collapsed, "Toggled deck collapse");
        Ok(collapsed)
    }

    fn update_deck_flag(&self, deck_id: DeckId, column: &str, value: bool) -> Result<()> {
        let changed = self.conn().execute(
            &format!("UPDATE decks SET {} = ?1 WHERE id = ?2", column),
            params![value, deck_id],
        )?;
        if changed == 0 {
            return Err(Error::DeckNotFound(deck_id));
        }
        Ok(())
    }

    fn ensure_deck(conn: &Connection, deck_id: DeckId) -> Result<()> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM decks WHERE id = ?)",
            [deck_id],
            |r| r.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(Error::DeckNotFound(deck_id))
        }
    }

    // ============================================
    // Card operations
    // ============================================

    /// Insert a card and return its id.
    ///
    /// `due` is an epoch timestamp for learning cards and a day index for
    /// review and day-learning cards; `left` encodes the remaining learning
    /// steps as `reps_today * 1000 + reps_total`.
    pub fn add_card(&self, deck_id: DeckId, queue: Queue, due: i64, left: i64) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO cards (did, queue, due, left) VALUES (?1, ?2, ?3, ?4)",
            params![deck_id, queue.code(), due, left],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // ============================================
    // Catalog
    // ============================================

    /// Load the deck hierarchy with subtree-summed queue counters.
    ///
    /// Decks whose parent no longer exists, or whose parent chain loops back
    /// on itself, are shown at the top level.
    pub fn deck_catalog(&self, cutoff: Timestamp, today: DayIndex) -> Result<Vec<CatalogNode>> {
        let conn = self.conn();
        let decks = Self::load_decks(&conn)?;
        let counts = Self::load_queue_counts(&conn, cutoff, today)?;
        drop(conn);

        let known: std::collections::HashSet<DeckId> = decks.iter().map(|d| d.id).collect();
        let mut by_parent: HashMap<Option<DeckId>, Vec<DeckRecord>> = HashMap::new();
        for deck in decks {
            let parent = match deck.parent_id {
                Some(parent) if known.contains(&parent) => Some(parent),
                Some(parent) => {
                    tracing::warn!(deck_id = deck.id, parent, "Deck has missing parent");
                    None
                }
                None => None,
            };
            by_parent.entry(parent).or_default().push(deck);
        }

        let mut roots = Self::catalog_level(None, 1, &mut by_parent, &counts);

        // Decks in a parent cycle are never reached from the top level.
        while let Some(deck) = Self::take_unreached(&mut by_parent) {
            tracing::warn!(
                deck_id = deck.id,
                parent = ?deck.parent_id,
                "Deck is part of a parent cycle"
            );
            roots.push(Self::catalog_node(deck, 1, &mut by_parent, &counts));
        }

        Ok(roots)
    }

    /// Remove the lowest-id deck still waiting for its parent.
    fn take_unreached(
        by_parent: &mut HashMap<Option<DeckId>, Vec<DeckRecord>>,
    ) -> Option<DeckRecord> {
        let (key, index) = by_parent
            .iter()
            .flat_map(|(key, decks)| {
                decks
                    .iter()
                    .enumerate()
                    .map(move |(index, deck)| (deck.id, *key, index))
            })
            .min_by_key(|(id, _, _)| *id)
            .map(|(_, key, index)| (key, index))?;

        let bucket = by_parent.get_mut(&key)?;
        let deck = bucket.remove(index);
        if bucket.is_empty() {
            by_parent.remove(&key);
        }
        Some(deck)
    }

    fn catalog_level(
        parent: Option<DeckId>,
        level: u32,
        by_parent: &mut HashMap<Option<DeckId>, Vec<DeckRecord>>,
        counts: &HashMap<DeckId, QueueCounts>,
    ) -> Vec<CatalogNode> {
        let siblings = by_parent.remove(&parent).unwrap_or_default();
        siblings
            .into_iter()
            .map(|deck| Self::catalog_node(deck, level, by_parent, counts))
            .collect()
    }

    fn catalog_node(
        deck: DeckRecord,
        level: u32,
        by_parent: &mut HashMap<Option<DeckId>, Vec<DeckRecord>>,
        counts: &HashMap<DeckId, QueueCounts>,
    ) -> CatalogNode {
        let children = Self::catalog_level(Some(deck.id), level + 1, by_parent, counts);
        let own = counts.get(&deck.id).copied().unwrap_or_default();
        CatalogNode {
            new_cards: own.new_cards + children.iter().map(|c| c.new_cards).sum::<i64>(),
            due_rev_cards: own.due_rev_cards
                + children.iter().map(|c| c.due_rev_cards).sum::<i64>(),
            due_lrn_reps: own.due_lrn_reps + children.iter().map(|c| c.due_lrn_reps).sum::<i64>(),
            deck_id: deck.id,
            name: deck.name,
            level,
            collapsed: deck.collapsed,
            filtered: deck.filtered,
            children,
        }
    }

    fn load_decks(conn: &Connection) -> Result<Vec<DeckRecord>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, parent_id, collapsed, filtered FROM decks ORDER BY position, name, id",
        )?;
        let decks = stmt
            .query_map([], |row| {
                Ok(DeckRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    parent_id: row.get(2)?,
                    collapsed: row.get(3)?,
                    filtered: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(decks)
    }

    fn load_queue_counts(
        conn: &Connection,
        cutoff: Timestamp,
        today: DayIndex,
    ) -> Result<HashMap<DeckId, QueueCounts>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT
                did,
                SUM(CASE WHEN queue = 0 THEN 1 ELSE 0 END),
                SUM(CASE WHEN queue = 2 AND due <= :today THEN 1 ELSE 0 END),
                SUM(CASE
                        WHEN queue = 1 AND due <= :cutoff THEN left / 1000
                        WHEN queue = 3 AND due <= :today THEN 1
                        ELSE 0
                    END)
            FROM cards
            GROUP BY did
            "#,
        )?;
        let counts = stmt
            .query_map(named_params! { ":cutoff": cutoff, ":today": today }, |row| {
                Ok((
                    row.get::<_, DeckId>(0)?,
                    QueueCounts {
                        new_cards: row.get(1)?,
                        due_rev_cards: row.get(2)?,
                        due_lrn_reps: row.get(3)?,
                    },
                ))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(counts)
    }

    fn learning_stats(
        conn: &Connection,
        deck_id: DeckId,
        cutoff: Timestamp,
        today: DayIndex,
    ) -> rusqlite::Result<RawLearningStats> {
        conn.query_row(
            r#"
            SELECT
                SUM(CASE WHEN queue = 1 THEN left / 1000 ELSE 0 END),
                SUM(CASE WHEN queue = 1 THEN 1 ELSE 0 END),
                SUM(CASE WHEN queue = 1 AND due <= :cutoff THEN 1 ELSE 0 END),
                SUM(CASE WHEN queue = 3 AND due <= :today THEN 1 ELSE 0 END),
                SUM(CASE WHEN queue = -2 THEN 1 ELSE 0 END),
                MIN(CASE WHEN queue = 1 THEN due ELSE NULL END)
            FROM cards
            WHERE did = :did
            "#,
            named_params! { ":cutoff": cutoff, ":today": today, ":did": deck_id },
            |row| {
                Ok(RawLearningStats {
                    lrn_reps: row.get(0)?,
                    lrn_cards: row.get(1)?,
                    due_lrn_cards: row.get(2)?,
                    lrn_day_cards: row.get(3)?,
                    buried_cards: row.get(4)?,
                    lrn_soonest: row.get(5)?,
                })
            },
        )
    }
}

impl StatsProvider for Database {
    fn stats_for(
        &self,
        deck_id: DeckId,
        cutoff: Timestamp,
        today: DayIndex,
    ) -> Result<RawLearningStats> {
        Self::learning_stats(&self.conn(), deck_id, cutoff, today).map_err(|e| Error::Provider {
            deck_id,
            message: e.to_string(),
        })
    }
}
