//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: collection, decks and cards
    r#"
    CREATE TABLE IF NOT EXISTS col (
        id               INTEGER PRIMARY KEY CHECK (id = 1),
        -- Collection creation time (epoch seconds); day 0 of the scheduler
        crt              INTEGER NOT NULL
    );

    INSERT OR IGNORE INTO col (id, crt) VALUES (1, CAST(strftime('%s', 'now') AS INTEGER));

    CREATE TABLE IF NOT EXISTS decks (
        id               INTEGER PRIMARY KEY,
        name             TEXT NOT NULL,
        parent_id        INTEGER REFERENCES decks(id),
        position         INTEGER NOT NULL DEFAULT 0,
        collapsed        INTEGER NOT NULL DEFAULT 0,
        filtered         INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS cards (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        did              INTEGER NOT NULL REFERENCES decks(id),
        -- 0 new, 1 learning, 2 review, 3 day learning, -1 suspended, -2 buried
        queue            INTEGER NOT NULL,
        -- Epoch seconds for queue 1, day index for queues 2 and 3
        due              INTEGER NOT NULL,
        -- Learning steps left: reps today * 1000 + reps total
        left             INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_cards_did_queue ON cards(did, queue);
    "#,
    // Version 2: collection settings and deck ordering
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key              TEXT PRIMARY KEY,
        value            TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_decks_parent ON decks(parent_id, position);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version = get_schema_version(conn).unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        let col_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM col", [], |r| r.get(0))
            .unwrap();
        assert_eq!(col_rows, 1);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in ["col", "decks", "cards", "settings"] {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let fk_targets: Vec<String> = conn
            .prepare("PRAGMA foreign_key_list(cards)")
            .unwrap()
            .query_map([], |row| row.get::<_, String>(2))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(
            fk_targets.iter().any(|table| table == "decks"),
            "cards should reference decks"
        );
    }
}
