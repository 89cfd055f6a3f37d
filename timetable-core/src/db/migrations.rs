//! Database migrations for Timetable Admin.
//!
//! Applied migrations are recorded by name in the `migrations` table.

use std::collections::HashSet;

use rusqlite::Connection;

/// SQL for the initial schema migration.
const MIGRATION_001_INITIAL: &str = r#"
-- Settings table (key-value store for client preferences)
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (unixepoch())
);
"#;

/// SQL for the persisted client state (credential slot, stored user).
const MIGRATION_002_CLIENT_STATE: &str = r#"
CREATE TABLE IF NOT EXISTS client_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (unixepoch())
);
"#;

/// All migrations in order. Each is (name, sql).
const MIGRATIONS: &[(&str, &str)] = &[
    ("001_initial", MIGRATION_001_INITIAL),
    ("002_client_state", MIGRATION_002_CLIENT_STATE),
];

/// Apply every migration not yet recorded, each in its own transaction.
pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL DEFAULT (unixepoch())
        );",
    )?;

    let applied: HashSet<String> = {
        let mut stmt = conn.prepare("SELECT name FROM migrations")?;
        let names = stmt.query_map([], |row| row.get(0))?;
        names.collect::<Result<_, _>>()?
    };

    for (name, sql) in MIGRATIONS.iter().filter(|(name, _)| !applied.contains(*name)) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO migrations (name) VALUES (?1)", [name])?;
        tx.commit()?;
        tracing::info!(migration = %name, "Applied migration");
    }

    Ok(())
}
