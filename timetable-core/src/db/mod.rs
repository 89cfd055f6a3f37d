//! SQLite database layer for Timetable Admin.
//!
//! Holds the client-side state that a browser would keep in local storage:
//! - Client state (access token, stored user profile)
//! - Settings (base URL, refresh path, timeouts)

mod migrations;

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension};

const APP_DIR: &str = "timetable-admin";
const DB_FILE: &str = "timetable-admin.db";

/// The two key/value tables.
#[derive(Debug, Clone, Copy)]
enum Table {
    ClientState,
    Settings,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Self::ClientState => "client_state",
            Self::Settings => "settings",
        }
    }
}

/// Owns the connection to the application database.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Open `timetable-admin.db` under the platform data directory.
    pub fn open() -> anyhow::Result<Self> {
        Self::open_at(Self::default_path()?)
    }

    /// Open (or create) a database file, creating missing directories.
    ///
    /// The file is restricted to the owner on Unix: it holds the access token.
    pub fn open_at(path: PathBuf) -> anyhow::Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(&path)?;
        restrict_permissions(&path);
        Ok(Self { conn, path })
    }

    /// Migrated database that lives only as long as the value.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        };
        db.migrate()?;
        Ok(db)
    }

    /// `<data dir>/timetable-admin/timetable-admin.db`.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let base = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
            .ok_or_else(|| anyhow::anyhow!("No data directory available for {APP_DIR}"))?;
        Ok(base.join(APP_DIR).join(DB_FILE))
    }

    /// Apply pending migrations. Idempotent.
    pub fn migrate(&self) -> anyhow::Result<()> {
        migrations::run_migrations(&self.conn)
    }

    /// Raw connection, for callers that need their own queries.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// File backing the database, or `:memory:`.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    // =========================================================================
    // Client state
    // =========================================================================

    /// Insert or overwrite a client state entry.
    pub fn set_state(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.upsert(Table::ClientState, key, value)
    }

    /// Client state entry, if set.
    pub fn get_state(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.lookup(Table::ClientState, key)
    }

    /// No-op for a missing key.
    pub fn delete_state(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.remove(Table::ClientState, key)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Insert or overwrite a setting.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.upsert(Table::Settings, key, value)
    }

    /// Setting value, if set.
    pub fn get_setting(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.lookup(Table::Settings, key)
    }

    /// No-op for a missing key.
    pub fn delete_setting(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.remove(Table::Settings, key)
    }

    fn upsert(&self, table: Table, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        let sql = format!(
            "INSERT INTO {} (key, value, updated_at) VALUES (?1, ?2, unixepoch())
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            table.name()
        );
        self.conn.execute(&sql, [key, value])?;
        Ok(())
    }

    fn lookup(&self, table: Table, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let sql = format!("SELECT value FROM {} WHERE key = ?1", table.name());
        self.conn
            .query_row(&sql, [key], |row| row.get(0))
            .optional()
    }

    fn remove(&self, table: Table, key: &str) -> Result<(), rusqlite::Error> {
        let sql = format!("DELETE FROM {} WHERE key = ?1", table.name());
        self.conn.execute(&sql, [key])?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        tracing::warn!(path = %path.display(), error = %e, "Could not restrict database permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
