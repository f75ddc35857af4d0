//! SQLite settings store and session event log.
//!
//! Holds per-deployment timeout settings and a log of session lifecycle
//! events (login, warning, expiry, logout).

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqlResult};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

/// Database wrapper with thread-safe connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens or creates the database at the default location.
    ///
    /// Creates `<data dir>/sessionwatch/sessionwatch.db` if it doesn't exist.
    pub fn open() -> SqlResult<Self> {
        let db_path = Self::get_db_path();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        tracing::info!(path = ?db_path, "Opening database");

        let conn = Connection::open(&db_path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> SqlResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Returns the default database path.
    fn get_db_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sessionwatch")
            .join("sessionwatch.db")
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave SQLite half-written.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Initializes the database schema.
    fn init_schema(&self) -> SqlResult<()> {
        let conn = self.conn();

        conn.execute_batch(
            r#"
            -- Configuration settings
            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                description TEXT,
                updated_at TEXT NOT NULL
            );

            -- Session lifecycle events
            CREATE TABLE IF NOT EXISTS session_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                occurred_at TEXT NOT NULL,
                detail TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_session_events_time ON session_events(occurred_at);
            "#,
        )?;

        // Seed default config if empty
        let config_count: i64 = conn.query_row("SELECT COUNT(*) FROM config", [], |r| r.get(0))?;
        if config_count == 0 {
            let now = Utc::now().to_rfc3339();
            let defaults = [
                (
                    "timeout_duration_secs",
                    "1800",
                    "Inactivity budget before the session expires (seconds)",
                ),
                (
                    "warning_before_timeout_secs",
                    "300",
                    "Warning lead time before expiry (seconds)",
                ),
                (
                    "activity_debounce_ms",
                    "1000",
                    "Minimum gap between recorded activity signals (milliseconds)",
                ),
                ("server_port", "13235", "Local HTTP server port"),
            ];

            for (key, value, description) in defaults {
                conn.execute(
                    "INSERT INTO config (key, value, description, updated_at) VALUES (?1, ?2, ?3, ?4)",
                    params![key, value, description, &now],
                )?;
            }

            tracing::info!("Added {} default config settings", defaults.len());
        }

        tracing::debug!("Database schema initialized");
        Ok(())
    }

    // === Config Methods ===

    /// Gets a configuration value by key.
    pub fn get_config(&self, key: &str) -> SqlResult<Option<String>> {
        let conn = self.conn();
        match conn.query_row(
            "SELECT value FROM config WHERE key = ?1",
            params![key],
            |row| row.get(0),
        ) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Sets a configuration value, inserting the key if it is new.
    pub fn set_config(&self, key: &str, value: &str) -> SqlResult<()> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO config (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, &now],
        )?;
        Ok(())
    }

    /// Gets all config settings.
    pub fn get_all_config(&self) -> SqlResult<Vec<(String, String, Option<String>)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key, value, description FROM config ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        rows.collect()
    }

    // === Event Log Methods ===

    /// Appends a session event to the log. Returns the new row id.
    pub fn record_event(
        &self,
        kind: &str,
        occurred_at: DateTime<Utc>,
        detail: Option<&str>,
    ) -> SqlResult<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO session_events (kind, occurred_at, detail) VALUES (?1, ?2, ?3)",
            params![kind, occurred_at.to_rfc3339(), detail],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Gets the most recent session events, newest first.
    pub fn recent_events(&self, limit: usize) -> SqlResult<Vec<EventRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, kind, occurred_at, detail FROM session_events
             ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(EventRecord {
                id: row.get(0)?,
                kind: row.get(1)?,
                occurred_at: row.get(2)?,
                detail: row.get(3)?,
            })
        })?;

        rows.collect()
    }
}

/// Session event row from the database.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EventRecord {
    pub id: i64,
    pub kind: String,
    pub occurred_at: String,
    pub detail: Option<String>,
}
