//! SQLite-backed key-value store.

use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::chat::core::config::StorageConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::storage::kv::KeyValueStore;

/// `SQLite` implementation of the key-value store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteStore {
    /// Open the database at `config.sqlite_path` and create the table if it doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub fn open(config: &StorageConfig) -> ChatResult<Self> {
        let conn = Connection::open(&config.sqlite_path)?;
        debug!("Opened key-value store at {}", config.sqlite_path.display());
        Self::with_connection(conn, config.table.clone())
    }

    /// Open a private in-memory database.
    #[cfg(test)]
    pub fn in_memory() -> ChatResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, StorageConfig::default().table)
    }

    fn with_connection(conn: Connection, table: String) -> ChatResult<Self> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )"
        ))?;

        Ok(Self {
            conn: Mutex::new(conn),
            table,
        })
    }

    fn lock(&self) -> ChatResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ChatError::StoreUnavailable("sqlite connection lock poisoned".to_string()))
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> ChatResult<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                &format!("SELECT value FROM {} WHERE key = ?1", self.table),
                rusqlite::params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> ChatResult<()> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE
                 SET value = excluded.value, updated_at = excluded.updated_at",
                self.table
            ),
            rusqlite::params![key, value, now_ms],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> ChatResult<()> {
        let conn = self.lock()?;
        conn.execute(
            &format!("DELETE FROM {} WHERE key = ?1", self.table),
            rusqlite::params![key],
        )?;
        Ok(())
    }
}
