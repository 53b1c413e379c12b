//! Persistent speed test history
//!
//! The history list is kept as one JSON document under a single key, either
//! in a SQLite key/value table or in a plain JSON file.

use crate::config::{GeneralConfig, HistoryBackend};
use engine::constants::HISTORY_KEY;
use engine::{History, HistoryStore, SpeedResult};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Malformed history data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", "5000")?;

        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, StorageError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn initialize(&self) -> Result<(), StorageError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }
}

impl HistoryStore for Database {
    type Error = StorageError;

    fn load(&self) -> Result<Vec<SpeedResult>, StorageError> {
        match self.get(HISTORY_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&mut self, entries: &[SpeedResult]) -> Result<(), StorageError> {
        let json = serde_json::to_string(entries)?;
        self.put(HISTORY_KEY, &json)
    }
}

/// History kept in a standalone JSON file
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl HistoryStore for JsonFileStore {
    type Error = StorageError;

    fn load(&self) -> Result<Vec<SpeedResult>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&mut self, entries: &[SpeedResult]) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Whichever backend the configuration selects
pub enum Store {
    Sqlite(Database),
    Json(JsonFileStore),
}

impl HistoryStore for Store {
    type Error = StorageError;

    fn load(&self) -> Result<Vec<SpeedResult>, StorageError> {
        match self {
            Store::Sqlite(db) => db.load(),
            Store::Json(file) => file.load(),
        }
    }

    fn save(&mut self, entries: &[SpeedResult]) -> Result<(), StorageError> {
        match self {
            Store::Sqlite(db) => db.save(entries),
            Store::Json(file) => file.save(entries),
        }
    }
}

/// Open the configured backend and read the stored history once.
///
/// Failing to open the backend is an error; unreadable contents start an
/// empty history.
pub fn open_history(config: &GeneralConfig) -> Result<History<Store>, StorageError> {
    let store = match config.history_backend {
        HistoryBackend::Sqlite => {
            let db = Database::new(&config.database_path)?;
            db.initialize()?;
            info!("History database: {}", config.database_path);
            Store::Sqlite(db)
        }
        HistoryBackend::Json => {
            info!("History file: {}", config.history_path);
            Store::Json(JsonFileStore::new(&config.history_path))
        }
    };

    Ok(History::open_or_empty(store))
}
