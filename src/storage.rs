use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{Arc, Mutex},
};

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use thiserror::Error;

use crate::filter::Preferences;
use crate::utils;

pub const PREFS_KEY: &str = "krawl_prefs";
pub const BOOKMARKS_KEY: &str = "krawl_bookmarks";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// String key/value persistence, the shape of a browser's local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("memory store mutex poisoned".to_string()))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("memory store mutex poisoned".to_string()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("memory store mutex poisoned".to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open_default() -> Result<Self, StorageError> {
        Self::open(&utils::database_path())
    }

    pub fn open(path: &Path) -> Result<Self, StorageError> {
        utils::ensure_parent(path);
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv(
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::Backend("sqlite mutex poisoned".to_string()))?;
        Ok(f(&conn)?)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map(|_| ())
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
                .map(|_| ())
        })
    }
}

/// JSON blob adapter over a [`KeyValueStore`]. Failures are logged, never raised.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn KeyValueStore>,
}

impl Storage {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn save_prefs(&self, prefs: &Preferences) {
        if let Err(err) = self.write_json(PREFS_KEY, prefs) {
            tracing::warn!("could not save preferences: {err}");
        }
    }

    /// Raw preferences blob; the filter engine validates it field by field.
    pub fn load_prefs(&self) -> Option<Value> {
        match self.read_json(PREFS_KEY) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("could not load preferences: {err}");
                None
            }
        }
    }

    /// Writes the set as a sorted JSON array.
    pub fn save_bookmarks(&self, bookmarks: &HashSet<String>) {
        let mut ids: Vec<&String> = bookmarks.iter().collect();
        ids.sort();
        if let Err(err) = self.write_json(BOOKMARKS_KEY, &ids) {
            tracing::warn!("could not save bookmarks: {err}");
        }
    }

    /// Bookmarked identifiers, deduplicated. Non-string entries are dropped.
    pub fn load_bookmarks(&self) -> HashSet<String> {
        match self.read_json(BOOKMARKS_KEY) {
            Ok(Some(Value::Array(items))) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Ok(Some(other)) => {
                tracing::warn!("ignoring malformed bookmarks: {other}");
                HashSet::new()
            }
            Ok(None) => HashSet::new(),
            Err(err) => {
                tracing::warn!("could not load bookmarks: {err}");
                HashSet::new()
            }
        }
    }

    pub fn clear(&self) {
        for key in [PREFS_KEY, BOOKMARKS_KEY] {
            if let Err(err) = self.backend.remove(key) {
                tracing::warn!("could not clear {key}: {err}");
            }
        }
    }

    fn write_json<T: serde::Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let payload = serde_json::to_string(value)?;
        self.backend.set(key, &payload)
    }

    fn read_json(&self, key: &str) -> Result<Option<Value>, StorageError> {
        match self.backend.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}
