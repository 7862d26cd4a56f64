use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to open storage backend: {0}")]
    Open(String),
    #[error("failed to read slot '{slot}': {reason}")]
    Read { slot: String, reason: String },
    #[error("failed to write slot '{slot}': {reason}")]
    Write { slot: String, reason: String },
}

/// Durable key-value namespace. One slot per logical collection; callers
/// serialize whole-collection snapshots into each slot.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn has(&self, key: &str) -> Result<bool, StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = Connection::open(path).map_err(|e| StorageError::Open(e.to_string()))?;
        Self::with_connection(db)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let db = Connection::open_in_memory().map_err(|e| StorageError::Open(e.to_string()))?;
        Self::with_connection(db)
    }

    fn with_connection(db: Connection) -> Result<Self, StorageError> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS kv_slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| StorageError::Open(e.to_string()))?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let db = self.db.lock().await;
        let mut stmt = db
            .prepare("SELECT value FROM kv_slots WHERE key = ?1")
            .map_err(|e| StorageError::Read {
                slot: key.to_string(),
                reason: e.to_string(),
            })?;
        let mut rows = stmt.query([key]).map_err(|e| StorageError::Read {
            slot: key.to_string(),
            reason: e.to_string(),
        })?;
        match rows.next().map_err(|e| StorageError::Read {
            slot: key.to_string(),
            reason: e.to_string(),
        })? {
            Some(row) => {
                let value: String = row.get(0).map_err(|e| StorageError::Read {
                    slot: key.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO kv_slots (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            (key, value),
        )
        .map_err(|e| StorageError::Write {
            slot: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let db = self.db.lock().await;
        db.execute("DELETE FROM kv_slots WHERE key = ?1", [key])
            .map_err(|e| StorageError::Write {
                slot: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

/// In-memory backend for tests and ephemeral sessions. The write-failure
/// switch lets tests exercise the degraded path where persistence is down
/// but in-memory state stays authoritative.
#[derive(Default)]
pub struct MemStore {
    slots: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KvStore for MemStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write {
                slot: key.to_string(),
                reason: "write failure injected".to_string(),
            });
        }
        self.slots
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.slots.lock().await.contains_key(key))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.slots.lock().await.remove(key);
        Ok(())
    }
}
