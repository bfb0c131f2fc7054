//! Persistent auth store: the only state that survives page loads.
//!
//! Records are read and written whole. Writes are last-write-wins; there is
//! no merging between concurrent credential syncs.

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

pub const KEY_TOKEN: &str = "token";
pub const KEY_UUID: &str = "uuid";
pub const KEY_API_BASE: &str = "apiBase";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Logged-in identity used to authorize imports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRecord {
    pub token: Option<String>,
    pub uuid: Option<String>,
    #[serde(rename = "apiBase")]
    pub api_base: Option<String>,
}

/// Borrowed token/uuid pair, only available when both are present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    pub token: &'a str,
    pub uuid: &'a str,
}

impl AuthRecord {
    /// Token and uuid together, or nothing. Empty strings count as absent.
    pub fn credentials(&self) -> Option<Credentials<'_>> {
        let token = self.token.as_deref().filter(|t| !t.is_empty())?;
        let uuid = self.uuid.as_deref().filter(|u| !u.is_empty())?;
        Some(Credentials { token, uuid })
    }

    pub fn api_base_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.api_base
            .as_deref()
            .filter(|base| !base.trim().is_empty())
            .unwrap_or(fallback)
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.uuid.is_none() && self.api_base.is_none()
    }
}

/// Injected key-value store backing [`AuthRecord`]
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Read the whole record. An empty store yields the default record.
    async fn load(&self) -> Result<AuthRecord, StoreError>;

    /// Overwrite the whole record
    async fn replace(&self, record: AuthRecord) -> Result<(), StoreError>;

    async fn clear(&self) -> Result<(), StoreError> {
        self.replace(AuthRecord::default()).await
    }
}

/// SQLite-backed store, one row per key
pub struct SqliteAuthStore {
    conn: Mutex<Connection>,
}

impl SqliteAuthStore {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS auth_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl AuthStore for SqliteAuthStore {
    async fn load(&self) -> Result<AuthRecord, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT key, value FROM auth_state")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut record = AuthRecord::default();
        for row in rows {
            let (key, value) = row?;
            match key.as_str() {
                KEY_TOKEN => record.token = Some(value),
                KEY_UUID => record.uuid = Some(value),
                KEY_API_BASE => record.api_base = Some(value),
                other => debug!("Ignoring unknown auth key: {}", other),
            }
        }
        Ok(record)
    }

    async fn replace(&self, record: AuthRecord) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM auth_state", [])?;
        for (key, value) in [
            (KEY_TOKEN, &record.token),
            (KEY_UUID, &record.uuid),
            (KEY_API_BASE, &record.api_base),
        ] {
            if let Some(value) = value {
                tx.execute(
                    "INSERT INTO auth_state (key, value) VALUES (?1, ?2)",
                    params![key, value],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// Process-local store for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryAuthStore {
    record: RwLock<AuthRecord>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: AuthRecord) -> Self {
        Self {
            record: RwLock::new(record),
        }
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn load(&self) -> Result<AuthRecord, StoreError> {
        Ok(self.record.read().await.clone())
    }

    async fn replace(&self, record: AuthRecord) -> Result<(), StoreError> {
        *self.record.write().await = record;
        Ok(())
    }
}
