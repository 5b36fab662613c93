//! Durable key-value store on a single SQLite table.
//!
//! rusqlite is blocking, so every call hops onto the blocking pool with
//! `spawn_blocking`, the same way PDF work is kept off the async workers.
//! Each operation runs in its own transaction.

use super::StorageProvider;
use crate::error::StorageError;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)";

/// SQLite-backed [`StorageProvider`].
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage").finish_non_exhaustive()
    }
}

impl SqliteStorage {
    /// Open (or create) the database file, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::backend("open", e))?;
            }
        }
        let conn = Connection::open(path).map_err(|e| StorageError::backend("open", e))?;
        debug!("Opened SQLite store at {}", path.display());
        Self::with_connection(conn)
    }

    /// A private in-memory database, discarded on drop.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::backend("open", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(SCHEMA, []).map_err(|e| StorageError::backend("open", e))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StorageError::backend(operation, "connection lock poisoned"))?;
            f(&mut guard).map_err(|e| StorageError::backend(operation, e))
        })
        .await
        .map_err(|e| StorageError::backend(operation, format!("storage task panicked: {e}")))?
    }
}

#[async_trait]
impl StorageProvider for SqliteStorage {
    async fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let text = serde_json::to_string(value).map_err(|e| StorageError::Encoding {
            key: key.to_string(),
            detail: e.to_string(),
        })?;
        let key = key.to_string();
        self.run("save", move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, text],
            )?;
            tx.commit()
        })
        .await
    }

    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let owned = key.to_string();
        let text = self
            .run("load", move |conn| {
                let tx = conn.transaction()?;
                let text = tx
                    .query_row("SELECT value FROM kv WHERE key = ?1", params![owned], |row| {
                        row.get::<_, String>(0)
                    })
                    .optional()?;
                tx.commit()?;
                Ok(text)
            })
            .await?;

        text.map(|t| {
            serde_json::from_str(&t).map_err(|e| StorageError::Encoding {
                key: key.to_string(),
                detail: e.to_string(),
            })
        })
        .transpose()
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let key = key.to_string();
        self.run("delete", move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            tx.commit()
        })
        .await
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        self.run("list", |conn| {
            let tx = conn.transaction()?;
            let keys = {
                let mut stmt = tx.prepare("SELECT key FROM kv ORDER BY key")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                rows.collect::<rusqlite::Result<Vec<String>>>()?
            };
            tx.commit()?;
            Ok(keys)
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let key = key.to_string();
        self.run("exists", move |conn| {
            let tx = conn.transaction()?;
            let found = tx
                .query_row("SELECT 1 FROM kv WHERE key = ?1", params![key], |_| Ok(()))
                .optional()?
                .is_some();
            tx.commit()?;
            Ok(found)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn crud_in_memory() {
        let store = SqliteStorage::open_in_memory().unwrap();
        store.save("paper:1", &json!({"title": "A"})).await.unwrap();
        store.save("geo:mit", &json!([42.36, -71.09])).await.unwrap();

        assert_eq!(store.load("paper:1").await.unwrap(), Some(json!({"title": "A"})));
        assert_eq!(store.load("nope").await.unwrap(), None);
        assert_eq!(store.list().await.unwrap(), vec!["geo:mit", "paper:1"]);
        assert!(store.exists("geo:mit").await.unwrap());

        store.delete("geo:mit").await.unwrap();
        assert!(!store.exists("geo:mit").await.unwrap());
    }

    #[tokio::test]
    async fn upsert_replaces_value() {
        let store = SqliteStorage::open_in_memory().unwrap();
        store.save("k", &json!(1)).await.unwrap();
        store.save("k", &json!({"v": 2})).await.unwrap();
        assert_eq!(store.load("k").await.unwrap(), Some(json!({"v": 2})));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("papermap.db");

        {
            let store = SqliteStorage::open(&path).unwrap();
            store.save("paper:x", &json!({"title": "Persisted"})).await.unwrap();
        }

        let reopened = SqliteStorage::open(&path).unwrap();
        assert_eq!(
            reopened.load("paper:x").await.unwrap(),
            Some(json!({"title": "Persisted"}))
        );
    }

    #[tokio::test]
    async fn corrupt_row_is_an_encoding_error() {
        let store = SqliteStorage::open_in_memory().unwrap();
        store
            .run("seed", |conn| {
                conn.execute("INSERT INTO kv (key, value) VALUES ('bad', '{not json')", [])
                    .map(|_| ())
            })
            .await
            .unwrap();

        let err = store.load("bad").await.unwrap_err();
        assert!(matches!(err, StorageError::Encoding { .. }), "got {err:?}");
    }
}
