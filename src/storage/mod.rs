//! Key-value persistence and the paper repository built on it.
//!
//! ```text
//! PaperRepository ──▶ dyn StorageProvider ──▶ SqliteStorage | MemoryStorage
//! GeoCache        ──┘
//! ```
//!
//! Values are JSON documents (`serde_json::Value`). Each call is its own
//! transaction; there is no atomicity across a save followed by a load.

mod memory;
mod repository;
mod sqlite;

pub use memory::MemoryStorage;
pub use repository::{PaperRepository, PAPER_KEY_PREFIX};
pub use sqlite::SqliteStorage;

use crate::error::StorageError;
use async_trait::async_trait;
use serde_json::Value;

/// Asynchronous key-value store.
///
/// Every failure surfaces as [`StorageError`]; implementations never swallow
/// errors themselves.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Insert or replace the value under `key`.
    async fn save(&self, key: &str, value: &Value) -> Result<(), StorageError>;

    /// Load the value under `key`, `None` when absent.
    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Remove `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// All stored keys in ascending order.
    async fn list(&self) -> Result<Vec<String>, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}
