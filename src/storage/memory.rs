use super::StorageProvider;
use crate::error::StorageError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Process-local store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.entries.write().await.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.read().await.contains_key(key))
    }
}
