//! Two-tier read-through cache for geocoding results.
//!
//! Lookup order: memory map → persistent store (`geo:<normalised address>`).
//! A persistent hit is promoted into memory. Writes go to both tiers.
//!
//! Persistent-tier failures are logged and swallowed: a broken store turns
//! every lookup into a miss and the caller falls through to a live provider.
//! Neither tier evicts.

use crate::model::GeoPoint;
use crate::storage::StorageProvider;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Key namespace for cached coordinates.
pub const GEO_KEY_PREFIX: &str = "geo:";

/// Cache key for an address: trimmed and lower-cased.
///
/// `" University of Tokyo "` and `"UNIVERSITY OF TOKYO"` share one entry;
/// punctuation variants do not.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

pub struct GeoCache {
    memory: RwLock<HashMap<String, GeoPoint>>,
    storage: Arc<dyn StorageProvider>,
}

impl GeoCache {
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            storage,
        }
    }

    pub async fn get(&self, address: &str) -> Option<GeoPoint> {
        let normalized = normalize_address(address);

        if let Some(point) = self.memory_get(&normalized) {
            return Some(point);
        }

        let key = format!("{GEO_KEY_PREFIX}{normalized}");
        let value = match self.storage.load(&key).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!("GeoCache load failed for '{}': {}", normalized, e);
                return None;
            }
        };

        match serde_json::from_value::<GeoPoint>(value) {
            Ok(point) => {
                debug!("GeoCache: persistent hit for '{}'", normalized);
                self.memory_put(normalized, point);
                Some(point)
            }
            Err(e) => {
                warn!("GeoCache entry '{}' is unreadable: {}", key, e);
                None
            }
        }
    }

    pub async fn set(&self, address: &str, point: GeoPoint) {
        let normalized = normalize_address(address);
        self.memory_put(normalized.clone(), point);

        let key = format!("{GEO_KEY_PREFIX}{normalized}");
        let value = serde_json::json!(point.to_array());
        if let Err(e) = self.storage.save(&key, &value).await {
            warn!("GeoCache save failed for '{}': {}", normalized, e);
        }
    }

    /// Drop the volatile tier. Persistent entries are kept.
    pub fn clear_memory(&self) {
        self.memory.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn memory_len(&self) -> usize {
        self.memory.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn memory_get(&self, normalized: &str) -> Option<GeoPoint> {
        self.memory
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(normalized)
            .copied()
    }

    fn memory_put(&self, normalized: String, point: GeoPoint) {
        self.memory
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(normalized, point);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct BrokenStorage;

    #[async_trait]
    impl StorageProvider for BrokenStorage {
        async fn save(&self, _: &str, _: &Value) -> Result<(), StorageError> {
            Err(StorageError::backend("save", "quota exceeded"))
        }
        async fn load(&self, _: &str) -> Result<Option<Value>, StorageError> {
            Err(StorageError::backend("load", "transaction aborted"))
        }
        async fn delete(&self, _: &str) -> Result<(), StorageError> {
            Err(StorageError::backend("delete", "nope"))
        }
        async fn list(&self) -> Result<Vec<String>, StorageError> {
            Err(StorageError::backend("list", "nope"))
        }
        async fn exists(&self, _: &str) -> Result<bool, StorageError> {
            Err(StorageError::backend("exists", "nope"))
        }
    }

    fn tokyo() -> GeoPoint {
        GeoPoint::new(35.0, 139.0).unwrap()
    }

    #[test]
    fn normalisation_trims_and_lowercases() {
        assert_eq!(normalize_address("  University of TOKYO \n"), "university of tokyo");
    }

    #[tokio::test]
    async fn case_and_whitespace_variants_share_an_entry() {
        let cache = GeoCache::new(Arc::new(MemoryStorage::new()));
        cache.set("University of Tokyo", tokyo()).await;

        assert_eq!(cache.get("University of Tokyo").await, Some(tokyo()));
        assert_eq!(cache.get("UNIVERSITY OF TOKYO").await, Some(tokyo()));
        assert_eq!(cache.get("  university of tokyo ").await, Some(tokyo()));
        assert_eq!(cache.memory_len(), 1);
    }

    #[tokio::test]
    async fn writes_through_to_persistent_tier() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = GeoCache::new(storage.clone());
        cache.set("MIT", GeoPoint::new(42.36, -71.09).unwrap()).await;

        assert_eq!(storage.load("geo:mit").await.unwrap(), Some(json!([42.36, -71.09])));
    }

    #[tokio::test]
    async fn persistent_hit_is_promoted_to_memory() {
        let storage = Arc::new(MemoryStorage::new());
        storage.save("geo:university of tokyo", &json!([35.0, 139.0])).await.unwrap();

        let cache = GeoCache::new(storage.clone());
        assert_eq!(cache.memory_len(), 0);
        assert_eq!(cache.get("University of Tokyo").await, Some(tokyo()));
        assert_eq!(cache.memory_len(), 1);

        storage.delete("geo:university of tokyo").await.unwrap();
        assert_eq!(cache.get("university of tokyo").await, Some(tokyo()));
    }

    #[tokio::test]
    async fn clear_memory_keeps_persistent_entries() {
        let cache = GeoCache::new(Arc::new(MemoryStorage::new()));
        cache.set("ETH Zurich", GeoPoint::new(47.37, 8.55).unwrap()).await;
        cache.clear_memory();
        assert_eq!(cache.memory_len(), 0);
        assert!(cache.get("eth zurich").await.is_some());
    }

    #[tokio::test]
    async fn broken_store_degrades_to_memory_only() {
        let cache = GeoCache::new(Arc::new(BrokenStorage));
        assert_eq!(cache.get("Nowhere").await, None);

        cache.set("Somewhere", tokyo()).await;
        assert_eq!(cache.get("somewhere").await, Some(tokyo()));
    }

    #[tokio::test]
    async fn unreadable_entry_is_a_miss() {
        let storage = Arc::new(MemoryStorage::new());
        storage.save("geo:atlantis", &json!([500.0, 0.0])).await.unwrap();
        let cache = GeoCache::new(storage);
        assert_eq!(cache.get("Atlantis").await, None);
    }
}
