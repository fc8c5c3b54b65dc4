//! In-memory blob store.

use super::BlobStore;
use crate::core::{RecorderError, Result};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Blob store kept entirely in memory. Used by tests and throwaway runs.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl InMemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Total stored bytes across all objects.
    pub fn total_bytes(&self) -> usize {
        self.objects.read().values().map(Bytes::len).sum()
    }
}

#[async_trait::async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn store_raw_data(&self, data: Bytes, key: &str) -> Result<()> {
        self.objects.write().insert(key.to_string(), data);
        Ok(())
    }

    async fn retrieve_raw_data(&self, key: &str) -> Result<Bytes> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| RecorderError::NotFound(key.to_string()))
    }

    async fn delete_raw_data(&self, key: &str) -> Result<()> {
        self.objects.write().remove(key);
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.read();
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prefix_listing_is_sorted_and_bounded() {
        let store = InMemoryBlobStore::new();
        for key in ["sessions/b/metadata.json", "sessions/a/raw/x", "sessions/a/metadata.json", "other/key"] {
            store.store_raw_data(Bytes::from_static(b"x"), key).await.unwrap();
        }

        let keys = store.list_objects("sessions/a/").await.unwrap();
        assert_eq!(keys, vec!["sessions/a/metadata.json", "sessions/a/raw/x"]);
        assert_eq!(store.list_objects("sessions/").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let store = InMemoryBlobStore::new();
        let err = store.retrieve_raw_data("nope").await.unwrap_err();
        assert!(matches!(err, RecorderError::NotFound(_)));

        // Deleting a missing key is fine
        store.delete_raw_data("nope").await.unwrap();
        assert!(store.is_empty());
    }
}
