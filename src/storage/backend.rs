//! Blob store trait.

use crate::core::Result;
use bytes::Bytes;

/// Opaque key/prefix object store. The recorder's only I/O boundary.
///
/// Keys are `/`-separated relative paths such as
/// `sessions/s1/metadata.json`. Implementations must return
/// [`RecorderError::NotFound`](crate::core::RecorderError::NotFound) from
/// [`retrieve_raw_data`](BlobStore::retrieve_raw_data) when a key does not
/// exist so callers can tell a missing session from a broken store.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any previous value.
    async fn store_raw_data(&self, data: Bytes, key: &str) -> Result<()>;

    /// Fetch the bytes stored under `key`.
    async fn retrieve_raw_data(&self, key: &str) -> Result<Bytes>;

    /// Remove `key`. Deleting a missing key is not an error.
    async fn delete_raw_data(&self, key: &str) -> Result<()>;

    /// List every key starting with `prefix`, sorted lexicographically.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;

    /// Check that the store is reachable.
    async fn health_check(&self) -> bool;
}
