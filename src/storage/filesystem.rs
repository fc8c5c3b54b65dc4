//! Directory-backed blob store.
//!
//! Keys map onto relative paths under a root directory. Writes go to a
//! hidden temporary sibling (`.{name}.tmp-{uuid}`) first and are renamed into
//! place, so readers never see a half-written `metadata.json`. Session ids and
//! data file names never start with `.`, so listing skips dot files.

use super::BlobStore;
use crate::core::{RecorderError, Result};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

const TEMP_PREFIX: char = '.';
const TEMP_SUFFIX: &str = ".tmp-";

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(true, |name| name.starts_with(TEMP_PREFIX))
}

/// Blob store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.contains('\\') {
            return Err(RecorderError::storage(format!("Invalid blob key: {:?}", key)));
        }

        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(RecorderError::storage(format!("Invalid blob key: {:?}", key)));
        }

        Ok(self.root.join(relative))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

#[async_trait::async_trait]
impl BlobStore for FsBlobStore {
    async fn store_raw_data(&self, data: Bytes, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                RecorderError::storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| RecorderError::storage(format!("Invalid blob key: {:?}", key)))?;
        let temp_name = format!("{}{}{}{}", TEMP_PREFIX, file_name, TEMP_SUFFIX, uuid::Uuid::new_v4());
        let temp_path = path.with_file_name(temp_name);

        tokio::fs::write(&temp_path, &data).await.map_err(|e| {
            RecorderError::storage(format!("Failed to write {}: {}", temp_path.display(), e))
        })?;

        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(RecorderError::storage(format!(
                "Failed to move blob into place at {}: {}",
                path.display(),
                e
            )));
        }

        tracing::trace!("Stored {} bytes at {}", data.len(), key);
        Ok(())
    }

    async fn retrieve_raw_data(&self, key: &str) -> Result<Bytes> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RecorderError::NotFound(key.to_string())),
            Err(e) => Err(RecorderError::storage(format!("Failed to read {}: {}", key, e))),
        }
    }

    async fn delete_raw_data(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RecorderError::storage(format!("Failed to delete {}: {}", key, e))),
        }
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        // Walk from the deepest directory named by the prefix
        let start = match prefix.rfind('/') {
            Some(idx) => self.path_for(&prefix[..idx])?,
            None => self.root.clone(),
        };

        let mut keys = Vec::new();
        let mut pending = vec![start];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(RecorderError::storage(format!(
                        "Failed to list {}: {}",
                        dir.display(),
                        e
                    )))
                },
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if !is_temp_file(&path) {
                    if let Some(key) = self.key_for(&path).filter(|key| key.starts_with(prefix)) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn health_check(&self) -> bool {
        match tokio::fs::create_dir_all(&self.root).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Blob store root {} is unavailable: {}", self.root.display(), e);
                false
            },
        }
    }
}
