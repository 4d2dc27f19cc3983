//! Filesystem-backed content store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::{is_valid_storage_key, ContentStore};
use crate::error::ContentError;

/// Stores each object as a file named by its key inside `root`.
#[derive(Debug, Clone)]
pub struct LocalContentStore {
    root: PathBuf,
}

impl LocalContentStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ContentError> {
        if !is_valid_storage_key(key) {
            return Err(ContentError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<(), ContentError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ContentError::Io(e.to_string()))?;

        // Write then rename so readers never observe a partial file
        let partial = self.root.join(format!("{}.partial", key));
        tokio::fs::write(&partial, &data)
            .await
            .map_err(|e| ContentError::Io(e.to_string()))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| ContentError::Io(e.to_string()))?;

        debug!(key = key, bytes = data.len(), "Stored content");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ContentError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ContentError::NotFound(key.to_string()))
            }
            Err(e) => Err(ContentError::Io(e.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ContentError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ContentError::Io(e.to_string())),
        }
    }

    fn identifier(&self) -> String {
        format!("file://{}", self.root.display())
    }
}
