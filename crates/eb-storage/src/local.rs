//! Directory-backed object store.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use eb_core::{Error, Result};

use crate::store::{local_file_name, ObjectStore};

/// Stores every key as a file under `root`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path under the root, refusing keys that escape it.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return Err(Error::Validation(format!(
                "storage key {key:?} is not a relative path"
            )));
        }
        Ok(self.root.join(relative))
    }
}

fn storage_err(operation: &str, key: &str, e: std::io::Error) -> Error {
    Error::storage(operation, key, e.to_string())
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn fetch(&self, key: &str, dest_dir: &Path) -> Result<PathBuf> {
        let source = self.resolve(key)?;
        let dest = dest_dir.join(local_file_name(key)?);
        tokio::fs::create_dir_all(dest_dir).await?;
        tokio::fs::copy(&source, &dest)
            .await
            .map_err(|e| storage_err("get", key, e))?;
        tracing::debug!(key, path = %dest.display(), "Fetched from local store");
        Ok(dest)
    }

    async fn buffer(&self, key: &str) -> Result<Bytes> {
        let source = self.resolve(key)?;
        let data = tokio::fs::read(&source)
            .await
            .map_err(|e| storage_err("get", key, e))?;
        Ok(Bytes::from(data))
    }

    async fn put(&self, local_path: &Path, key: &str) -> Result<()> {
        let dest = self.resolve(key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &dest)
            .await
            .map_err(|e| storage_err("create", key, e))?;
        tracing::debug!(key, path = %dest.display(), "Stored in local store");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let target = self.resolve(key)?;
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| storage_err("delete", key, e))
    }
}
