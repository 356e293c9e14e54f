//! The storage trait consumed by the pipeline.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use eb_core::{Error, Result};

/// Key/value blob storage.
///
/// Implementations must be safe for concurrent use by many in-flight jobs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend description for logs.
    fn name(&self) -> &str;

    /// Download `key` into `dest_dir` and return the local path.
    ///
    /// The file is named after the key's last path segment (see
    /// [`local_file_name`]). `dest_dir` is created if missing.
    async fn fetch(&self, key: &str, dest_dir: &Path) -> Result<PathBuf>;

    /// Read `key` fully into memory.
    async fn buffer(&self, key: &str) -> Result<Bytes>;

    /// Upload the file at `local_path` under `key`.
    async fn put(&self, local_path: &Path, key: &str) -> Result<()>;

    /// Remove `key`.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Local file name for a storage key: its last `/`-separated segment.
pub fn local_file_name(key: &str) -> Result<&str> {
    let name = key.rsplit('/').next().unwrap_or(key);
    if name.is_empty() || name == "." || name == ".." || name.contains('\\') {
        return Err(Error::Validation(format!(
            "storage key {key:?} does not name a file"
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(local_file_name("voice.mp3").unwrap(), "voice.mp3");
        assert_eq!(local_file_name("jobs/42/voice.mp3").unwrap(), "voice.mp3");
    }

    #[test]
    fn rejects_directory_keys() {
        for key in ["", "jobs/", "..", "jobs/..", "a\\b"] {
            assert!(local_file_name(key).is_err(), "{key:?} accepted");
        }
    }
}
