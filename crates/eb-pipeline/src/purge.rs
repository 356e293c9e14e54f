//! Post-success removal of source assets from object storage.

use eb_core::{Error, Result};
use eb_storage::ObjectStore;

/// Delete every key in `keys`, attempting all of them.
///
/// Failures are collected into one [`Error::Cleanup`] listing each key that
/// could not be removed.
pub async fn purge_source_assets(store: &dyn ObjectStore, keys: &[&str]) -> Result<()> {
    let mut failed = Vec::new();
    for key in keys {
        match store.delete(key).await {
            Ok(()) => tracing::debug!(key, "Deleted source asset"),
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to delete source asset");
                failed.push(key.to_string());
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(Error::Cleanup { keys: failed })
    }
}
