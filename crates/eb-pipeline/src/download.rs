//! Concurrent asset download with retries.
//!
//! One task per asset is spawned into a [`JoinSet`]. The batch succeeds when
//! every task has resolved its asset, and fails on the first task error. On
//! failure the remaining tasks are cancelled and joined before returning, so
//! no download outlives the call.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use eb_core::config::StorageConfig;
use eb_core::{Error, Result};
use eb_storage::ObjectStore;

use crate::asset::AssetCollection;

/// Retry schedule for a single asset.
///
/// An asset gets at most `max_retry + 1` attempts. Failed attempt `n` is
/// followed by a wait of `base * 2^n` only when another attempt remains, so
/// an asset that never succeeds waits `base * (2^max_retry - 1)` in total
/// before its error is reported. No wait follows the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retry: u32,
    /// Wait after the first failed attempt; doubles each retry.
    pub base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry: 10,
            base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(storage: &StorageConfig) -> Self {
        Self {
            max_retry: storage.max_retry,
            base: Duration::from_secs(storage.retry_base_secs),
        }
    }

    /// Wait after failed attempt `attempt` (0-based): `base * 2^attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Download every asset in `assets` into its own directory under `dest_root`.
///
/// Asset `i` lands in `dest_root/i/`, so two assets sharing a key never
/// collide. On success every asset has a path. On failure the error names
/// the first asset that exhausted its retries; assets that finished before
/// the failure keep their paths so cleanup can remove them.
pub async fn download_assets(
    assets: &mut AssetCollection,
    store: Arc<dyn ObjectStore>,
    dest_root: &Path,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<()> {
    let token = cancel.child_token();
    let mut tasks = JoinSet::new();

    for (index, asset) in assets.iter().enumerate() {
        let store = Arc::clone(&store);
        let key = asset.key.clone();
        let dir = dest_root.join(index.to_string());
        let token = token.clone();
        tasks.spawn(async move {
            let result = fetch_with_retry(store.as_ref(), &key, &dir, policy, &token).await;
            (index, key, result)
        });
    }

    let mut failure: Option<Error> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, _, Ok(path))) => {
                if let Some(asset) = assets.get_mut(index) {
                    asset.path = Some(path);
                }
            }
            Ok((_, key, Err(e))) => {
                failure = Some(match e {
                    Error::Cancelled => Error::Cancelled,
                    other => Error::download(key, other.to_string()),
                });
                break;
            }
            Err(e) => {
                failure = Some(Error::Internal(format!("download task failed: {e}")));
                break;
            }
        }
    }

    let Some(err) = failure else {
        tracing::info!(count = assets.len(), "All assets downloaded");
        return Ok(());
    };

    token.cancel();
    tasks.abort_all();
    while let Some(joined) = tasks.join_next().await {
        if let Ok((index, _, Ok(path))) = joined {
            if let Some(asset) = assets.get_mut(index) {
                asset.path = Some(path);
            }
        }
    }
    tracing::warn!(error = %err, "Asset download aborted");
    Err(err)
}

async fn fetch_with_retry(
    store: &dyn ObjectStore,
    key: &str,
    dir: &Path,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let mut attempt = 0;
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = store.fetch(key, dir) => result,
        };

        let err = match result {
            Ok(path) => {
                tracing::debug!(key, attempt, path = %path.display(), "Asset downloaded");
                return Ok(path);
            }
            Err(e) if attempt >= policy.max_retry => return Err(e),
            Err(e) => e,
        };

        let delay = policy.delay(attempt);
        tracing::warn!(
            key,
            attempt,
            retry_in = ?delay,
            error = %err,
            "Asset download failed; retrying"
        );
        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
