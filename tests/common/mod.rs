//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds a full [`AppContext`] over a
//! temporary [`LocalStore`], a recording notifier and an optional fake
//! ffmpeg script.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use eb_av::{ToolRegistry, FFMPEG};
use eb_core::config::Config;
use eb_core::{EncodeInfos, EncodeState, EncodingRequest, Error, Result};
use eb_server::context::AppContext;
use eb_server::notifier::ProgressNotifier;
use eb_storage::{LocalStore, ObjectStore};

/// Notifier that keeps every published event.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<EncodeInfos>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<EncodeInfos> {
        self.events.lock().unwrap().clone()
    }

    pub fn terminal(&self) -> Vec<EncodeInfos> {
        self.events().into_iter().filter(EncodeInfos::is_terminal).collect()
    }

    pub fn states(&self) -> Vec<EncodeState> {
        self.events().iter().map(|e| e.state).collect()
    }
}

#[async_trait]
impl ProgressNotifier for RecordingNotifier {
    async fn publish(&self, infos: &EncodeInfos) -> Result<()> {
        self.events.lock().unwrap().push(infos.clone());
        Ok(())
    }
}

/// Which store operations a [`FaultyStore`] refuses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    pub put: bool,
    pub delete: bool,
}

/// A [`LocalStore`] with selected operations failing.
pub struct FaultyStore {
    inner: LocalStore,
    faults: Faults,
}

impl FaultyStore {
    pub fn new(root: &Path, faults: Faults) -> Self {
        Self {
            inner: LocalStore::new(root),
            faults,
        }
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    fn name(&self) -> &str {
        "faulty"
    }

    async fn fetch(&self, key: &str, dest_dir: &Path) -> Result<PathBuf> {
        self.inner.fetch(key, dest_dir).await
    }

    async fn buffer(&self, key: &str) -> Result<Bytes> {
        self.inner.buffer(key).await
    }

    async fn put(&self, local_path: &Path, key: &str) -> Result<()> {
        if self.faults.put {
            return Err(Error::storage("create", key, "bucket is read-only"));
        }
        self.inner.put(local_path, key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.faults.delete {
            return Err(Error::storage("delete", key, "access denied"));
        }
        self.inner.delete(key).await
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub notifier: Arc<RecordingNotifier>,
    pub store_root: TempDir,
    pub work_root: TempDir,
}

impl TestHarness {
    /// Harness whose ffmpeg is `ffmpeg`, or a path that does not exist.
    pub fn new(ffmpeg: Option<PathBuf>) -> Self {
        Self::with_faults(ffmpeg, Faults::default())
    }

    pub fn with_faults(ffmpeg: Option<PathBuf>, faults: Faults) -> Self {
        let store_root = tempfile::tempdir().expect("failed to create store root");
        let work_root = tempfile::tempdir().expect("failed to create work root");

        let mut config = Config::default();
        config.storage.max_retry = 0;
        config.storage.retry_base_secs = 0;
        config.encoder.work_root = Some(work_root.path().to_path_buf());

        let ffmpeg = ffmpeg.unwrap_or_else(|| PathBuf::from("nonexistent_ffmpeg_xyz"));
        let tools = Arc::new(ToolRegistry::with_paths([(FFMPEG, ffmpeg)]));
        let store = Arc::new(FaultyStore::new(store_root.path(), faults));
        let notifier = Arc::new(RecordingNotifier::default());

        let ctx = AppContext::new(
            config,
            store,
            tools,
            notifier.clone(),
            CancellationToken::new(),
        );

        Self {
            ctx,
            notifier,
            store_root,
            work_root,
        }
    }

    /// Place an object in the store.
    pub fn put_asset(&self, key: &str, contents: &[u8]) {
        std::fs::write(self.store_root.path().join(key), contents).expect("failed to write asset");
    }

    pub fn has_asset(&self, key: &str) -> bool {
        self.store_root.path().join(key).exists()
    }

    /// Entries left behind in the work root.
    pub fn leftover_workspaces(&self) -> usize {
        std::fs::read_dir(self.work_root.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// An audio-only request over `audios`.
pub fn audio_request(job_id: &str, audios: &[&str]) -> EncodingRequest {
    EncodingRequest {
        job_id: job_id.into(),
        audios_keys: audios.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

/// Write a `sh` script standing in for ffmpeg. `$last` holds the output path.
///
/// Returns `None` when no shell is available.
#[cfg(unix)]
pub fn fake_ffmpeg(dir: &Path, body: &str) -> Option<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let sh = which::which("sh").ok()?;
    let path = dir.join("fake-ffmpeg");
    let script = format!("#!{}\nfor last; do :; done\n{body}\n", sh.display());
    std::fs::write(&path, script).ok()?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).ok()?;
    Some(path)
}

#[cfg(not(unix))]
pub fn fake_ffmpeg(_dir: &Path, _body: &str) -> Option<PathBuf> {
    None
}

/// Fake ffmpeg that reports one progress line and writes a small output.
pub const SUCCEEDING_FFMPEG: &str =
    "printf 'frame=  5 fps=25 q=28.0 size=  1kB time=00:00:01.00 bitrate=N/A speed=1x\\r' >&2\n\
     echo video > \"$last\"";
