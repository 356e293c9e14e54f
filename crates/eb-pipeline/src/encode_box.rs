//! Request orchestrator.
//!
//! ```text
//! Created -> Downloading -> Encoding -> CleaningUp -> Done
//!    |            |             |                  \-> Failed
//!    \------------+-------------+--> (CleaningUp) --> Failed
//! ```
//!
//! [`EncodeBox::start`] runs one request on the current runtime and reports
//! every transition, every progress record and exactly one terminal event
//! through a single channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use eb_av::{probe_duration, select_recipe, AssetPaths, Encoder, EncoderEvent, RecipeKind, ToolRegistry, FFMPEG, FFPROBE};
use eb_core::config::Config;
use eb_core::{EncodingProgress, EncodingRequest, Error, Result};
use eb_storage::ObjectStore;

use crate::asset::AssetCollection;
use crate::download::{download_assets, RetryPolicy};

const EVENT_BUFFER: usize = 64;

/// Lifecycle of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Downloading,
    Encoding,
    CleaningUp,
    Done,
    Failed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Created => "created",
            JobState::Downloading => "downloading",
            JobState::Encoding => "encoding",
            JobState::CleaningUp => "cleaning-up",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Everything a caller observes about a running request.
#[derive(Debug)]
pub enum JobEvent {
    State(JobState),
    Progress(EncodingProgress),
    /// Terminal: the output file was written.
    Done(PathBuf),
    /// Terminal.
    Failed(Error),
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Done(_) | JobEvent::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct EncodeBoxOptions {
    pub retry: RetryPolicy,
    /// Diagnostic lines kept for failure messages.
    pub ring_capacity: usize,
}

impl Default for EncodeBoxOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            ring_capacity: eb_av::console::DEFAULT_RING_CAPACITY,
        }
    }
}

impl EncodeBoxOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry: RetryPolicy::from_config(&config.storage),
            ring_capacity: config.encoder.ring_capacity,
        }
    }
}

/// Turns requests into encoded files.
///
/// Cheap to clone; clones share the store and tool registry.
#[derive(Clone)]
pub struct EncodeBox {
    store: Arc<dyn ObjectStore>,
    tools: Arc<ToolRegistry>,
    options: EncodeBoxOptions,
}

impl EncodeBox {
    pub fn new(store: Arc<dyn ObjectStore>, tools: Arc<ToolRegistry>, options: EncodeBoxOptions) -> Self {
        Self { store, tools, options }
    }

    /// Run `request` in the background, writing the result to `output`.
    ///
    /// Assets are downloaded under `assets/` next to `output`. Cancelling
    /// `cancel` aborts downloads or stops the encoder; the stream then ends
    /// with `Failed(Error::Cancelled)`. Dropping the receiver has the same
    /// effect.
    pub fn start(
        &self,
        request: EncodingRequest,
        output: PathBuf,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<JobEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let this = self.clone();
        let span = tracing::info_span!("job", job_id = %request.job_id);

        tokio::spawn(
            async move {
                let cancel = cancel.child_token();
                let result = this.run(&request, &output, &tx, &cancel).await;
                let (state, terminal) = match result {
                    Ok(path) => {
                        tracing::info!(output = %path.display(), "Job done");
                        (JobState::Done, JobEvent::Done(path))
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Job failed");
                        (JobState::Failed, JobEvent::Failed(e))
                    }
                };
                emit_state(&tx, state).await;
                let _ = tx.send(terminal).await;
            }
            .instrument(span),
        );

        rx
    }

    async fn run(
        &self,
        request: &EncodingRequest,
        output: &Path,
        tx: &mpsc::Sender<JobEvent>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        emit_state(tx, JobState::Created).await;
        request.validate()?;
        let ffmpeg = self.tools.require(FFMPEG)?.to_path_buf();

        let mut assets = AssetCollection::from_request(request);
        let assets_dir = output
            .parent()
            .map(|dir| dir.join("assets"))
            .unwrap_or_else(|| PathBuf::from("assets"));

        emit_state(tx, JobState::Downloading).await;
        let result = self
            .download_and_encode(&mut assets, &assets_dir, &ffmpeg, output, tx, cancel)
            .await;

        emit_state(tx, JobState::CleaningUp).await;
        cleanup(&mut assets).await;
        result
    }

    async fn download_and_encode(
        &self,
        assets: &mut AssetCollection,
        assets_dir: &Path,
        ffmpeg: &Path,
        output: &Path,
        tx: &mpsc::Sender<JobEvent>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        download_assets(assets, Arc::clone(&self.store), assets_dir, self.options.retry, cancel).await?;

        let paths = assets.to_asset_paths();
        let recipe = select_recipe(&paths, output)?;
        let target = self.target_duration(&paths, recipe.kind, cancel).await?;

        emit_state(tx, JobState::Encoding).await;
        let mut events = Encoder::from_recipe(&recipe, ffmpeg)
            .ring_capacity(self.options.ring_capacity)
            .target_duration(target)
            .spawn(cancel.clone());

        while let Some(event) = events.recv().await {
            match event {
                EncoderEvent::Progress(progress) => {
                    if tx.send(JobEvent::Progress(progress)).await.is_err() {
                        tracing::debug!("Job event receiver dropped; stopping encoder");
                        cancel.cancel();
                    }
                }
                EncoderEvent::Finished => return Ok(output.to_path_buf()),
                EncoderEvent::Failed(e) => return Err(e),
            }
        }
        Err(Error::Internal("encoder stopped without a result".into()))
    }

    /// Expected output length. Unknown durations count as zero.
    ///
    /// Fails with [`Error::Cancelled`] as soon as `cancel` fires.
    async fn target_duration(
        &self,
        paths: &AssetPaths,
        kind: RecipeKind,
        cancel: &CancellationToken,
    ) -> Result<Duration> {
        let Ok(ffprobe) = self.tools.require(FFPROBE) else {
            tracing::debug!("ffprobe unavailable; target duration unknown");
            return Ok(Duration::ZERO);
        };

        let mut audio = Duration::ZERO;
        for path in &paths.audios {
            audio += probe_or_zero(ffprobe, path, cancel).await?;
        }

        match (kind, paths.videos.first()) {
            (RecipeKind::VideoWithAudio, Some(video)) => {
                Ok(probe_or_zero(ffprobe, video, cancel).await?.max(audio))
            }
            _ => Ok(audio),
        }
    }
}

async fn probe_or_zero(ffprobe: &Path, path: &Path, cancel: &CancellationToken) -> Result<Duration> {
    let result = tokio::select! {
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        result = probe_duration(ffprobe, path) => result,
    };
    match result {
        Ok(d) => Ok(d),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Duration unknown");
            Ok(Duration::ZERO)
        }
    }
}

async fn emit_state(tx: &mpsc::Sender<JobEvent>, state: JobState) {
    tracing::info!(%state, "Job state");
    let _ = tx.send(JobEvent::State(state)).await;
}

/// Remove every downloaded file and forget its path. Failures are logged.
async fn cleanup(assets: &mut AssetCollection) {
    for asset in assets.iter_mut() {
        let Some(path) = asset.path.take() else {
            continue;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(key = %asset.key, "Removed local asset"),
            Err(e) => tracing::warn!(
                key = %asset.key,
                path = %path.display(),
                error = %e,
                "Failed to remove local asset"
            ),
        }
    }
}
