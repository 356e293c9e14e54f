//! Encoder subprocess runner.
//!
//! [`Encoder::spawn`] starts ffmpeg and returns a single event stream for the
//! run: zero or more [`EncoderEvent::Progress`] in diagnostic-stream order,
//! then exactly one terminal [`EncoderEvent::Finished`] or
//! [`EncoderEvent::Failed`].

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use eb_core::{EncodingProgress, Error, Result};

use crate::command::ToolCommand;
use crate::console::{is_progress_line, parse_progress, ConsoleLineCodec, RingLogBuffer, DEFAULT_RING_CAPACITY};
use crate::recipe::Recipe;

/// Buffered events between the runner and its consumer.
const EVENT_BUFFER: usize = 64;

/// One observation of a running encode.
#[derive(Debug)]
pub enum EncoderEvent {
    Progress(EncodingProgress),
    /// The process exited successfully.
    Finished,
    /// The process failed, could not start, or was cancelled.
    Failed(Error),
}

impl EncoderEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EncoderEvent::Progress(_))
    }
}

/// A configured, not yet started, encoder run.
#[derive(Debug, Clone)]
pub struct Encoder {
    command: ToolCommand,
    ring_capacity: usize,
    target_duration: Duration,
}

impl Encoder {
    pub fn new(command: ToolCommand) -> Self {
        Self {
            command,
            ring_capacity: DEFAULT_RING_CAPACITY,
            target_duration: Duration::ZERO,
        }
    }

    pub fn from_recipe(recipe: &Recipe, ffmpeg: &Path) -> Self {
        Self::new(recipe.to_command(ffmpeg))
    }

    /// How many trailing diagnostic lines a failure message carries.
    pub fn ring_capacity(mut self, lines: usize) -> Self {
        self.ring_capacity = lines;
        self
    }

    /// Expected output length, copied into every progress record.
    pub fn target_duration(mut self, duration: Duration) -> Self {
        self.target_duration = duration;
        self
    }

    pub fn command_line(&self) -> String {
        self.command.command_line()
    }

    /// Start the process on the current runtime.
    ///
    /// Cancelling `cancel` kills the process; the stream then ends with
    /// `Failed(Error::Cancelled)`.
    pub fn spawn(self, cancel: CancellationToken) -> mpsc::Receiver<EncoderEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(async move {
            let terminal = match self.run(&tx, &cancel).await {
                Ok(()) => EncoderEvent::Finished,
                Err(e) => EncoderEvent::Failed(e),
            };
            let _ = tx.send(terminal).await;
        });
        rx
    }

    async fn run(self, tx: &mpsc::Sender<EncoderEvent>, cancel: &CancellationToken) -> Result<()> {
        let tool = self.command.program_name();
        tracing::info!(command = %self.command.command_line(), "Starting encoder");

        let mut child = self.command.spawn_streaming()?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("encoder stderr was not captured".into()))?;
        let mut lines = FramedRead::new(stderr, ConsoleLineCodec::new());
        let mut ring = RingLogBuffer::new(self.ring_capacity);

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return stop(&mut child, &tool).await,
                next = lines.next() => next,
            };
            let line = match next {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Failed reading {tool} diagnostics");
                    break;
                }
                None => break,
            };

            ring.push(line.as_str());
            if !is_progress_line(&line) {
                tracing::trace!(%line, "{tool} output");
                continue;
            }
            match parse_progress(&line) {
                Ok(mut progress) => {
                    progress.target_duration = self.target_duration;
                    if tx.send(EncoderEvent::Progress(progress)).await.is_err() {
                        tracing::debug!("Encoder event receiver dropped");
                        return stop(&mut child, &tool).await;
                    }
                }
                Err(e) => tracing::warn!(%line, error = %e, "Progress line ignored"),
            }
        }

        let status = tokio::select! {
            _ = cancel.cancelled() => return stop(&mut child, &tool).await,
            status = child.wait() => status?,
        };

        if status.success() {
            tracing::info!("{tool} finished");
            return Ok(());
        }

        let tail = ring.joined();
        tracing::warn!(%status, diagnostics = %tail, "{tool} failed");
        Err(Error::tool(
            tool,
            if tail.is_empty() {
                format!("exited with status {status}")
            } else {
                tail
            },
        ))
    }
}

async fn stop(child: &mut Child, tool: &str) -> Result<()> {
    tracing::info!("Stopping {tool}");
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "Failed to kill {tool}");
    }
    Err(Error::Cancelled)
}
