//! Per-request scratch directory.
//!
//! A [`JobWorkspace`] owns a temporary directory holding the downloaded
//! assets (under `assets/`) and the encoded output. Dropping it removes the
//! directory; [`JobWorkspace::close`] does the same but reports failures.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use eb_core::{Error, Result};

/// Scratch directory for one job.
#[derive(Debug)]
pub struct JobWorkspace {
    temp_dir: TempDir,
    output_name: String,
}

impl JobWorkspace {
    /// Create the directory under `work_root`, or the system temp dir when
    /// no root is configured.
    pub fn new(work_root: Option<&Path>, job_id: &str, output_name: &str) -> Result<Self> {
        let prefix = format!("encodebox-{job_id}-");
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix(&prefix);
            b
        };
        let temp_dir = match work_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| Error::Internal(format!("failed to create job workspace: {e}")))?;

        tracing::debug!(path = %temp_dir.path().display(), "Created job workspace");
        Ok(Self {
            temp_dir,
            output_name: output_name.to_string(),
        })
    }

    /// Path to the workspace root.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory the download coordinator writes into.
    pub fn assets_dir(&self) -> PathBuf {
        self.temp_dir.path().join("assets")
    }

    /// Where the encoder writes its result.
    pub fn output(&self) -> PathBuf {
        self.temp_dir.path().join(&self.output_name)
    }

    /// Remove the directory and everything in it.
    pub fn close(self) -> Result<()> {
        let path = self.temp_dir.path().to_path_buf();
        self.temp_dir.close().map_err(|e| {
            Error::Internal(format!(
                "failed to remove job workspace {}: {e}",
                path.display()
            ))
        })
    }
}
