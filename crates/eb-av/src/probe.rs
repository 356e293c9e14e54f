//! Media duration probing with ffprobe.

use std::path::Path;
use std::time::Duration;

use crate::command::ToolCommand;

/// Time allowed for a single probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Return the container duration of `path`.
///
/// Fails for unreadable inputs and for inputs without a duration (still
/// images), where ffprobe prints nothing usable.
pub async fn probe_duration(ffprobe: &Path, path: &Path) -> eb_core::Result<Duration> {
    let output = ToolCommand::new(ffprobe.to_path_buf())
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path.to_string_lossy())
        .timeout(PROBE_TIMEOUT)
        .execute()
        .await?;

    parse_duration(&output.stdout).ok_or_else(|| {
        eb_core::Error::tool(
            "ffprobe",
            format!("no duration reported for {}", path.display()),
        )
    })
}

fn parse_duration(stdout: &str) -> Option<Duration> {
    let secs: f64 = stdout.lines().next()?.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}
