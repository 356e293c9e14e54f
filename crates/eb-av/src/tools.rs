//! External tool detection.
//!
//! The [`ToolRegistry`] discovers and caches the locations of `ffmpeg` and
//! `ffprobe` so recipes and probes never search `PATH` per request.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use eb_core::config::ToolsConfig;

/// The media encoder.
pub const FFMPEG: &str = "ffmpeg";
/// The media prober.
pub const FFPROBE: &str = "ffprobe";

/// Known tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &[FFMPEG, FFPROBE];

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool paths.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, PathBuf>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// A configured path is used when it exists. Otherwise [`which::which`]
    /// locates the tool. Tools that are not found are omitted.
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                FFMPEG => tools_config.ffmpeg_path.as_deref(),
                FFPROBE => tools_config.ffprobe_path.as_deref(),
                _ => None,
            };

            let resolved = match custom_path {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(
                        "Configured {name} path {} does not exist; searching PATH",
                        p.display()
                    );
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            if let Some(path) = resolved {
                tools.insert(name.to_string(), path);
            }
        }

        Self { tools }
    }

    /// Build a registry from explicit paths, bypassing discovery.
    pub fn with_paths(paths: impl IntoIterator<Item = (&'static str, PathBuf)>) -> Self {
        Self {
            tools: paths
                .into_iter()
                .map(|(name, path)| (name.to_string(), path))
                .collect(),
        }
    }

    /// Return the path for the given tool, or an [`eb_core::Error::Tool`] if
    /// the tool was not found during discovery.
    pub fn require(&self, name: &str) -> eb_core::Result<&Path> {
        self.tools
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| {
                eb_core::Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
            })
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(path) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(path),
                    path: Some(path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_with_default_config() {
        let registry = ToolRegistry::discover(&ToolsConfig::default());
        // We cannot guarantee ffmpeg is installed in CI,
        // but the call itself must not panic.
        let _ = registry.check_all();
    }

    #[test]
    fn require_missing_tool_returns_error() {
        let registry = ToolRegistry::default();
        let err = registry.require(FFMPEG).unwrap_err();
        assert!(err.to_string().contains("ffmpeg not found"));
    }

    #[test]
    fn check_all_returns_known_tools() {
        let registry = ToolRegistry::default();
        let infos = registry.check_all();
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, [FFMPEG, FFPROBE]);
        assert!(infos.iter().all(|i| !i.available));
    }

    #[test]
    fn existing_custom_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("my-ffmpeg");
        std::fs::write(&fake, b"").unwrap();
        let cfg = ToolsConfig {
            ffmpeg_path: Some(fake.clone()),
            ffprobe_path: None,
        };
        let registry = ToolRegistry::discover(&cfg);
        assert_eq!(registry.require(FFMPEG).unwrap(), fake.as_path());
    }

    #[test]
    fn with_paths_registers_tools() {
        let registry = ToolRegistry::with_paths([(FFPROBE, PathBuf::from("/opt/ffprobe"))]);
        assert_eq!(registry.require(FFPROBE).unwrap(), Path::new("/opt/ffprobe"));
        assert!(registry.require(FFMPEG).is_err());
    }
}
