//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and then patched
//! with deployment environment variables (the names a Dapr sidecar deployment
//! sets). Every section defaults sensibly so an empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub pubsub: PubsubConfig,
    pub dapr: DaprConfig,
    pub tools: ToolsConfig,
    pub encoder: EncoderConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file, failing if it is missing or invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let (config, warning) = Self::load_lenient(path);
        if let Some(warning) = warning {
            tracing::warn!("{warning}");
        }
        config
    }

    /// Like [`Config::load_or_default`], but hands the fallback reason back
    /// instead of logging it.
    ///
    /// For callers that load configuration before a subscriber exists.
    pub fn load_lenient(path: Option<&Path>) -> (Self, Option<String>) {
        let Some(path) = path else {
            return (Self::default(), None);
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => (config, None),
                Err(e) => (
                    Self::default(),
                    Some(format!("Failed to parse config file {}: {e}; using defaults", path.display())),
                ),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (
                Self::default(),
                Some(format!("No config file at {}; using defaults", path.display())),
            ),
            Err(e) => (
                Self::default(),
                Some(format!("Failed to read config file {}: {e}; using defaults", path.display())),
            ),
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides using an arbitrary variable lookup.
    ///
    /// Unparsable numeric values are logged and ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(name) = get("OBJECT_STORE_NAME") {
            self.storage.component = name;
        }
        if let Some(name) = get("PUBSUB_NAME") {
            self.pubsub.component = name;
            self.pubsub.enabled = true;
        }
        if let Some(topic) = get("PUBSUB_TOPIC_PROGRESS") {
            self.pubsub.topic = topic;
        }
        if let Some(port) = get("APP_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(e) => tracing::warn!("Ignoring APP_PORT={port}: {e}"),
            }
        }
        if let Some(port) = get("DAPR_HTTP_PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.dapr.endpoint = format!("http://127.0.0.1:{p}"),
                Err(e) => tracing::warn!("Ignoring DAPR_HTTP_PORT={port}: {e}"),
            }
        }
        if let Some(size) = get("DAPR_MAX_REQUEST_SIZE_MB") {
            match size.parse() {
                Ok(mb) => self.dapr.max_request_size_mb = mb,
                Err(e) => tracing::warn!("Ignoring DAPR_MAX_REQUEST_SIZE_MB={size}: {e}"),
            }
        }
        if let Some(path) = get("FFMPEG_PATH") {
            self.tools.ffmpeg_path = Some(PathBuf::from(path));
        }
        if let Some(path) = get("FFPROBE_PATH") {
            self.tools.ffprobe_path = Some(PathBuf::from(path));
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        match self.storage.backend {
            StorageBackend::Dapr => {
                if self.storage.component.is_empty() {
                    warnings.push(
                        "storage.backend is dapr but storage.component (OBJECT_STORE_NAME) is empty"
                            .into(),
                    );
                }
            }
            StorageBackend::Local => {
                if self.storage.local_root.is_none() {
                    warnings.push("storage.backend is local but storage.local_root is not set".into());
                }
            }
        }

        if self.pubsub.enabled && self.pubsub.component.is_empty() {
            warnings.push("pubsub is enabled but pubsub.component is empty".into());
        }

        if self.pubsub.enabled && self.pubsub.topic.is_empty() {
            warnings.push("pubsub is enabled but pubsub.topic is empty".into());
        }

        if self.encoder.ring_capacity == 0 {
            warnings.push("encoder.ring_capacity is 0; tool errors will carry no diagnostics".into());
        }

        if self.storage.max_retry > 16 {
            warnings.push(format!(
                "storage.max_retry is {}; worst-case backoff exceeds a day",
                self.storage.max_retry
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP front door settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Topic the front door subscribes to for incoming requests, advertised
    /// on `/dapr/subscribe`. Empty disables programmatic subscription.
    pub request_topic: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            request_topic: String::new(),
        }
    }
}

/// Which object storage implementation backs asset fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Dapr,
    Local,
}

/// Object storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Dapr output-binding component name.
    pub component: String,
    /// Whether binding payloads are base64 encoded.
    pub base64: bool,
    /// Root directory for the local backend.
    pub local_root: Option<PathBuf>,
    /// Retries per asset after the first failed fetch.
    pub max_retry: u32,
    /// Backoff unit; the wait after failed attempt `n` is `base * 2^n`.
    pub retry_base_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Dapr,
            component: String::new(),
            base64: false,
            local_root: None,
            max_retry: 10,
            retry_base_secs: 1,
        }
    }
}

/// Progress notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PubsubConfig {
    pub enabled: bool,
    pub component: String,
    pub topic: String,
}

impl Default for PubsubConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            component: String::new(),
            topic: "encoding-state".into(),
        }
    }
}

/// Dapr sidecar connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaprConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_request_size_mb: u64,
}

impl Default for DaprConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3500".into(),
            timeout_secs: 600,
            max_request_size_mb: 2500,
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Encoder runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Number of trailing diagnostic lines kept for error messages.
    pub ring_capacity: usize,
    /// Parent of per-request work directories. `None` uses the system temp dir.
    pub work_root: Option<PathBuf>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 5,
            work_root: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}
