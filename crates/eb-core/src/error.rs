//! Unified error type for encodebox.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for the HTTP front door to derive a status code via [`Error::http_status`]
//! and for the notifier to publish a readable message.

/// Unified error type covering all failure modes of an encoding job.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request data failed validation. Raised before any side effect.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An asset could not be fetched from storage after exhausting retries.
    #[error("Error while downloading required assets [{key}]: {message}")]
    Download {
        /// Storage key of the asset that failed.
        key: String,
        /// Description of the last failure.
        message: String,
    },

    /// No encoding recipe supports the requested asset combination.
    #[error("Recipe error: {0}")]
    Recipe(String),

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description. For encoder failures this is the
        /// tail of the tool's diagnostic output.
        message: String,
    },

    /// A storage collaborator operation failed.
    #[error("Storage error [{operation} {key}]: {message}")]
    Storage {
        /// The operation attempted (get, create, delete...).
        operation: String,
        /// Storage key the operation targeted.
        key: String,
        /// Human-readable error description.
        message: String,
    },

    /// Deleting source assets from remote storage failed for some keys.
    #[error("failed to delete \"{}\" from remote object storage", .keys.join(", "))]
    Cleanup {
        /// Every key whose deletion failed.
        keys: Vec<String>,
    },

    /// The job was cancelled before reaching a terminal state.
    #[error("Cancelled")]
    Cancelled,

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {source}")]
    Json {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Download { .. } => 502,
            Error::Recipe(_) => 422,
            Error::Tool { .. } => 502,
            Error::Storage { .. } => 502,
            Error::Cleanup { .. } => 500,
            Error::Cancelled => 503,
            Error::Io { .. } => 500,
            Error::Json { .. } => 400,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::Download`].
    pub fn download(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Download {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Storage`].
    pub fn storage(
        operation: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Storage {
            operation: operation.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether this error represents a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display() {
        let err = Error::Validation("no audio track provided".into());
        assert_eq!(err.to_string(), "Validation error: no audio track provided");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn download_display() {
        let err = Error::download("voice.wav", "connection refused");
        assert_eq!(
            err.to_string(),
            "Error while downloading required assets [voice.wav]: connection refused"
        );
        assert_eq!(err.http_status(), 502);
    }

    #[test]
    fn recipe_display() {
        let err = Error::Recipe("no suitable encoder found".into());
        assert_eq!(err.to_string(), "Recipe error: no suitable encoder found");
        assert_eq!(err.http_status(), 422);
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "Invalid data found when processing input");
        assert_eq!(
            err.to_string(),
            "Tool error [ffmpeg]: Invalid data found when processing input"
        );
        assert_eq!(err.http_status(), 502);
    }

    #[test]
    fn storage_display() {
        let err = Error::storage("get", "a.mp3", "status 500");
        assert_eq!(err.to_string(), "Storage error [get a.mp3]: status 500");
    }

    #[test]
    fn cleanup_lists_every_key() {
        let err = Error::Cleanup {
            keys: vec!["k1".into(), "k2".into()],
        };
        assert_eq!(
            err.to_string(),
            "failed to delete \"k1, k2\" from remote object storage"
        );
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn cancelled_is_cancelled() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Internal("x".into()).is_cancelled());
        assert_eq!(Error::Cancelled.http_status(), 503);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn json_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::from(serde_err);
        assert!(matches!(err, Error::Json { .. }));
        assert_eq!(err.http_status(), 400);
    }
}
