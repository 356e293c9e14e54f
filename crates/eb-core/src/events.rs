//! Progress records and the notification envelope.
//!
//! [`EncodingProgress`] is produced for every progress line the encoder
//! prints. [`EncodeInfos`] is the message handed to the external notifier:
//! one `in-progress` per progress record and exactly one terminal `done` or
//! `error` per request.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Error;

// ---------------------------------------------------------------------------
// EncodingProgress
// ---------------------------------------------------------------------------

/// Snapshot of the encoder's reported progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingProgress {
    pub frames: i64,
    pub fps: i32,
    pub quality: f32,
    /// Estimated output size in kilobytes.
    pub size: i64,
    /// Encoded media time so far.
    #[serde(with = "duration_secs")]
    pub time: Duration,
    pub bitrate: String,
    pub speed: f32,
    /// Expected length of the output, when known.
    #[serde(rename = "totalDuration", with = "duration_secs")]
    pub target_duration: Duration,
}

impl EncodingProgress {
    /// Completion ratio in `[0, 1]`, or `None` when the target is unknown.
    pub fn ratio(&self) -> Option<f64> {
        if self.target_duration.is_zero() {
            return None;
        }
        Some((self.time.as_secs_f64() / self.target_duration.as_secs_f64()).min(1.0))
    }
}

/// Serde helpers to (de)serialize `Duration` as fractional seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// EncodeInfos
// ---------------------------------------------------------------------------

/// Coarse state carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncodeState {
    InProgress,
    Done,
    Error,
}

/// Notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EncodeData {
    Progress(EncodingProgress),
    Error { message: String },
}

/// Event published to the notifier for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeInfos {
    pub job_id: String,
    pub state: EncodeState,
    pub data: Option<EncodeData>,
}

impl EncodeInfos {
    pub fn in_progress(job_id: impl Into<String>, progress: EncodingProgress) -> Self {
        Self {
            job_id: job_id.into(),
            state: EncodeState::InProgress,
            data: Some(EncodeData::Progress(progress)),
        }
    }

    pub fn done(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: EncodeState::Done,
            data: None,
        }
    }

    pub fn error(job_id: impl Into<String>, error: &Error) -> Self {
        Self {
            job_id: job_id.into(),
            state: EncodeState::Error,
            data: Some(EncodeData::Error {
                message: error.to_string(),
            }),
        }
    }

    /// Whether this event ends the job's notification stream.
    pub fn is_terminal(&self) -> bool {
        self.state != EncodeState::InProgress
    }
}
