//! The declarative encoding request.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Extension given to every encoded output.
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Per-request options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncodingOptions {
    /// Delete every source asset from storage once the output is uploaded.
    #[serde(rename = "deleteAssetsFromObjStore")]
    pub delete_assets_from_obj_store: bool,
}

/// "Combine these stored assets into one video."
///
/// Empty strings are treated the same as absent keys, since upstream
/// producers commonly send `""` for unset fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncodingRequest {
    pub job_id: String,
    pub video_key: Option<String>,
    pub audios_keys: Vec<String>,
    pub image_key: Option<String>,
    pub side_audio_key: Option<String>,
    pub options: EncodingOptions,
}

fn non_empty(key: &Option<String>) -> Option<&str> {
    key.as_deref().filter(|k| !k.is_empty())
}

impl EncodingRequest {
    pub fn video(&self) -> Option<&str> {
        non_empty(&self.video_key)
    }

    pub fn image(&self) -> Option<&str> {
        non_empty(&self.image_key)
    }

    pub fn side_audio(&self) -> Option<&str> {
        non_empty(&self.side_audio_key)
    }

    /// Main audio keys in request order.
    pub fn audios(&self) -> impl Iterator<Item = &str> {
        self.audios_keys
            .iter()
            .map(String::as_str)
            .filter(|k| !k.is_empty())
    }

    /// Every source key the request references, in collection order.
    pub fn source_keys(&self) -> Vec<&str> {
        self.video()
            .into_iter()
            .chain(self.audios())
            .chain(self.image())
            .chain(self.side_audio())
            .collect()
    }

    /// Storage key and file name of the encoded output.
    pub fn output_name(&self) -> String {
        format!("{}.{OUTPUT_EXTENSION}", self.job_id)
    }

    /// Reject malformed requests before any side effect is attempted.
    pub fn validate(&self) -> Result<()> {
        if self.job_id.trim().is_empty() {
            return Err(Error::Validation("no record id provided".into()));
        }
        if self.job_id.contains(['/', '\\']) || self.job_id.contains("..") {
            return Err(Error::Validation(format!(
                "record id {:?} is not usable as a file name",
                self.job_id
            )));
        }
        if self.audios().next().is_none() {
            return Err(Error::Validation("no audio track provided".into()));
        }
        if self.video().is_some() && self.image().is_some() {
            return Err(Error::Validation(
                "video and image keys are mutually exclusive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> EncodingRequest {
        EncodingRequest {
            job_id: "job-1".into(),
            audios_keys: vec!["a.mp3".into()],
            ..Default::default()
        }
    }

    #[test]
    fn deserializes_wire_names() {
        let json = r#"{
            "jobId": "42",
            "videoKey": "clip.mp4",
            "audiosKeys": ["one.mp3", "two.mp3"],
            "options": {"deleteAssetsFromObjStore": true}
        }"#;
        let req: EncodingRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.job_id, "42");
        assert_eq!(req.video(), Some("clip.mp4"));
        assert_eq!(req.audios().collect::<Vec<_>>(), ["one.mp3", "two.mp3"]);
        assert!(req.options.delete_assets_from_obj_store);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn missing_id_rejected() {
        let req = EncodingRequest {
            job_id: " ".into(),
            ..request()
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "Validation error: no record id provided");
    }

    #[test]
    fn path_like_id_rejected() {
        let req = EncodingRequest {
            job_id: "../etc".into(),
            ..request()
        };
        assert!(matches!(req.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn no_audio_rejected() {
        let req = EncodingRequest {
            audios_keys: vec!["".into()],
            ..request()
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "Validation error: no audio track provided");
    }

    #[test]
    fn video_and_image_rejected() {
        let req = EncodingRequest {
            video_key: Some("v.mp4".into()),
            image_key: Some("i.png".into()),
            ..request()
        };
        assert!(matches!(req.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn empty_strings_count_as_absent() {
        let req = EncodingRequest {
            video_key: Some(String::new()),
            image_key: Some("cover.png".into()),
            ..request()
        };
        assert!(req.validate().is_ok());
        assert_eq!(req.video(), None);
    }

    #[test]
    fn source_keys_in_collection_order() {
        let req = EncodingRequest {
            image_key: Some("cover.png".into()),
            side_audio_key: Some("bed.mp3".into()),
            audios_keys: vec!["a.mp3".into(), "b.mp3".into()],
            ..request()
        };
        assert_eq!(req.source_keys(), ["a.mp3", "b.mp3", "cover.png", "bed.mp3"]);
    }

    #[test]
    fn output_name_uses_job_id() {
        assert_eq!(request().output_name(), "job-1.mp4");
    }
}
