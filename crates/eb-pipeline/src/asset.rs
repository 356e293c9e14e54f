//! Request assets and their local paths.

use std::path::{Path, PathBuf};

use eb_av::AssetPaths;
use eb_core::EncodingRequest;

/// What an asset is used for in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetRole {
    Video,
    Audio,
    Image,
    SideAudio,
}

impl std::fmt::Display for AssetRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AssetRole::Video => "video",
            AssetRole::Audio => "audio",
            AssetRole::Image => "image",
            AssetRole::SideAudio => "side-audio",
        };
        f.write_str(s)
    }
}

/// One storage object referenced by a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub key: String,
    /// Local file, set once downloaded and cleared by cleanup.
    pub path: Option<PathBuf>,
    pub role: AssetRole,
}

impl Asset {
    pub fn new(key: impl Into<String>, role: AssetRole) -> Self {
        Self {
            key: key.into(),
            path: None,
            role,
        }
    }
}

/// The assets of one request in request order.
#[derive(Debug, Clone, Default)]
pub struct AssetCollection {
    assets: Vec<Asset>,
}

impl AssetCollection {
    /// Order is video, audios (request order), image, side audio.
    pub fn from_request(request: &EncodingRequest) -> Self {
        let mut assets = Vec::new();
        if let Some(key) = request.video() {
            assets.push(Asset::new(key, AssetRole::Video));
        }
        assets.extend(request.audios().map(|key| Asset::new(key, AssetRole::Audio)));
        if let Some(key) = request.image() {
            assets.push(Asset::new(key, AssetRole::Image));
        }
        if let Some(key) = request.side_audio() {
            assets.push(Asset::new(key, AssetRole::SideAudio));
        }
        Self { assets }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Asset> {
        self.assets.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&Asset> {
        self.assets.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Asset> {
        self.assets.get_mut(index)
    }

    /// Local paths of every downloaded asset with `role`, in request order.
    pub fn paths(&self, role: AssetRole) -> Vec<&Path> {
        self.assets
            .iter()
            .filter(|a| a.role == role)
            .filter_map(|a| a.path.as_deref())
            .collect()
    }

    /// True once every asset has a local path.
    pub fn is_resolved(&self) -> bool {
        self.assets.iter().all(|a| a.path.is_some())
    }

    /// Project the resolved paths into recipe inputs.
    pub fn to_asset_paths(&self) -> AssetPaths {
        let owned = |role: AssetRole| -> Vec<PathBuf> {
            self.paths(role).into_iter().map(Path::to_path_buf).collect()
        };
        AssetPaths {
            videos: owned(AssetRole::Video),
            images: owned(AssetRole::Image),
            audios: owned(AssetRole::Audio),
            side_audios: owned(AssetRole::SideAudio),
        }
    }
}
