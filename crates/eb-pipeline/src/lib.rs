//! eb-pipeline: the per-request lifecycle.
//!
//! An [`EncodeBox`] takes an [`EncodingRequest`](eb_core::EncodingRequest),
//! downloads its assets concurrently ([`download_assets`]), selects and runs
//! the matching recipe, and cleans up local files afterwards. The caller sees
//! one [`JobEvent`] stream per request.

pub mod asset;
pub mod download;
pub mod encode_box;
pub mod purge;
pub mod workspace;

pub use asset::{Asset, AssetCollection, AssetRole};
pub use download::{download_assets, RetryPolicy};
pub use encode_box::{EncodeBox, EncodeBoxOptions, JobEvent, JobState};
pub use purge::purge_source_assets;
pub use workspace::JobWorkspace;
