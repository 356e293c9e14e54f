//! eb-core: shared errors, configuration, and the request/event data model.
//!
//! Every other eb-* crate depends on this one. It carries no runtime of its
//! own: the types here are plain data plus the unified [`Error`] that all
//! crates funnel their failures into.

pub mod config;
pub mod error;
pub mod events;
pub mod request;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use events::{EncodeData, EncodeInfos, EncodeState, EncodingProgress};
pub use request::{EncodingOptions, EncodingRequest};
