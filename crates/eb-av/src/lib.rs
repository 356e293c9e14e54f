//! # eb-av
//!
//! Everything that touches ffmpeg and ffprobe:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder for running
//!   external processes, captured or streaming.
//! - **Filter graphs** ([`filtergraph`]) -- an arena of audio filter nodes
//!   compiled into a `-filter_complex` argument.
//! - **Recipes** ([`recipe`]) -- the invocation chosen for a mix of assets.
//! - **Console parsing** ([`console`]) -- line splitting, progress parsing
//!   and the diagnostic ring buffer.
//! - **Encoder runner** ([`Encoder`]) -- spawns ffmpeg and exposes one event
//!   stream per run.
//! - **Probing** ([`probe_duration`]).

pub mod command;
pub mod console;
pub mod encoder;
pub mod filtergraph;
pub mod probe;
pub mod recipe;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use encoder::{Encoder, EncoderEvent};
pub use filtergraph::{FilterGraph, FilterNode, MixMode, NodeId, Normalization, SampleRate};
pub use probe::probe_duration;
pub use recipe::{select_recipe, AssetPaths, Recipe, RecipeBuilder, RecipeKind};
pub use tools::{ToolInfo, ToolRegistry, FFMPEG, FFPROBE};
