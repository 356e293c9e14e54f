//! Encoding recipes: which ffmpeg invocation to run for a set of assets.
//!
//! [`select_recipe`] maps the roles present in a request to one of three
//! recipes, each a complete argument vector (inputs, audio filter graph,
//! stream mapping, output options). [`RecipeBuilder`] is the lower-level
//! command builder the recipes are written with.

use std::path::{Path, PathBuf};

use eb_core::{Error, Result};

use crate::command::ToolCommand;
use crate::filtergraph::{FilterGraph, MixMode, NodeId, Normalization, SampleRate};

/// Relative weights of `[background, foreground]` when mixing.
const UNDERLAY_WEIGHTS: [f32; 2] = [0.2, 1.0];

/// Synthetic background for audio-only outputs.
const BLACK_BACKGROUND: &str = "color=black:s=1280x720:r=25";

/// Output options shared by the recipes whose video is a still frame.
const STILL_IMAGE_OPTIONS: &[&str] = &[
    "-pix_fmt",
    "yuv420p",
    "-c:v",
    "libx264",
    "-tune",
    "stillimage",
    "-shortest",
];

/// Which recipe was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeKind {
    VideoWithAudio,
    ImageWithAudio,
    AudioOnly,
}

/// Local paths of a request's assets, grouped by role, in request order.
#[derive(Debug, Clone, Default)]
pub struct AssetPaths {
    pub videos: Vec<PathBuf>,
    pub images: Vec<PathBuf>,
    pub audios: Vec<PathBuf>,
    pub side_audios: Vec<PathBuf>,
}

/// One `-i` input and the options that apply to it.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInput {
    /// Path or source specification passed to `-i`.
    pub source: String,
    /// Options written before `-i`.
    pub options: Vec<String>,
}

/// A complete encoder invocation.
#[derive(Debug, Clone)]
pub struct Recipe {
    pub kind: RecipeKind,
    inputs: Vec<MediaInput>,
    filter_complex: Option<String>,
    output_options: Vec<String>,
    output: PathBuf,
}

impl Recipe {
    pub fn inputs(&self) -> &[MediaInput] {
        &self.inputs
    }

    /// Serialized audio graph, if the recipe has one.
    pub fn filter_complex(&self) -> Option<&str> {
        self.filter_complex.as_deref()
    }

    pub fn output_options(&self) -> &[String] {
        &self.output_options
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Full ffmpeg argument vector, program excluded.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-hide_banner".into(), "-y".into()];
        for input in &self.inputs {
            args.extend(input.options.iter().cloned());
            args.push("-i".into());
            args.push(input.source.clone());
        }
        if let Some(graph) = &self.filter_complex {
            args.push("-filter_complex".into());
            args.push(graph.clone());
        }
        args.extend(self.output_options.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }

    /// Bind the recipe to an ffmpeg executable.
    pub fn to_command(&self, ffmpeg: &Path) -> ToolCommand {
        let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
        cmd.args(self.args());
        cmd
    }

    /// Shell-quoted invocation, for logs and `graph` output.
    pub fn command_line(&self, ffmpeg: &Path) -> String {
        self.to_command(ffmpeg).command_line()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Step-by-step construction of a [`Recipe`].
#[derive(Debug, Default)]
pub struct RecipeBuilder {
    inputs: Vec<MediaInput>,
    graph: Option<(FilterGraph, NodeId)>,
    output_options: Vec<String>,
    output: Option<PathBuf>,
}

impl RecipeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an input and return its positional index.
    pub fn add_input<I, S>(&mut self, source: impl Into<String>, options: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(MediaInput {
            source: source.into(),
            options: options.into_iter().map(Into::into).collect(),
        });
        self.inputs.len() - 1
    }

    /// Append a file input with no options and return its positional index.
    pub fn add_file(&mut self, path: &Path) -> usize {
        self.add_input(path.to_string_lossy(), Vec::<String>::new())
    }

    pub fn filter_graph(&mut self, graph: FilterGraph, root: NodeId) -> &mut Self {
        self.graph = Some((graph, root));
        self
    }

    pub fn output_options(&mut self, opts: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.output_options.extend(opts.into_iter().map(Into::into));
        self
    }

    pub fn output(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.output = Some(path.into());
        self
    }

    pub fn build(self, kind: RecipeKind) -> Result<Recipe> {
        if self.inputs.is_empty() {
            return Err(Error::Recipe("no inputs specified".into()));
        }
        let output = self
            .output
            .ok_or_else(|| Error::Recipe("no output file path specified".into()))?;
        let filter_complex = match self.graph {
            Some((graph, root)) => Some(graph.build(root)?).filter(|g| !g.is_empty()),
            None => None,
        };
        Ok(Recipe {
            kind,
            inputs: self.inputs,
            filter_complex,
            output_options: self.output_options,
            output,
        })
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Pick and build the recipe for the roles present in `assets`.
pub fn select_recipe(assets: &AssetPaths, output: &Path) -> Result<Recipe> {
    if assets.audios.is_empty() {
        return Err(Error::Recipe("no suitable encoder found: no audio track".into()));
    }

    let recipe = match (assets.videos.first(), assets.images.first()) {
        (Some(_), Some(_)) => {
            return Err(Error::Recipe(
                "no suitable encoder found: video and image cannot be combined".into(),
            ))
        }
        (Some(video), None) => video_with_audio(video, &assets.audios, output)?,
        (None, Some(image)) => image_with_audio(image, &assets.audios, output)?,
        (None, None) => audio_only(&assets.audios, assets.side_audios.first(), output)?,
    };

    if recipe.kind != RecipeKind::AudioOnly && !assets.side_audios.is_empty() {
        tracing::warn!(
            recipe = ?recipe.kind,
            "Side audio is only mixed into audio-only outputs; ignoring it"
        );
    }

    tracing::debug!(recipe = ?recipe.kind, "Selected encoding recipe");
    Ok(recipe)
}

/// Register the main audio inputs and chain concat (when more than one),
/// normalization and resampling onto them.
fn main_audio_chain(
    builder: &mut RecipeBuilder,
    graph: &mut FilterGraph,
    audios: &[PathBuf],
    algorithm: Normalization,
) -> NodeId {
    let mut tracks: Vec<NodeId> = audios
        .iter()
        .map(|path| {
            let index = builder.add_file(path);
            graph.input(index.to_string())
        })
        .collect();

    let joined = if tracks.len() == 1 {
        tracks.remove(0)
    } else {
        graph.concat(tracks)
    };
    let normalized = graph.normalize(joined, algorithm);
    graph.resample(normalized, SampleRate::K44)
}

fn map_outputs(builder: &mut RecipeBuilder, audio_label: &str) {
    builder.output_options(["-map".to_string(), "0:v".into(), "-map".into(), format!("[{audio_label}]")]);
}

/// Narration laid over a video, with the video's own soundtrack kept
/// underneath at low weight.
fn video_with_audio(video: &Path, audios: &[PathBuf], output: &Path) -> Result<Recipe> {
    let mut builder = RecipeBuilder::new();
    let mut graph = FilterGraph::new();

    builder.add_file(video);
    let soundtrack = graph.input("0:a");
    let narration = main_audio_chain(&mut builder, &mut graph, audios, Normalization::Loudnorm);
    let root = graph.mix(soundtrack, narration, MixMode::Plain, UNDERLAY_WEIGHTS);

    map_outputs(&mut builder, graph.label(root));
    builder.filter_graph(graph, root).output(output);
    builder.build(RecipeKind::VideoWithAudio)
}

/// A looped still image for as long as the audio lasts.
fn image_with_audio(image: &Path, audios: &[PathBuf], output: &Path) -> Result<Recipe> {
    let mut builder = RecipeBuilder::new();
    let mut graph = FilterGraph::new();

    builder.add_input(image.to_string_lossy(), ["-loop", "1"]);
    let root = main_audio_chain(&mut builder, &mut graph, audios, Normalization::Loudnorm);

    builder.output_options(STILL_IMAGE_OPTIONS.iter().copied());
    map_outputs(&mut builder, graph.label(root));
    builder.filter_graph(graph, root).output(output);
    builder.build(RecipeKind::ImageWithAudio)
}

/// Speech over a black frame, optionally ducking a background track.
fn audio_only(audios: &[PathBuf], side: Option<&PathBuf>, output: &Path) -> Result<Recipe> {
    let mut builder = RecipeBuilder::new();
    let mut graph = FilterGraph::new();

    builder.add_input(BLACK_BACKGROUND, ["-f", "lavfi"]);
    let speech = main_audio_chain(&mut builder, &mut graph, audios, Normalization::Speechnorm);

    let root = match side {
        Some(path) => {
            let index = builder.add_file(path);
            let background = graph.input(index.to_string());
            let background = graph.resample(background, SampleRate::K44);
            graph.mix(background, speech, MixMode::Modulated, UNDERLAY_WEIGHTS)
        }
        None => speech,
    };

    builder.output_options(STILL_IMAGE_OPTIONS.iter().copied());
    map_outputs(&mut builder, graph.label(root));
    builder.filter_graph(graph, root).output(output);
    builder.build(RecipeKind::AudioOnly)
}
