//! Audio filter-graph compiler.
//!
//! A [`FilterGraph`] is an arena of [`FilterNode`]s built bottom-up: every
//! constructor takes the handles of already-inserted children and returns the
//! handle of the new node, so the structure is acyclic by construction.
//! [`FilterGraph::build`] serializes the tree under a root into the string
//! ffmpeg expects after `-filter_complex`.
//!
//! Output labels are assigned once, at insertion, from per-kind counters
//! owned by the graph (`concat_0`, `norm_0`, `norm_1`, ...). Two graphs never
//! share handles.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use eb_core::{Error, Result};

/// Handle to a node inside one [`FilterGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Loudness normalization algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// EBU R128 two-pass-quality normalization. Slow but precise.
    Loudnorm,
    /// Dynamic normalizer. Fast, approximate.
    Dynaudnorm,
    /// Tuned for spoken word.
    Speechnorm,
}

impl Normalization {
    fn filter(self) -> &'static str {
        match self {
            Normalization::Loudnorm => "loudnorm=I=-16:TP=-1.5:LRA=11",
            Normalization::Dynaudnorm => "dynaudnorm",
            Normalization::Speechnorm => "speechnorm",
        }
    }
}

/// Target sample rate for [`FilterNode::Resample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRate {
    K44,
    K48,
}

impl SampleRate {
    pub fn hz(self) -> u32 {
        match self {
            SampleRate::K44 => 44_100,
            SampleRate::K48 => 48_000,
        }
    }
}

/// How [`FilterNode::Mix`] combines its channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixMode {
    /// A single weighted `amix`.
    Plain,
    /// The side channel ducks the main channel through a sidechain
    /// compressor before both are mixed.
    Modulated,
}

/// Sidechain compressor settings used by [`MixMode::Modulated`].
const SIDECHAIN: &str = "sidechaincompress=threshold=0.05:ratio=5:level_sc=0.8";

/// One stage of an audio filter graph.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// An existing tool input, referenced by positional index or stream
    /// specifier (`"1"`, `"0:a"`). Emits no stage.
    Input,
    /// Joins its inputs end to end, in order.
    Concat { inputs: Vec<NodeId> },
    Normalize { input: NodeId, algorithm: Normalization },
    /// Forces planar float stereo at the given rate.
    Resample { input: NodeId, rate: SampleRate },
    Volume { input: NodeId, gain: f32 },
    /// Mixes `main` and `side` with `weights = [main, side]`.
    Mix {
        main: NodeId,
        side: NodeId,
        mode: MixMode,
        weights: [f32; 2],
    },
}

impl FilterNode {
    fn children(&self) -> Vec<NodeId> {
        match self {
            FilterNode::Input => Vec::new(),
            FilterNode::Concat { inputs } => inputs.clone(),
            FilterNode::Normalize { input, .. }
            | FilterNode::Resample { input, .. }
            | FilterNode::Volume { input, .. } => vec![*input],
            FilterNode::Mix { main, side, .. } => vec![*main, *side],
        }
    }

    fn label_prefix(&self) -> &'static str {
        match self {
            FilterNode::Input => "in",
            FilterNode::Concat { .. } => "concat",
            FilterNode::Normalize { .. } => "norm",
            FilterNode::Resample { .. } => "resample",
            FilterNode::Volume { .. } => "vol",
            FilterNode::Mix { .. } => "mixed",
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    label: String,
    node: FilterNode,
}

/// Arena of filter nodes for one encoder invocation.
#[derive(Debug, Clone, Default)]
pub struct FilterGraph {
    slots: Vec<Slot>,
    counters: HashMap<&'static str, usize>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: FilterNode) -> NodeId {
        let prefix = node.label_prefix();
        let counter = self.counters.entry(prefix).or_default();
        let label = format!("{prefix}_{counter}");
        *counter += 1;
        self.push_labelled(label, node)
    }

    fn push_labelled(&mut self, label: String, node: FilterNode) -> NodeId {
        self.slots.push(Slot { label, node });
        NodeId(self.slots.len() - 1)
    }

    /// Reference an existing tool input.
    pub fn input(&mut self, specifier: impl Into<String>) -> NodeId {
        self.push_labelled(specifier.into(), FilterNode::Input)
    }

    pub fn concat(&mut self, inputs: impl IntoIterator<Item = NodeId>) -> NodeId {
        let inputs = inputs.into_iter().collect();
        self.push(FilterNode::Concat { inputs })
    }

    pub fn normalize(&mut self, input: NodeId, algorithm: Normalization) -> NodeId {
        self.push(FilterNode::Normalize { input, algorithm })
    }

    pub fn resample(&mut self, input: NodeId, rate: SampleRate) -> NodeId {
        self.push(FilterNode::Resample { input, rate })
    }

    pub fn volume(&mut self, input: NodeId, gain: f32) -> NodeId {
        self.push(FilterNode::Volume { input, gain })
    }

    pub fn mix(&mut self, main: NodeId, side: NodeId, mode: MixMode, weights: [f32; 2]) -> NodeId {
        self.push(FilterNode::Mix {
            main,
            side,
            mode,
            weights,
        })
    }

    /// Number of nodes in the arena, inputs included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Output label of a node, without brackets.
    ///
    /// # Panics
    ///
    /// Panics if `node` was issued by a different graph.
    pub fn label(&self, node: NodeId) -> &str {
        &self.slots[node.0].label
    }

    pub fn node(&self, node: NodeId) -> Option<&FilterNode> {
        self.slots.get(node.0).map(|s| &s.node)
    }

    /// Serialize the tree under `root`, children first, with the final `;`
    /// removed.
    ///
    /// Fails if a handle is foreign to this graph, a concat has no inputs,
    /// or a non-input node feeds more than one consumer (ffmpeg links each
    /// output pad exactly once).
    pub fn build(&self, root: NodeId) -> Result<String> {
        let mut out = String::new();
        let mut emitted = HashSet::new();
        self.emit(root, &mut out, &mut emitted)?;
        if out.ends_with(';') {
            out.pop();
        }
        Ok(out)
    }

    fn emit(&self, id: NodeId, out: &mut String, emitted: &mut HashSet<NodeId>) -> Result<()> {
        let slot = self
            .slots
            .get(id.0)
            .ok_or_else(|| Error::Recipe(format!("filter node {} is not part of this graph", id.0)))?;

        if matches!(slot.node, FilterNode::Input) {
            return Ok(());
        }
        if !emitted.insert(id) {
            return Err(Error::Recipe(format!(
                "filter output [{}] is consumed more than once",
                slot.label
            )));
        }

        for child in slot.node.children() {
            self.emit(child, out, emitted)?;
        }

        let this = &slot.label;
        // `write!` into a String cannot fail.
        let _ = match &slot.node {
            FilterNode::Input => Ok(()),
            FilterNode::Concat { inputs } => {
                if inputs.is_empty() {
                    return Err(Error::Recipe(format!("[{this}] concat has no inputs")));
                }
                for input in inputs {
                    let _ = write!(out, "[{}]", self.label(*input));
                }
                write!(out, "concat=n={}:v=0:a=1[{this}];", inputs.len())
            }
            FilterNode::Normalize { input, algorithm } => {
                write!(out, "[{}]{}[{this}];", self.label(*input), algorithm.filter())
            }
            FilterNode::Resample { input, rate } => write!(
                out,
                "[{}]aformat=sample_fmts=fltp:sample_rates={}:channel_layouts=stereo[{this}];",
                self.label(*input),
                rate.hz()
            ),
            FilterNode::Volume { input, gain } => {
                write!(out, "[{}]volume={gain:.2}[{this}];", self.label(*input))
            }
            FilterNode::Mix {
                main,
                side,
                mode: MixMode::Plain,
                weights,
            } => write!(
                out,
                "[{}][{}]amix=weights={:.1} {:.1}[{this}];",
                self.label(*main),
                self.label(*side),
                weights[0],
                weights[1]
            ),
            FilterNode::Mix {
                main,
                side,
                mode: MixMode::Modulated,
                weights,
            } => {
                let duck = format!("scm_{this}");
                let keep = format!("sco_{this}");
                let ducked = format!("mmc_{this}");
                write!(
                    out,
                    "[{side}]asplit=2[{duck}][{keep}];\
                     [{main}][{duck}]{SIDECHAIN}[{ducked}];\
                     [{ducked}][{keep}]amix=weights={w0:.1} {w1:.1}[{this}];",
                    side = self.label(*side),
                    main = self.label(*main),
                    w0 = weights[0],
                    w1 = weights[1],
                )
            }
        };
        Ok(())
    }
}
