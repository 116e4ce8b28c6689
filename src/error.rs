//! Error types for tinysynth.

use thiserror::Error;

use crate::graph::{NodeId, ParamSlot};

/// Top-level error returned by [`Synth`](crate::synth::Synth) construction
/// and bank loading.
#[derive(Error, Debug)]
pub enum SynthError {
    /// The host has no output device to render into.
    #[error("no default audio output device available")]
    NoOutputDevice,

    #[error("failed to query the output configuration: {0}")]
    OutputConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build the output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start the output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to spawn the pruner thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// Errors raised by the audio graph when a mutation is structurally invalid.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),

    #[error("node {node:?} has no {slot:?} parameter")]
    NoSuchParam { node: NodeId, slot: ParamSlot },

    #[error("node {0:?} is not a schedulable source")]
    NotASource(NodeId),

    #[error("connecting {from:?} into {to:?} would create a cycle")]
    Cycle { from: NodeId, to: NodeId },

    #[error("the destination has no output to connect")]
    DestinationOutput,
}

/// Errors found while validating or loading patch data.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("patch `{patch}` has no operators")]
    Empty { patch: String },

    #[error("operator {index} of `{patch}` routes into operator {target}, which is not declared before it")]
    ForwardRoute {
        patch: String,
        index: usize,
        target: usize,
    },

    #[error("operator {index} of `{patch}` has an invalid `{field}` value")]
    InvalidField {
        patch: String,
        index: usize,
        field: &'static str,
    },

    #[error("unknown waveform `{0}`")]
    UnknownWaveform(String),

    #[error("drum map has {0} entries but only notes 35..=81 are addressable")]
    TooManyDrums(usize),

    #[cfg(feature = "serde")]
    #[error("malformed patch bank: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SynthError>;
