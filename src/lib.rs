pub mod capture; // PCM16 capture and WAV encoding
pub mod channel; // The 16 channel buses and the shared vibrato LFO
pub mod config;
pub mod dsp;
pub mod error;
pub mod graph; // Scheduled audio graph runtime
pub mod patch; // Instrument and drum definitions
pub mod pruner;
pub mod registry;
pub mod synth;
pub mod voice; // Per-note operator graphs

mod output;

/// Frames rendered per graph block.
pub const RENDER_QUANTUM: usize = 128;

pub use config::SynthConfig;
pub use error::{GraphError, PatchError, Result, SynthError};
pub use patch::{Operator, Patch, PatchBank, Route, Waveform};
pub use registry::{VoiceId, VoiceState};
pub use synth::Synth;
pub use voice::{NoteOn, NoteOutcome, SkipReason};
