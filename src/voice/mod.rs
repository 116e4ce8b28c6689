//! Per-note operator graphs.
//!
//! A note-on walks its patch's operators in list order and builds one
//! generator + gain pair per operator into an arena. Each operator is then
//! wired by its [`Route`]: into the channel bus, into an earlier operator's
//! gain (amplitude modulation), or into an earlier operator's frequency or
//! playback rate (frequency modulation). Because routes only point
//! backwards, the arena slot a route needs is always already filled.
//!
//! ```text
//!   op1 ─► gain1 ─► op0.frequency          (g = 1, FM)
//!   op0 ─► gain0 ─► channel volume         (g = 0)
//!   lfo ─► channel modulation ─► op0.detune, op1.detune
//! ```

mod envelope;
mod sources;

use tracing::warn;

use crate::{
    channel::ChannelBus,
    error::GraphError,
    graph::{AudioGraph, ParamSlot, Target, Teardown},
    patch::{Patch, Route},
    registry::{VoiceId, VoiceNodes},
};

pub use envelope::{schedule_amplitude, schedule_pitch, set_param_target};
pub use sources::{Generator, SourceBank};

/// Reference pitch for noise playback rates: a buffer played at rate 1.0
/// stands for 440 Hz.
const NOISE_REFERENCE_HZ: f64 = 440.0;

/// `440 · 2^((note − 69) / 12)`.
pub fn note_to_frequency(note: u8) -> f64 {
    440.0 * 2.0_f64.powf((f64::from(note) - 69.0) / 12.0)
}

/// A request to play one note. Times are seconds relative to the engine's
/// current audio time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteOn {
    pub channel: usize,
    pub note: u8,
    /// Offset from now at which the note starts.
    pub start: f64,
    pub duration: f64,
    pub velocity: u8,
}

impl NoteOn {
    pub fn new(channel: usize, note: u8, start: f64, duration: f64) -> Self {
        Self {
            channel,
            note,
            start,
            duration,
            velocity: 100,
        }
    }

    pub fn velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity;
        self
    }
}

/// What a note-on turned into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteOutcome {
    /// A melodic voice, registered until `expiry`.
    Tracked { id: VoiceId, expiry: f64 },
    /// A percussion voice that stops and cleans up at `stop_at`.
    SelfStopping { stop_at: f64 },
    Skipped(SkipReason),
}

impl NoteOutcome {
    pub fn voice_id(&self) -> Option<VoiceId> {
        match self {
            NoteOutcome::Tracked { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, NoteOutcome::Skipped(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnknownChannel,
    /// The channel's instrument selection did not resolve.
    NoInstrument,
    /// Percussion note outside 35..=81 or past the end of the drum map.
    DrumOutOfRange,
    /// Every operator of the patch was unusable.
    EmptyPatch,
    /// The engine has been released.
    Released,
    /// The graph refused a connection; the partial voice was discarded.
    GraphRejected(GraphError),
}

/// The nodes a finished build left in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltVoice {
    pub operators: Vec<VoiceNodes>,
    /// Set for percussion, which stops itself.
    pub stop_at: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct BuiltOperator {
    nodes: VoiceNodes,
    frequency: f64,
}

/// Builds operator graphs for single notes on one channel bus.
pub struct VoiceBuilder<'a> {
    graph: &'a mut AudioGraph,
    sources: &'a SourceBank,
    bus: ChannelBus,
}

impl<'a> VoiceBuilder<'a> {
    pub fn new(graph: &'a mut AudioGraph, sources: &'a SourceBank, bus: ChannelBus) -> Self {
        Self { graph, sources, bus }
    }

    /// Build `patch` for `note`, starting at absolute time `start`.
    ///
    /// With `release_ratio` set the voice is percussion: every generator
    /// stops at `start + operators[0].decay · release_ratio` and then
    /// detaches and releases its own nodes.
    ///
    /// Operators with an unusable route are skipped with a warning. On a
    /// graph error every node created so far is released again.
    pub fn build(
        &mut self,
        patch: &Patch,
        note: u8,
        velocity: u8,
        start: f64,
        release_ratio: Option<f64>,
    ) -> Result<BuiltVoice, GraphError> {
        let mut arena: Vec<Option<BuiltOperator>> = Vec::with_capacity(patch.operators.len());
        let result = self.build_into(&mut arena, patch, note, velocity, start, release_ratio);
        if result.is_err() {
            for op in arena.iter().flatten() {
                self.graph.release(op.nodes.source);
                self.graph.release(op.nodes.gain);
            }
        }
        result
    }

    fn build_into(
        &mut self,
        arena: &mut Vec<Option<BuiltOperator>>,
        patch: &Patch,
        note: u8,
        velocity: u8,
        start: f64,
        release_ratio: Option<f64>,
    ) -> Result<BuiltVoice, GraphError> {
        let fundamental = note_to_frequency(note);
        let velocity = f64::from(velocity);
        let stop_at = release_ratio.and_then(|ratio| {
            patch
                .operators
                .first()
                .map(|op0| start + op0.decay * ratio)
        });

        for (index, op) in patch.operators.iter().enumerate() {
            let referenced = match op.route.target() {
                Some(target) if target >= index => None,
                Some(target) => arena.get(target).copied().flatten(),
                None => None,
            };
            if op.route != Route::MixToBus && referenced.is_none() {
                warn!(
                    patch = %patch.name,
                    operator = index,
                    route = ?op.route,
                    "operator routes to a missing operator; skipped"
                );
                arena.push(None);
                continue;
            }

            let (frequency, sink, scale) = match (op.route, referenced) {
                (Route::ModulateAmplitudeOf(_), Some(target)) => (
                    target.frequency * op.freq_ratio + op.freq_offset,
                    Target::Param(target.nodes.gain, ParamSlot::Gain),
                    1.0,
                ),
                (Route::ModulatePitchOf(_), Some(target)) => {
                    let scale = match target.nodes.control {
                        ParamSlot::PlaybackRate => target.frequency / NOISE_REFERENCE_HZ,
                        _ => target.frequency,
                    };
                    (
                        target.frequency * op.freq_ratio + op.freq_offset,
                        Target::Param(target.nodes.source, target.nodes.control),
                        scale,
                    )
                }
                _ => (
                    fundamental * op.freq_ratio + op.freq_offset,
                    Target::Node(self.bus.volume),
                    velocity * velocity / 16384.0,
                ),
            };

            let (source, control) = match self.sources.generator(op.waveform) {
                Generator::Oscillator(shape) => {
                    let source = self.graph.create_oscillator(shape, frequency);
                    (source, ParamSlot::Frequency)
                }
                Generator::Noise(buffer) => {
                    let source = self.graph.create_buffer_source(buffer, true);
                    self.graph
                        .param_mut(source, ParamSlot::PlaybackRate)?
                        .set_value(frequency / NOISE_REFERENCE_HZ);
                    (source, ParamSlot::PlaybackRate)
                }
            };
            let gain = self.graph.create_gain(0.0);
            let nodes = VoiceNodes {
                source,
                gain,
                control,
            };
            arena.push(Some(BuiltOperator { nodes, frequency }));

            if op.pitch_target != 1.0 {
                let param = self.graph.param_mut(source, control)?;
                let target = param.value() * op.pitch_target;
                schedule_pitch(param, target, start, op.pitch_time);
            }

            let detune = Target::Param(source, ParamSlot::Detune);
            self.graph.connect(self.bus.modulation, detune)?;
            self.graph.connect(source, gain)?;
            self.graph.connect(gain, sink)?;

            let peak = scale * op.level * op.key_scaling(note);
            schedule_amplitude(self.graph.param_mut(gain, ParamSlot::Gain)?, op, peak, start);

            self.graph.start(source, start)?;
            if let Some(stop_at) = stop_at {
                self.graph.stop(source, stop_at)?;
                self.graph.on_ended(
                    source,
                    vec![
                        Teardown::Detach {
                            from: self.bus.modulation,
                            to: detune,
                        },
                        Teardown::Release(source),
                        Teardown::Release(gain),
                    ],
                )?;
            }
        }

        let operators: Vec<VoiceNodes> = arena.iter().flatten().map(|op| op.nodes).collect();
        Ok(BuiltVoice { operators, stop_at })
    }
}
