//! Bookkeeping for melodic voices that are still wired into the graph.
//!
//! Every melodic note registers its operator nodes here with an expiry one
//! second past its nominal end. Voices leave the registry in exactly two
//! ways: the pruner sweeps them after expiry, or `all_sound_off` stops their
//! channel. Either way the same teardown runs.

use tracing::debug;

use crate::graph::{AudioGraph, Detach, NodeId, ParamSlot, Target};

/// Stable identifier of a registered voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(u64);

impl VoiceId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Where a voice is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    /// Registered, not yet audible.
    Scheduled,
    Sounding,
    /// Past expiry, waiting for the next sweep.
    Expired,
    /// Torn down and removed. Terminal.
    Stopped,
}

/// Graph nodes of one operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceNodes {
    pub source: NodeId,
    pub gain: NodeId,
    /// `Frequency` for oscillators, `PlaybackRate` for noise players.
    pub control: ParamSlot,
}

#[derive(Debug, Clone)]
pub struct ActiveVoice {
    pub id: VoiceId,
    pub channel: usize,
    pub note: u8,
    /// Absolute audio time the voice starts.
    pub start: f64,
    pub expiry: f64,
    /// The channel's modulation bus, wired into every operator's detune.
    pub modulation: NodeId,
    pub operators: Vec<VoiceNodes>,
}

impl ActiveVoice {
    pub fn state_at(&self, now: f64) -> VoiceState {
        if now < self.start {
            VoiceState::Scheduled
        } else if now > self.expiry {
            VoiceState::Expired
        } else {
            VoiceState::Sounding
        }
    }

    /// Silence the voice now and return its nodes to the graph.
    ///
    /// Every step is best effort: a node that is already gone or a wire that
    /// is already detached is skipped.
    pub fn teardown(self, graph: &mut AudioGraph) -> VoiceState {
        let now = graph.current_time();
        let mut already_detached = 0;

        for op in self.operators.iter().rev() {
            if let Ok(control) = graph.param_mut(op.source, op.control) {
                control.cancel_scheduled_values(0.0);
            }
            if let Ok(gain) = graph.param_mut(op.gain, ParamSlot::Gain) {
                gain.cancel_scheduled_values(0.0);
            }
            let _ = graph.stop(op.source, now);

            let detune = Target::Param(op.source, ParamSlot::Detune);
            if graph.disconnect(self.modulation, detune) == Detach::AlreadyDetached {
                already_detached += 1;
            }

            if let Ok(gain) = graph.param_mut(op.gain, ParamSlot::Gain) {
                gain.set_value(0.0);
            }
            graph.release(op.source);
            graph.release(op.gain);
        }

        debug!(
            voice = self.id.0,
            channel = self.channel,
            note = self.note,
            already_detached,
            "voice stopped"
        );
        VoiceState::Stopped
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    voices: Vec<ActiveVoice>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        channel: usize,
        note: u8,
        start: f64,
        expiry: f64,
        modulation: NodeId,
        operators: Vec<VoiceNodes>,
    ) -> VoiceId {
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        self.voices.push(ActiveVoice {
            id,
            channel,
            note,
            start,
            expiry,
            modulation,
            operators,
        });
        id
    }

    /// Remove and return every voice whose expiry lies strictly before `now`.
    pub fn take_expired(&mut self, now: f64) -> Vec<ActiveVoice> {
        self.take_where(|v| now > v.expiry)
    }

    pub fn take_channel(&mut self, channel: usize) -> Vec<ActiveVoice> {
        self.take_where(|v| v.channel == channel)
    }

    pub fn take_all(&mut self) -> Vec<ActiveVoice> {
        std::mem::take(&mut self.voices)
    }

    pub fn get(&self, id: VoiceId) -> Option<&ActiveVoice> {
        self.voices.iter().find(|v| v.id == id)
    }

    /// Whether `id` was ever handed out by this registry.
    pub fn issued(&self, id: VoiceId) -> bool {
        id.0 < self.next_id
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveVoice> {
        self.voices.iter()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    fn take_where(&mut self, pred: impl Fn(&ActiveVoice) -> bool) -> Vec<ActiveVoice> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.voices).into_iter().partition(pred);
        self.voices = kept;
        taken
    }
}
