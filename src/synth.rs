//! The engine facade.
//!
//! [`Synth`] owns one [`SynthState`] behind an `Arc<Mutex<_>>` shared by
//! three parties: the control API on the caller's thread, the pruner
//! thread, and (for realtime engines) the audio device callback. Each of
//! them holds the lock only for one short operation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::{
    capture::{self, Recording},
    channel::ChannelRig,
    config::SynthConfig,
    error::{Result, SynthError},
    graph::AudioGraph,
    output::OutputDevice,
    patch::PatchBank,
    pruner::{Pruner, PrunerThread},
    registry::{Registry, VoiceId, VoiceState},
    voice::{NoteOn, NoteOutcome, SkipReason, SourceBank, VoiceBuilder},
};

/// Everything the control API, the pruner and the device callback share.
pub(crate) struct SynthState {
    graph: AudioGraph,
    rig: ChannelRig,
    registry: Registry,
    bank: PatchBank,
    sources: SourceBank,
    config: SynthConfig,
    released: bool,
}

impl SynthState {
    fn new(bank: PatchBank, config: SynthConfig, sample_rate: f64) -> Result<Self> {
        let mut graph = AudioGraph::new(sample_rate);
        let rig = ChannelRig::install(&mut graph, &config)?;
        let sources = SourceBank::new(sample_rate, config.noise_seed);
        Ok(Self {
            graph,
            rig,
            registry: Registry::new(),
            bank,
            sources,
            config,
            released: false,
        })
    }

    pub(crate) fn render(&mut self, out: &mut [f32], channels: usize) {
        self.graph.render(out, channels);
    }

    fn set_instrument(&mut self, channel: usize, name: &str) -> Option<usize> {
        let index = self.bank.instrument_index(name);
        if index.is_none() {
            warn!(channel, name, "unknown instrument; channel will stay silent");
        }
        if !self.rig.select_instrument(channel, index) {
            warn!(channel, "instrument selected on a channel outside 0..16");
        }
        index
    }

    fn note_on(&mut self, note: NoteOn) -> NoteOutcome {
        if self.released {
            return NoteOutcome::Skipped(SkipReason::Released);
        }
        let Some(channel) = self.rig.channel(note.channel) else {
            return NoteOutcome::Skipped(SkipReason::UnknownChannel);
        };
        let bus = channel.bus;
        let percussion = channel.percussion;

        let patch = if percussion {
            match self.bank.drum_for_note(note.note) {
                Some(patch) => patch,
                None => return NoteOutcome::Skipped(SkipReason::DrumOutOfRange),
            }
        } else {
            match channel.instrument.and_then(|i| self.bank.instrument(i)) {
                Some(patch) => patch,
                None => return NoteOutcome::Skipped(SkipReason::NoInstrument),
            }
        };
        if patch.operators.is_empty() {
            return NoteOutcome::Skipped(SkipReason::EmptyPatch);
        }

        let start = self.graph.current_time() + note.start.max(0.0);
        let release_ratio = percussion.then_some(self.config.release_ratio);
        let built = VoiceBuilder::new(&mut self.graph, &self.sources, bus).build(
            patch,
            note.note,
            note.velocity,
            start,
            release_ratio,
        );
        let voice = match built {
            Ok(voice) => voice,
            Err(err) => {
                warn!(%err, patch = %patch.name, "voice discarded");
                return NoteOutcome::Skipped(SkipReason::GraphRejected(err));
            }
        };
        if voice.operators.is_empty() {
            return NoteOutcome::Skipped(SkipReason::EmptyPatch);
        }

        if let Some(stop_at) = voice.stop_at {
            debug!(note = note.note, patch = %patch.name, stop_at, "percussion voice");
            return NoteOutcome::SelfStopping { stop_at };
        }

        let expiry = start + note.duration.max(0.0) + self.config.voice_slack;
        let id = self.registry.insert(
            note.channel,
            note.note,
            start,
            expiry,
            bus.modulation,
            voice.operators,
        );
        debug!(voice = id.get(), channel = note.channel, note = note.note, expiry, "voice registered");
        NoteOutcome::Tracked { id, expiry }
    }

    /// Tear down every voice past its expiry. Returns how many were stopped.
    pub(crate) fn sweep(&mut self) -> usize {
        let expired = self.registry.take_expired(self.graph.current_time());
        let count = expired.len();
        for voice in expired {
            voice.teardown(&mut self.graph);
        }
        count
    }

    fn all_sound_off(&mut self, channel: usize) -> usize {
        let voices = self.registry.take_channel(channel);
        let count = voices.len();
        for voice in voices {
            voice.teardown(&mut self.graph);
        }
        count
    }

    fn recording(&mut self, duration: f64) -> Recording {
        let sample_rate = self.graph.sample_rate();
        let seconds = duration.max(0.0) + 1.0;
        let disarm_at = self.graph.current_frame() + (seconds * sample_rate).round() as u64;
        let threshold = self.config.capture_threshold;
        let capacity = self
            .config
            .capture_ring_capacity
            .unwrap_or_else(|| capture::ring_capacity(seconds, sample_rate, threshold));
        let (tap, recording) = capture::pair(sample_rate.round() as u32, threshold, disarm_at, capacity);

        if self.released {
            // Dropping the tap completes the recording with no samples.
            return recording;
        }
        if self.graph.set_capture_tap(tap).is_some() {
            info!("previous capture replaced");
        }
        debug!(disarm_at, capacity, "capture armed");
        recording
    }

    fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for voice in self.registry.take_all() {
            voice.teardown(&mut self.graph);
        }
        if self.graph.take_capture_tap().is_some() {
            info!("in-flight capture cancelled by release");
        }
        self.rig.teardown(&mut self.graph);
        debug!("engine released");
    }
}

/// A running synthesizer.
pub struct Synth {
    state: Arc<Mutex<SynthState>>,
    pruner: Option<PrunerThread>,
    stream: Option<cpal::Stream>,
    sample_rate: f64,
}

impl Synth {
    /// Start a realtime engine on the default output device.
    pub fn new(bank: PatchBank, config: SynthConfig) -> Result<Self> {
        let device = OutputDevice::open_default()?;
        let sample_rate = device.sample_rate();
        let mut synth = Self::assemble(bank, config, sample_rate)?;
        synth.stream = Some(device.start(Arc::clone(&synth.state))?);
        Ok(synth)
    }

    /// Start an engine with no device. The clock only moves when the caller
    /// renders.
    pub fn offline(bank: PatchBank, config: SynthConfig) -> Result<Self> {
        let sample_rate = config.sample_rate;
        Self::assemble(bank, config, sample_rate)
    }

    fn assemble(bank: PatchBank, config: SynthConfig, sample_rate: f64) -> Result<Self> {
        let background = config.background_pruner;
        let pruner = Pruner::new(config.prune_interval(), config.prune_duty_cycle);
        let state = Arc::new(Mutex::new(SynthState::new(bank, config, sample_rate)?));

        let pruner = if background {
            let weak = Arc::downgrade(&state);
            let thread = PrunerThread::spawn(pruner, move || {
                let Some(state) = weak.upgrade() else {
                    return false;
                };
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if state.released {
                    return false;
                }
                state.sweep();
                true
            })
            .map_err(SynthError::Spawn)?;
            Some(thread)
        } else {
            None
        };

        info!(sample_rate, background_pruner = background, "synth ready");
        Ok(Self {
            state,
            pruner,
            stream: None,
            sample_rate,
        })
    }

    fn lock(&self) -> MutexGuard<'_, SynthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Seconds on the audio clock.
    pub fn current_time(&self) -> f64 {
        self.lock().graph.current_time()
    }

    /// Select an instrument by name. Unknown names leave the channel with no
    /// instrument and return `None`.
    pub fn set_instrument(&self, channel: usize, name: &str) -> Option<usize> {
        self.lock().set_instrument(channel, name)
    }

    pub fn note_on(&self, note: NoteOn) -> NoteOutcome {
        self.lock().note_on(note)
    }

    /// Immediately stop every registered voice on `channel`.
    pub fn all_sound_off(&self, channel: usize) -> usize {
        self.lock().all_sound_off(channel)
    }

    /// Run one pruning sweep now.
    pub fn sweep(&self) -> usize {
        self.lock().sweep()
    }

    pub fn instrument_names(&self) -> Vec<String> {
        self.lock().bank.instrument_names()
    }

    pub fn drum_names(&self) -> Vec<String> {
        self.lock().bank.drum_names()
    }

    pub fn drum_note(&self, name: &str) -> Option<u8> {
        self.lock().bank.drum_index(name)
    }

    /// Capture the output for `duration + 1` seconds of audio time.
    /// Starting a new capture completes the previous one early.
    pub fn recording(&self, duration: f64) -> Recording {
        self.lock().recording(duration)
    }

    /// Render interleaved audio and advance the clock. Meant for offline
    /// engines; a realtime engine's device callback does this itself.
    pub fn render(&self, out: &mut [f32], channels: usize) {
        self.lock().render(out, channels);
    }

    /// Advance the clock by `seconds`, discarding the audio.
    pub fn advance(&self, seconds: f64) {
        let mut state = self.lock();
        let frames = (seconds.max(0.0) * state.graph.sample_rate()).round() as usize;
        state.graph.render_frames(frames);
    }

    pub fn active_voices(&self) -> usize {
        self.lock().registry.len()
    }

    pub fn voice_state(&self, id: VoiceId) -> Option<VoiceState> {
        let state = self.lock();
        let now = state.graph.current_time();
        match state.registry.get(id) {
            Some(voice) => Some(voice.state_at(now)),
            None if state.registry.issued(id) => Some(VoiceState::Stopped),
            None => None,
        }
    }

    /// Nodes currently alive in the audio graph.
    pub fn node_count(&self) -> usize {
        self.lock().graph.node_count()
    }

    pub fn set_channel_volume(&self, channel: usize, volume: f64) -> Result<()> {
        let mut state = self.lock();
        let SynthState { graph, rig, .. } = &mut *state;
        rig.set_volume(graph, channel, volume)?;
        Ok(())
    }

    pub fn set_channel_pan(&self, channel: usize, pan: f64) -> Result<()> {
        let mut state = self.lock();
        let SynthState { graph, rig, .. } = &mut *state;
        rig.set_pan(graph, channel, pan)?;
        Ok(())
    }

    /// Vibrato depth in cents for `channel`.
    pub fn set_modulation_depth(&self, channel: usize, cents: f64) -> Result<()> {
        let mut state = self.lock();
        let SynthState { graph, rig, .. } = &mut *state;
        rig.set_modulation_depth(graph, channel, cents)?;
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.lock().released
    }

    /// Stop the pruner, close the device, cancel any capture and tear the
    /// graph down. Idempotent; also runs on drop.
    pub fn release(&mut self) {
        if let Some(mut pruner) = self.pruner.take() {
            pruner.stop();
        }
        self.stream.take();
        self.lock().shutdown();
    }
}

impl Drop for Synth {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{Operator, Patch};

    fn synth() -> Synth {
        let bank = PatchBank::new(
            vec![Patch::new(
                "Sine",
                vec![Operator {
                    sustain: 1.0,
                    ..Operator::default()
                }],
            )],
            Vec::new(),
        )
        .unwrap();
        Synth::offline(bank, SynthConfig::offline(8_000.0)).unwrap()
    }

    #[test]
    fn unknown_instrument_silences_the_channel() {
        let s = synth();
        assert_eq!(s.set_instrument(2, "Kazoo"), None);
        assert_eq!(
            s.note_on(NoteOn::new(2, 60, 0.0, 1.0)),
            NoteOutcome::Skipped(SkipReason::NoInstrument)
        );
        assert_eq!(s.set_instrument(2, "Sine"), Some(0));
        assert!(s.note_on(NoteOn::new(2, 60, 0.0, 1.0)).voice_id().is_some());
    }

    #[test]
    fn missing_drum_map_entries_are_skipped() {
        let s = synth();
        assert_eq!(
            s.note_on(NoteOn::new(9, 36, 0.0, 0.1)),
            NoteOutcome::Skipped(SkipReason::DrumOutOfRange)
        );
        assert_eq!(
            s.note_on(NoteOn::new(16, 60, 0.0, 0.1)),
            NoteOutcome::Skipped(SkipReason::UnknownChannel)
        );
    }

    #[test]
    fn voice_state_reaches_stopped() {
        let s = synth();
        let id = s.note_on(NoteOn::new(0, 60, 0.5, 0.5)).voice_id().unwrap();
        assert_eq!(s.voice_state(id), Some(VoiceState::Scheduled));
        s.advance(1.0);
        assert_eq!(s.voice_state(id), Some(VoiceState::Sounding));
        s.advance(1.1);
        assert_eq!(s.voice_state(id), Some(VoiceState::Expired));
        assert_eq!(s.sweep(), 1);
        assert_eq!(s.voice_state(id), Some(VoiceState::Stopped));
    }

    #[test]
    fn release_is_idempotent_and_blocks_new_notes() {
        let mut s = synth();
        s.note_on(NoteOn::new(0, 60, 0.0, 5.0));
        s.release();
        s.release();
        assert!(s.is_released());
        assert_eq!(s.active_voices(), 0);
        assert_eq!(s.node_count(), 1);
        assert_eq!(
            s.note_on(NoteOn::new(0, 60, 0.0, 1.0)),
            NoteOutcome::Skipped(SkipReason::Released)
        );
        let mut rec = s.recording(1.0);
        assert!(rec.is_complete());
    }

    #[test]
    fn release_cancels_an_armed_capture() {
        let mut s = synth();
        let mut rec = s.recording(10.0);
        s.advance(0.1);
        assert!(!rec.is_complete());
        s.release();
        assert!(rec.is_complete());
        assert_eq!(rec.data_len(), 800 * 2);
    }
}
